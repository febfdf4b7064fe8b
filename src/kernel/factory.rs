//! The prototype registry.
//!
//! The factory holds one never-executed prototype per module kind. Instances
//! are created by asking a prototype's logic for a fresh copy of itself and
//! running the regular init sequence on it.
//!
//! # Example
//!
//! ```ignore
//! use modkernel::kernel::{ModuleContainer, ModuleFactory};
//!
//! let factory = ModuleFactory::global();
//! factory.load();
//!
//! let prototype = factory.get_prototype_by_name("Data Module")?;
//! let module = factory.create(&prototype)?;
//!
//! let root = ModuleContainer::new("root");
//! root.add(&module)?;
//! ```

use crate::error::{KernelError, Result};
use crate::kernel::combiner::{ApplyPrototypeCombiner, CompatiblesGroup};
use crate::kernel::module::{Module, ModuleLogic, ModuleType};
use crate::modules::builtin_prototypes;
use parking_lot::RwLock;
use std::sync::{Arc, LazyLock};

static GLOBAL: LazyLock<Arc<ModuleFactory>> = LazyLock::new(ModuleFactory::new);

pub struct ModuleFactory {
    prototypes: RwLock<Vec<Arc<Module>>>,
}

impl ModuleFactory {
    /// An empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            prototypes: RwLock::new(Vec::new()),
        })
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Register every built-in module kind.
    pub fn load(&self) {
        self.load_filtered(&[]);
    }

    /// Register the built-in kinds named in `whitelist`, or all of them if
    /// it is empty. Kinds that are already registered are logged and skipped.
    pub fn load_filtered(&self, whitelist: &[String]) {
        tracing::info!("Loading module prototypes");
        for logic in builtin_prototypes() {
            if !whitelist.is_empty() && !whitelist.iter().any(|n| n == logic.name()) {
                tracing::debug!("Prototype \"{}\" not whitelisted", logic.name());
                continue;
            }
            if let Err(e) = self.register(logic) {
                tracing::error!("{}", e);
            }
        }
        tracing::info!("{} prototypes available", self.prototypes.read().len());
    }

    /// Initialize `logic` as a prototype and add it to the registry.
    pub fn register(&self, logic: Box<dyn ModuleLogic>) -> Result<Arc<Module>> {
        let name = logic.name().to_string();
        if self.is_prototype_available(&name).is_some() {
            return Err(KernelError::PrototypeNotUnique(name));
        }

        let prototype = Module::new(logic);
        prototype.mark_prototype();
        prototype.initialize()?;

        let mut prototypes = self.prototypes.write();
        if prototypes.iter().any(|p| p.name() == name) {
            return Err(KernelError::PrototypeNotUnique(name));
        }
        tracing::debug!("Registered prototype \"{}\"", name);
        prototypes.push(Arc::clone(&prototype));
        Ok(prototype)
    }

    pub fn is_prototype(&self, module: &Arc<Module>) -> bool {
        self.prototypes
            .read()
            .iter()
            .any(|p| Arc::ptr_eq(p, module))
    }

    /// A fresh, initialized, unconnected instance of `prototype`.
    pub fn create(&self, prototype: &Arc<Module>) -> Result<Arc<Module>> {
        if !self.is_prototype(prototype) {
            return Err(KernelError::PrototypeUnknown(prototype.name().to_string()));
        }
        let logic = prototype
            .fresh_logic()
            .ok_or_else(|| KernelError::PrototypeUnknown(prototype.name().to_string()))?;

        tracing::debug!("Creating instance of \"{}\"", prototype.name());
        let module = Module::new(logic);
        module.initialize()?;
        Ok(module)
    }

    /// The prototype named `name`, if registered.
    pub fn is_prototype_available(&self, name: &str) -> Option<Arc<Module>> {
        self.prototypes
            .read()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub fn get_prototype_by_name(&self, name: &str) -> Result<Arc<Module>> {
        self.is_prototype_available(name)
            .ok_or_else(|| KernelError::PrototypeUnknown(name.to_string()))
    }

    /// The prototype `instance` was created from.
    pub fn get_prototype_by_instance(&self, instance: &Module) -> Result<Arc<Module>> {
        self.get_prototype_by_name(instance.name())
    }

    pub fn get_prototypes_by_type(&self, module_type: ModuleType) -> Vec<Arc<Module>> {
        self.prototypes
            .read()
            .iter()
            .filter(|p| p.module_type() == module_type)
            .cloned()
            .collect()
    }

    /// Every registered prototype, sorted by name.
    pub fn get_all_prototypes(&self) -> Vec<Arc<Module>> {
        let mut all = self.prototypes.read().clone();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Prototypes that can be attached to `module`.
    ///
    /// Without a module: every prototype without inputs, each with one
    /// combiner that only adds it. With a module: one combiner per pair of
    /// a module output and a prototype input accepting each other. Groups
    /// are sorted by prototype name.
    pub fn get_compatible_prototypes(
        self: &Arc<Self>,
        module: Option<&Arc<Module>>,
    ) -> Vec<CompatiblesGroup> {
        let prototypes = self.prototypes.read().clone();
        let mut groups: Vec<CompatiblesGroup> = match module {
            None => prototypes
                .into_iter()
                .filter(|p| !p.has_inputs())
                .map(|p| CompatiblesGroup {
                    combiners: vec![ApplyPrototypeCombiner::new(Arc::clone(self), Arc::clone(&p))],
                    prototype: p,
                })
                .collect(),
            Some(source) => prototypes
                .into_iter()
                .filter_map(|prototype| {
                    let mut combiners = Vec::new();
                    for output in source.outputs() {
                        for input in prototype.inputs() {
                            if output.connectable(&input) && input.connectable(&output) {
                                combiners.push(ApplyPrototypeCombiner::with_connection(
                                    Arc::clone(self),
                                    Arc::clone(source),
                                    output.name(),
                                    Arc::clone(&prototype),
                                    input.name(),
                                ));
                            }
                        }
                    }
                    (!combiners.is_empty()).then_some(CompatiblesGroup {
                        prototype,
                        combiners,
                    })
                })
                .collect(),
        };
        groups.sort_by(|a, b| a.prototype.name().cmp(b.prototype.name()));
        groups
    }
}

impl std::fmt::Debug for ModuleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFactory")
            .field("prototypes", &self.prototypes.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::module::ModuleState;
    use crate::modules::{data, fiber_display, nav_slices, DataModule};

    fn loaded() -> Arc<ModuleFactory> {
        let factory = ModuleFactory::new();
        factory.load();
        factory
    }

    #[test]
    fn test_load_registers_builtins() {
        let factory = loaded();
        assert!(factory.is_prototype_available(data::NAME).is_some());
        assert!(factory.is_prototype_available(nav_slices::NAME).is_some());
        assert!(factory.is_prototype_available("Volume Renderer").is_none());
    }

    #[test]
    fn test_load_twice_keeps_one_prototype_per_kind() {
        let factory = loaded();
        let before = factory.get_all_prototypes().len();
        factory.load();
        assert_eq!(factory.get_all_prototypes().len(), before);
    }

    #[test]
    fn test_whitelist() {
        let factory = ModuleFactory::new();
        factory.load_filtered(&[data::NAME.to_string()]);
        assert_eq!(factory.get_all_prototypes().len(), 1);
    }

    #[test]
    fn test_register_duplicate_fails() {
        let factory = loaded();
        assert!(matches!(
            factory.register(Box::new(DataModule::new())),
            Err(KernelError::PrototypeNotUnique(_))
        ));
    }

    #[test]
    fn test_create_yields_distinct_initialized_instances() {
        let factory = loaded();
        let prototype = factory.get_prototype_by_name(data::NAME).unwrap();
        let a = factory.create(&prototype).unwrap();
        let b = factory.create(&prototype).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), ModuleState::Initialized);
        assert!(!a.is_prototype());
        assert!(prototype.is_prototype());
        assert_ne!(
            a.get_output_connector("out").unwrap().id(),
            b.get_output_connector("out").unwrap().id()
        );
    }

    #[test]
    fn test_create_from_non_prototype_fails() {
        let factory = loaded();
        let prototype = factory.get_prototype_by_name(data::NAME).unwrap();
        let instance = factory.create(&prototype).unwrap();
        assert!(matches!(
            factory.create(&instance),
            Err(KernelError::PrototypeUnknown(_))
        ));
        assert_eq!(
            factory.get_prototype_by_instance(&instance).unwrap().id(),
            prototype.id()
        );
    }

    #[test]
    fn test_unknown_prototype_lookup() {
        let factory = loaded();
        assert!(matches!(
            factory.get_prototype_by_name("Volume Renderer"),
            Err(KernelError::PrototypeUnknown(_))
        ));
    }

    #[test]
    fn test_compatible_without_module_lists_sources() {
        let factory = loaded();
        let groups = factory.get_compatible_prototypes(None);
        let names: Vec<&str> = groups.iter().map(|g| g.prototype.name()).collect();
        assert_eq!(names, vec!["Data Module", "Fiber Creator"]);
        assert!(groups.iter().all(|g| g.combiners.len() == 1));
        assert!(groups[0].combiners[0].target_input().is_empty());
    }

    #[test]
    fn test_compatible_with_module_pairs_connectors() {
        let factory = loaded();
        let prototype = factory.get_prototype_by_name(data::NAME).unwrap();
        let source = factory.create(&prototype).unwrap();

        let groups = factory.get_compatible_prototypes(Some(&source));
        let names: Vec<&str> = groups.iter().map(|g| g.prototype.name()).collect();
        assert_eq!(names, vec!["Dataset Info", "Navigation Slices"]);
        assert!(!names.contains(&fiber_display::NAME));

        let nav = &groups[1].combiners[0];
        assert_eq!(nav.source_output(), "out");
        assert_eq!(nav.target_input(), "in");
    }

    #[test]
    fn test_prototypes_by_type() {
        let factory = loaded();
        let data_kinds = factory.get_prototypes_by_type(ModuleType::Data);
        assert_eq!(data_kinds.len(), 2);
    }
}
