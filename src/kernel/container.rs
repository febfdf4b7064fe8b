//! Module containers.
//!
//! A container owns a set of running modules. Adding a module starts its
//! thread; removing it stops and joins the thread. A module belongs to at
//! most one container at a time.
//!
//! Containers have no `Drop` hook: owners call [`ModuleContainer::stop`]
//! before letting go of the last handle.
//!
//! Moving one module between two containers from two threads at once is not
//! serialized. Both sides may start or join the same module thread.

use crate::error::{KernelError, Result};
use crate::kernel::event::ContainerEvent;
use crate::kernel::module::{Module, ModuleType};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

pub struct ModuleContainer {
    name: String,
    me: Weak<ModuleContainer>,
    modules: RwLock<Vec<Arc<Module>>>,
    subscribers: Mutex<Vec<Sender<ContainerEvent>>>,
}

impl ModuleContainer {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| ModuleContainer {
            name,
            me: me.clone(),
            modules: RwLock::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take ownership of `module` and start its thread.
    ///
    /// A module already in this container is left alone. A module owned by
    /// another container is removed there first.
    pub fn add(&self, module: &Arc<Module>) -> Result<()> {
        if module.is_prototype() {
            return Err(KernelError::IsPrototype(module.name().to_string()));
        }
        if !module.is_initialized() {
            return Err(KernelError::Uninitialized(module.name().to_string()));
        }

        if let Some(owner) = module.container() {
            if std::ptr::eq(Arc::as_ptr(&owner), self) {
                tracing::debug!(
                    "Module \"{}\" is already in container \"{}\"",
                    module.name(),
                    self.name
                );
                return Ok(());
            }
            owner.remove(module);
        }

        self.modules.write().push(Arc::clone(module));
        module.set_container(self.me.clone());
        tracing::info!("Adding module \"{}\" to container \"{}\"", module.name(), self.name);
        self.emit(ContainerEvent::Associated {
            module: module.id(),
            name: module.name().to_string(),
        });

        if let Err(e) = module.start() {
            self.modules.write().retain(|m| !Arc::ptr_eq(m, module));
            module.clear_container();
            return Err(e);
        }
        Ok(())
    }

    /// Stop `module`, wait for its thread and drop it from the container.
    /// A no-op for modules that are not members.
    pub fn remove(&self, module: &Arc<Module>) {
        if !self.contains(module) {
            return;
        }
        tracing::info!(
            "Removing module \"{}\" from container \"{}\"",
            module.name(),
            self.name
        );

        // Joined outside the lock; the module thread may call back into us.
        module.request_stop();
        module.join();
        module.disconnect();

        self.modules.write().retain(|m| !Arc::ptr_eq(m, module));
        module.clear_container();
        self.emit(ContainerEvent::Removed {
            module: module.id(),
            name: module.name().to_string(),
        });
    }

    /// Stop every member and empty the container.
    pub fn stop(&self) {
        let members = std::mem::take(&mut *self.modules.write());
        tracing::info!(
            "Stopping container \"{}\" with {} modules",
            self.name,
            members.len()
        );
        for module in &members {
            module.request_stop();
        }
        for module in &members {
            module.join();
            module.disconnect();
            module.clear_container();
            self.emit(ContainerEvent::Removed {
                module: module.id(),
                name: module.name().to_string(),
            });
        }
    }

    pub fn contains(&self, module: &Arc<Module>) -> bool {
        self.modules.read().iter().any(|m| Arc::ptr_eq(m, module))
    }

    /// Snapshot of the members.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.read().clone()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Vec<Arc<Module>> {
        self.modules
            .read()
            .iter()
            .filter(|m| m.name() == name)
            .cloned()
            .collect()
    }

    /// Members of kind [`ModuleType::Data`].
    pub fn data_modules(&self) -> Vec<Arc<Module>> {
        self.modules
            .read()
            .iter()
            .filter(|m| m.module_type() == ModuleType::Data)
            .cloned()
            .collect()
    }

    /// Receive lifecycle notifications of every member.
    pub fn subscribe(&self) -> Receiver<ContainerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: ContainerEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("name", &self.name)
            .field("modules", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::module::ModuleState;
    use crate::kernel::testing::{Sink, Source};
    use std::time::Duration;

    fn initialized_sink() -> Arc<Module> {
        let module = Module::new(Box::new(Sink::default()));
        module.initialize().unwrap();
        module
    }

    #[test]
    fn test_add_uninitialized_fails() {
        let container = ModuleContainer::new("test");
        let module = Module::new(Box::new(Sink::default()));
        assert!(matches!(
            container.add(&module),
            Err(KernelError::Uninitialized(_))
        ));
        assert!(container.is_empty());
    }

    #[test]
    fn test_add_starts_and_remove_stops() {
        let container = ModuleContainer::new("test");
        let module = initialized_sink();

        container.add(&module).unwrap();
        assert!(module.wait_ready_or_crashed_timeout(Duration::from_secs(5)));
        assert!(container.contains(&module));
        assert!(module.container().is_some());

        container.remove(&module);
        assert!(!container.contains(&module));
        assert!(module.container().is_none());
        assert_eq!(module.state(), ModuleState::Stopped);
    }

    #[test]
    fn test_add_twice_is_noop() {
        let container = ModuleContainer::new("test");
        let module = initialized_sink();
        container.add(&module).unwrap();
        container.add(&module).unwrap();
        assert_eq!(container.len(), 1);
        container.stop();
    }

    #[test]
    fn test_module_moves_between_containers() {
        let first = ModuleContainer::new("first");
        let second = ModuleContainer::new("second");
        let module = initialized_sink();

        first.add(&module).unwrap();
        module.wait_ready_or_crashed();
        second.add(&module).unwrap();

        assert!(!first.contains(&module));
        assert!(second.contains(&module));
        assert!(module.wait_ready_or_crashed_timeout(Duration::from_secs(5)));
        second.stop();
    }

    #[test]
    fn test_stop_clears_and_disconnects() {
        let container = ModuleContainer::new("test");
        let source = Module::new(Box::new(Source::default()));
        source.initialize().unwrap();
        let sink = initialized_sink();

        container.add(&source).unwrap();
        container.add(&sink).unwrap();
        source.wait_ready_or_crashed();
        sink.wait_ready_or_crashed();

        let out = source.get_output_connector("out").unwrap();
        let input = sink.get_input_connector("in").unwrap();
        input.connect(&out).unwrap();

        container.stop();
        assert!(container.is_empty());
        assert!(!out.is_connected());
        assert!(!input.is_connected());
    }

    #[test]
    fn test_subscribers_see_lifecycle() {
        let container = ModuleContainer::new("test");
        let events = container.subscribe();
        let module = initialized_sink();

        container.add(&module).unwrap();
        module.wait_ready_or_crashed();
        container.remove(&module);

        let seen: Vec<ContainerEvent> = events.try_iter().collect();
        assert!(matches!(seen.first(), Some(ContainerEvent::Associated { .. })));
        assert!(seen.iter().any(|e| matches!(e, ContainerEvent::Ready { .. })));
        assert!(matches!(seen.last(), Some(ContainerEvent::Removed { .. })));
    }
}
