//! Integration tests for the process-wide prototype registry
//!
//! The global factory is shared by every test in this binary, so these run
//! one at a time.

mod common;

use common::{test_timeout, Emitter};
use modkernel::kernel::combiner::ApplyOutcome;
use modkernel::kernel::{ModuleCombiner, ModuleContainer, ModuleFactory, ModuleState};
use modkernel::modules::{data, dataset_info, fiber_creator, fiber_display, nav_slices};
use modkernel::KernelError;
use serial_test::serial;
use std::sync::Arc;

fn global() -> Arc<ModuleFactory> {
    let factory = ModuleFactory::global();
    factory.load();
    factory
}

#[test]
#[serial]
fn test_global_is_shared() {
    let factory = global();
    assert!(Arc::ptr_eq(&factory, &ModuleFactory::global()));

    // Loading again does not duplicate anything.
    let count = factory.get_all_prototypes().len();
    factory.load();
    assert_eq!(factory.get_all_prototypes().len(), count);
}

#[test]
#[serial]
fn test_custom_kind_can_be_registered_once() {
    let factory = global();
    if factory.is_prototype_available("Emitter").is_none() {
        factory.register(Box::new(Emitter::new().0)).unwrap();
    }

    let again = factory.register(Box::new(Emitter::new().0));
    assert!(matches!(again, Err(KernelError::PrototypeNotUnique(_))));

    let prototype = factory.get_prototype_by_name("Emitter").unwrap();
    let instance = factory.create(&prototype).unwrap();
    assert_eq!(instance.name(), "Emitter");
    assert!(instance.get_output_connector("out").is_ok());
}

#[test]
#[serial]
fn test_prototypes_never_run() {
    let factory = global();
    let prototype = factory.get_prototype_by_name(data::NAME).unwrap();
    let container = ModuleContainer::new("prototypes");

    assert!(matches!(
        container.add(&prototype),
        Err(KernelError::IsPrototype(_))
    ));
    assert_eq!(prototype.state(), ModuleState::Initialized);
    assert!(container.is_empty());
}

#[test]
#[serial]
fn test_compatibility_follows_type_hierarchy() {
    let factory = global();

    let fibers = factory
        .create(&factory.get_prototype_by_name(fiber_creator::NAME).unwrap())
        .unwrap();
    let names: Vec<String> = factory
        .get_compatible_prototypes(Some(&fibers))
        .iter()
        .map(|g| g.prototype.name().to_string())
        .collect();

    assert!(names.contains(&fiber_display::NAME.to_string()));
    assert!(names.contains(&dataset_info::NAME.to_string()));
    assert!(!names.contains(&nav_slices::NAME.to_string()));
}

#[test]
#[serial]
fn test_building_a_graph_from_compatibles() {
    let factory = global();
    let container = ModuleContainer::new("compatibles");

    let mut add_source = factory
        .get_compatible_prototypes(None)
        .into_iter()
        .find(|g| g.prototype.name() == fiber_creator::NAME)
        .and_then(|g| g.combiners.into_iter().next())
        .unwrap();
    let source = add_source.apply(&container).module().cloned().unwrap();

    let mut attach = factory
        .get_compatible_prototypes(Some(&source))
        .into_iter()
        .find(|g| g.prototype.name() == fiber_display::NAME)
        .and_then(|g| g.combiners.into_iter().next())
        .unwrap();
    let outcome = attach.apply(&container);
    assert!(matches!(outcome, ApplyOutcome::Connected(_)));

    let display = outcome.module().unwrap();
    let count = display.properties().find("Fiber count").unwrap();
    assert!(common::wait_until(|| count.as_int() == Some(10)));
    assert!(display.wait_ready_or_crashed_timeout(test_timeout()));

    container.stop();
}
