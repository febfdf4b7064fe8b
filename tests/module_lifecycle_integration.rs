//! Integration tests for module threads and containers
//!
//! These tests validate the running graph:
//! - Data delivery from outputs to connected inputs
//! - Start, stop and restart through containers
//! - Crash detection for failing and panicking modules

mod common;

use common::{initialized, start_in, test_timeout, wait_until, Emitter, Recorder};
use modkernel::dataset::ScalarField;
use modkernel::kernel::{
    ContainerEvent, ModuleContainer, ModuleContext, ModuleLogic, ModuleState,
};
use modkernel::{KernelError, Result};
use std::time::Duration;

fn field(first: f64) -> ScalarField {
    ScalarField::new([2, 1, 1], vec![first, 0.0]).unwrap()
}

struct Failing;

impl ModuleLogic for Failing {
    fn name(&self) -> &str {
        "Failing"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Failing)
    }

    fn main(&mut self, _ctx: &ModuleContext) -> Result<()> {
        Err(KernelError::Property("dataset could not be opened".into()))
    }
}

struct Panicking;

impl ModuleLogic for Panicking {
    fn name(&self) -> &str {
        "Panicking"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Panicking)
    }

    fn main(&mut self, ctx: &ModuleContext) -> Result<()> {
        ctx.ready();
        panic!("lost the volume");
    }
}

struct Quitter;

impl ModuleLogic for Quitter {
    fn name(&self) -> &str {
        "Quitter"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Quitter)
    }

    fn main(&mut self, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }
}

/// Removes itself from its container on the first run only.
#[derive(Default)]
struct Leaver {
    left: bool,
}

impl ModuleLogic for Leaver {
    fn name(&self) -> &str {
        "Leaver"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Leaver::default())
    }

    fn main(&mut self, ctx: &ModuleContext) -> Result<()> {
        ctx.ready();
        if !self.left {
            self.left = true;
            if let Some(container) = ctx.module().container() {
                container.remove(ctx.module());
            }
        }
        while let Some(event) = ctx.wait_event() {
            self.handle_event(ctx, event)?;
        }
        Ok(())
    }
}

#[test]
fn test_each_update_is_delivered_once() {
    let container = ModuleContainer::new("delivery");
    let (emitter, handle) = Emitter::new();
    let (recorder, observed) = Recorder::new();
    let source = start_in(&container, Box::new(emitter));
    let sink = start_in(&container, Box::new(recorder));

    sink.get_input_connector("in")
        .unwrap()
        .connect(&source.get_output_connector("out").unwrap())
        .unwrap();

    for i in 1..=5 {
        handle.emit(field(i as f64));
    }

    assert!(wait_until(|| observed.data_changed() == 5));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(observed.data_changed(), 5);
    assert_eq!(observed.values().last().copied(), Some(5.0));

    container.stop();
}

#[test]
fn test_reading_inputs() {
    let container = ModuleContainer::new("reading");
    let (emitter, handle) = Emitter::new();
    let source = start_in(&container, Box::new(emitter));
    // Not started, so nothing else reads the input meanwhile.
    let sink = initialized(Box::new(Recorder::new().0));
    let input = sink.get_input_connector("in").unwrap();

    assert!(matches!(
        input.get_packet(),
        Err(KernelError::ConnectorUnconnected(_))
    ));

    input
        .connect(&source.get_output_connector("out").unwrap())
        .unwrap();
    assert!(input.get_packet().unwrap().is_none());

    handle.emit(field(3.5));
    assert!(input.updated());
    let packet = input.get_packet().unwrap().unwrap();
    assert_eq!(packet.downcast::<ScalarField>().unwrap().value_at(0, 0, 0), Some(3.5));
    assert!(!input.updated());

    container.stop();
}

#[test]
fn test_disconnect_notifies_running_module() {
    let container = ModuleContainer::new("disconnect");
    let source = start_in(&container, Box::new(Emitter::new().0));
    let (recorder, observed) = Recorder::new();
    let sink = start_in(&container, Box::new(recorder));

    let output = source.get_output_connector("out").unwrap();
    let input = sink.get_input_connector("in").unwrap();
    input.connect(&output).unwrap();
    output.disconnect(&input).unwrap();

    assert!(wait_until(|| observed.connections_closed() == 1));
    assert!(!input.is_connected());

    container.stop();
}

#[test]
fn test_remove_stops_and_disconnects() {
    let container = ModuleContainer::new("remove");
    let source = start_in(&container, Box::new(Emitter::new().0));
    let sink = start_in(&container, Box::new(Recorder::new().0));
    let output = source.get_output_connector("out").unwrap();
    sink.get_input_connector("in").unwrap().connect(&output).unwrap();

    container.remove(&sink);

    assert_eq!(sink.state(), ModuleState::Stopped);
    assert!(!container.contains(&sink));
    assert!(sink.container().is_none());
    assert!(!output.is_connected());
    assert_eq!(container.len(), 1);

    container.stop();
    assert!(container.is_empty());
    assert_eq!(source.state(), ModuleState::Stopped);
}

#[test]
fn test_module_restarts_after_removal() {
    let container = ModuleContainer::new("restart");
    let sink = start_in(&container, Box::new(Recorder::new().0));
    container.remove(&sink);

    container.add(&sink).unwrap();
    assert!(sink.wait_ready_or_crashed_timeout(test_timeout()));
    assert!(sink.is_ready());
    assert_eq!(sink.state(), ModuleState::Ready);

    container.stop();
}

#[test]
fn test_removed_module_is_no_longer_ready() {
    let container = ModuleContainer::new("unready");
    let sink = start_in(&container, Box::new(Recorder::new().0));
    assert!(sink.is_ready());

    container.remove(&sink);

    assert_eq!(sink.state(), ModuleState::Stopped);
    assert!(!sink.is_ready());
    assert!(!sink.is_ready_or_crashed());
    assert!(!sink.is_running());
}

#[test]
fn test_self_removed_module_can_be_added_again() {
    let first = ModuleContainer::new("first");
    let second = ModuleContainer::new("second");
    // Not start_in: ready is cleared again as soon as the module leaves.
    let module = initialized(Box::new(Leaver::default()));
    first.add(&module).unwrap();

    assert!(wait_until(|| !first.contains(&module) && !module.is_running()));
    assert!(!module.is_ready());

    second.add(&module).unwrap();
    assert!(module.wait_ready_or_crashed_timeout(test_timeout()));
    assert!(module.is_ready());
    assert!(module.is_running());
    assert!(second.contains(&module));

    second.stop();
    assert_eq!(module.state(), ModuleState::Stopped);
}

#[test]
fn test_moving_between_containers() {
    let first = ModuleContainer::new("first");
    let second = ModuleContainer::new("second");
    let sink = start_in(&first, Box::new(Recorder::new().0));

    second.add(&sink).unwrap();
    assert!(sink.wait_ready_or_crashed_timeout(test_timeout()));

    assert!(!first.contains(&sink));
    assert!(second.contains(&sink));
    assert_eq!(sink.container().map(|c| c.name().to_string()), Some("second".into()));

    second.stop();
}

#[test]
fn test_failing_main_marks_crash() {
    let container = ModuleContainer::new("failing");
    let events = container.subscribe();
    let module = start_in(&container, Box::new(Failing));

    assert!(module.is_crashed());
    assert!(module
        .crash_reason()
        .unwrap()
        .contains("dataset could not be opened"));

    let seen: Vec<ContainerEvent> = events.try_iter().collect();
    assert!(matches!(seen.first(), Some(ContainerEvent::Associated { .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, ContainerEvent::Crashed { .. })));

    container.stop();
}

#[test]
fn test_panic_is_contained() {
    let container = ModuleContainer::new("panicking");
    let module = start_in(&container, Box::new(Panicking));

    assert!(wait_until(|| module.is_crashed()));
    assert!(module.crash_reason().unwrap().contains("lost the volume"));

    // The rest of the container keeps working.
    let sink = start_in(&container, Box::new(Recorder::new().0));
    assert!(sink.is_ready());

    container.stop();
}

#[test]
fn test_returning_without_ready_is_a_crash() {
    let container = ModuleContainer::new("quitter");
    let module = start_in(&container, Box::new(Quitter));

    assert!(module.is_crashed());
    assert!(!module.is_ready());

    container.stop();
}

#[test]
fn test_container_reports_ready() {
    let container = ModuleContainer::new("events");
    let events = container.subscribe();
    let sink = start_in(&container, Box::new(Recorder::new().0));

    let seen: Vec<ContainerEvent> = events.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            ContainerEvent::Associated {
                module: sink.id(),
                name: "Recorder".into()
            },
            ContainerEvent::Ready {
                module: sink.id(),
                name: "Recorder".into()
            },
        ]
    );

    container.stop();
    assert!(matches!(
        events.try_recv(),
        Ok(ContainerEvent::Removed { .. })
    ));
}
