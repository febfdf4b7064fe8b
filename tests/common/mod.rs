//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use modkernel::dataset::ScalarField;
use modkernel::kernel::{
    Connector, ConnectorBuilder, ConnectorId, InputData, Module, ModuleContainer, ModuleContext,
    ModuleLogic, OutputData,
};
use modkernel::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Poll `condition` until it holds or the test timeout passes
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Initialize `logic` and start it in `container`, waiting until it is ready
pub fn start_in(container: &Arc<ModuleContainer>, logic: Box<dyn ModuleLogic>) -> Arc<Module> {
    let module = Module::new(logic);
    module.initialize().expect("initialize");
    container.add(&module).expect("add to container");
    assert!(
        module.wait_ready_or_crashed_timeout(test_timeout()),
        "module \"{}\" did not get ready",
        module.name()
    );
    module
}

/// Initialize `logic` without starting it
pub fn initialized(logic: Box<dyn ModuleLogic>) -> Arc<Module> {
    let module = Module::new(logic);
    module.initialize().expect("initialize");
    module
}

/// Shared view on an [`Emitter`]'s output, usable after the logic moved
/// onto its module thread
#[derive(Clone, Default)]
pub struct EmitterHandle {
    out: Arc<Mutex<Option<OutputData<ScalarField>>>>,
}

impl EmitterHandle {
    pub fn emit(&self, field: ScalarField) {
        let out = self.out.lock().clone().expect("emitter initialized");
        out.update_data(field);
    }
}

/// Source with a single scalar field output named "out"
pub struct Emitter {
    handle: EmitterHandle,
}

impl Emitter {
    pub fn new() -> (Self, EmitterHandle) {
        let handle = EmitterHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl ModuleLogic for Emitter {
    fn name(&self) -> &str {
        "Emitter"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Emitter::new().0)
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        let out = builder.add_output::<ScalarField>("out", "emitted fields")?;
        *self.handle.out.lock() = Some(out);
        Ok(())
    }
}

/// What a [`Recorder`] observed on its input
#[derive(Clone, Default)]
pub struct Observed {
    pub data_changed: Arc<AtomicUsize>,
    pub connections_closed: Arc<AtomicUsize>,
    /// First value of every field read from the input
    pub values: Arc<Mutex<Vec<f64>>>,
}

impl Observed {
    pub fn data_changed(&self) -> usize {
        self.data_changed.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.connections_closed.load(Ordering::SeqCst)
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.lock().clone()
    }
}

/// Sink with a single scalar field input named "in" that records what it sees
pub struct Recorder {
    input: Option<InputData<ScalarField>>,
    observed: Observed,
}

impl Recorder {
    pub fn new() -> (Self, Observed) {
        let observed = Observed::default();
        (
            Self {
                input: None,
                observed: observed.clone(),
            },
            observed,
        )
    }
}

impl ModuleLogic for Recorder {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Recorder::new().0)
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.input = Some(builder.add_input("in", "recorded fields")?);
        Ok(())
    }

    fn on_connection_closed(&mut self, _ctx: &ModuleContext, _here: &Connector, _there: ConnectorId) {
        self.observed.connections_closed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_data_changed(&mut self, _ctx: &ModuleContext, _input: &Connector, _output: ConnectorId) -> Result<()> {
        if let Some(input) = &self.input {
            if let Some(field) = input.get_data()? {
                if let Some(first) = field.value_at(0, 0, 0) {
                    self.observed.values.lock().push(first);
                }
            }
        }
        self.observed.data_changed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
