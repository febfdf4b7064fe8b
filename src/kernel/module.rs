//! Modules: runnable units with a fixed set of connectors and their own thread.
//!
//! A module is split in two:
//! - **[`ModuleLogic`]**: the behaviour of one module kind. Implemented per kind,
//!   moved onto the module thread while it runs.
//! - **[`Module`]**: the shared, thread-safe shell. Owns connectors, properties,
//!   lifecycle state and the inbox, and is what containers and the factory handle.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized -> Initialized -> Running -> Ready | Crashed -> Stopped
//! ```
//!
//! A stopped module can be started again by adding it to a container.

use crate::error::{KernelError, Result};
use crate::kernel::combiner::DisconnectCombiner;
use crate::kernel::connector::{Connector, Direction, InputConnector, OutputConnector};
use crate::kernel::container::ModuleContainer;
use crate::kernel::data_type::{DataType, Transferable};
use crate::kernel::event::{ContainerEvent, ModuleEvent};
use crate::kernel::id::{ConnectorId, ModuleId};
use crate::kernel::property::{Properties, Property};
use crate::kernel::typed::{InputData, OutputData};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

static NO_PROPERTIES: LazyLock<Properties> = LazyLock::new(Properties::default);

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Uninitialized,
    Initialized,
    Running,
    Ready,
    Crashed,
    Stopped,
}

/// Coarse classification of module kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// Loads or produces datasets without inputs.
    Data,
    /// Anything else.
    Arbitrary,
}

/// A capability probe checked on the module thread before `main` runs.
#[cfg_attr(test, mockall::automock)]
pub trait Requirement: Send + Sync {
    fn is_met(&self) -> bool;

    fn description(&self) -> String;
}

/// Behaviour of one module kind.
pub trait ModuleLogic: Send + 'static {
    /// Name of the module kind. Prototype names are unique per factory.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn module_type(&self) -> ModuleType {
        ModuleType::Arbitrary
    }

    /// A fresh, unconfigured instance of the same kind.
    fn factory(&self) -> Box<dyn ModuleLogic>;

    /// Capability probes, collected once during initialization.
    fn requirements(&mut self) -> Vec<Box<dyn Requirement>> {
        Vec::new()
    }

    /// Declare connectors. Called once during initialization.
    fn connectors(&mut self, _builder: &mut ConnectorBuilder) -> Result<()> {
        Ok(())
    }

    /// Declare properties. Called once during initialization, after `connectors`.
    fn properties(&mut self, _properties: &mut Properties) -> Result<()> {
        Ok(())
    }

    /// Body of the module thread. Must call [`ModuleContext::ready`] and
    /// return once [`ModuleContext::should_stop`] turns true.
    fn main(&mut self, ctx: &ModuleContext) -> Result<()> {
        ctx.ready();
        while let Some(event) = ctx.wait_event() {
            self.handle_event(ctx, event)?;
        }
        Ok(())
    }

    /// Route an inbox event to the matching hook.
    fn handle_event(&mut self, ctx: &ModuleContext, event: ModuleEvent) -> Result<()> {
        match event {
            ModuleEvent::ConnectionEstablished { here, there } => {
                if let Some(connector) = ctx.connector(here) {
                    self.on_connection_established(ctx, connector, there);
                }
                Ok(())
            }
            ModuleEvent::ConnectionClosed { here, there } => {
                if let Some(connector) = ctx.connector(here) {
                    self.on_connection_closed(ctx, connector, there);
                }
                Ok(())
            }
            ModuleEvent::DataChanged { input, output } => match ctx.connector(input) {
                Some(connector) => self.on_data_changed(ctx, connector, output),
                None => Ok(()),
            },
            ModuleEvent::PropertyChanged { name } => match ctx.properties().find(&name) {
                Some(property) => self.on_property_changed(ctx, &property),
                None => Ok(()),
            },
            ModuleEvent::Stop => Ok(()),
        }
    }

    fn on_connection_established(&mut self, ctx: &ModuleContext, here: &Connector, there: ConnectorId) {
        tracing::debug!(
            "Module \"{}\": {} connected to {}",
            ctx.module().name(),
            here.name(),
            there
        );
    }

    fn on_connection_closed(&mut self, ctx: &ModuleContext, here: &Connector, there: ConnectorId) {
        tracing::debug!(
            "Module \"{}\": {} disconnected from {}",
            ctx.module().name(),
            here.name(),
            there
        );
    }

    fn on_data_changed(&mut self, ctx: &ModuleContext, input: &Connector, output: ConnectorId) -> Result<()> {
        tracing::debug!(
            "Module \"{}\": new data on {} from {}",
            ctx.module().name(),
            input.name(),
            output
        );
        Ok(())
    }

    fn on_property_changed(&mut self, ctx: &ModuleContext, property: &Property) -> Result<()> {
        tracing::debug!(
            "Module \"{}\": property \"{}\" is now {}",
            ctx.module().name(),
            property.name(),
            property.as_string()
        );
        Ok(())
    }
}

/// Collects a module's connectors during initialization.
pub struct ConnectorBuilder<'a> {
    owner: &'a Module,
    connectors: Vec<Connector>,
}

impl<'a> ConnectorBuilder<'a> {
    fn new(owner: &'a Module) -> Self {
        Self {
            owner,
            connectors: Vec::new(),
        }
    }

    pub fn add_input<T: Transferable>(&mut self, name: &str, description: &str) -> Result<InputData<T>> {
        let connector = self.add_input_of(name, description, T::data_type())?;
        Ok(InputData::new(connector))
    }

    pub fn add_output<T: Transferable>(&mut self, name: &str, description: &str) -> Result<OutputData<T>> {
        let connector = self.add(name, description, Direction::Output, T::data_type())?;
        let output = connector
            .as_output()
            .ok_or_else(|| KernelError::ConnectorInitFailed(connector.canonical_name()))?;
        Ok(OutputData::new(output))
    }

    /// An untyped input accepting `data_type` and every descendant of it.
    pub fn add_input_of(
        &mut self,
        name: &str,
        description: &str,
        data_type: &'static DataType,
    ) -> Result<InputConnector> {
        let connector = self.add(name, description, Direction::Input, data_type)?;
        connector
            .as_input()
            .ok_or_else(|| KernelError::ConnectorInitFailed(connector.canonical_name()))
    }

    fn add(
        &mut self,
        name: &str,
        description: &str,
        direction: Direction,
        data_type: &'static DataType,
    ) -> Result<Connector> {
        if self.connectors.iter().any(|c| c.name() == name) {
            return Err(KernelError::NameNotUnique(format!(
                "connector \"{}\" in module \"{}\"",
                name,
                self.owner.name()
            )));
        }
        let connector = Connector::new(name, description, direction, data_type, self.owner);
        self.connectors.push(connector.clone());
        Ok(connector)
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: ModuleState,
    ready: bool,
    crash: Option<String>,
}

/// Shared handle of a module instance or prototype.
pub struct Module {
    id: ModuleId,
    name: String,
    description: String,
    module_type: ModuleType,
    me: Weak<Module>,
    prototype: AtomicBool,
    init_started: AtomicBool,
    connectors: OnceLock<Vec<Connector>>,
    properties: OnceLock<Properties>,
    requirements: OnceLock<Vec<Box<dyn Requirement>>>,
    lifecycle: Mutex<Lifecycle>,
    lifecycle_changed: Condvar,
    container: RwLock<Weak<ModuleContainer>>,
    logic: Mutex<Option<Box<dyn ModuleLogic>>>,
    thread: Mutex<Option<JoinHandle<Box<dyn ModuleLogic>>>>,
    inbox_tx: Sender<ModuleEvent>,
    inbox_rx: Receiver<ModuleEvent>,
    stop_requested: AtomicBool,
}

impl Module {
    /// Wrap `logic` in an uninitialized module.
    pub fn new(logic: Box<dyn ModuleLogic>) -> Arc<Module> {
        let (inbox_tx, inbox_rx) = unbounded();
        Arc::new_cyclic(|me| Module {
            id: ModuleId::next(),
            name: logic.name().to_string(),
            description: logic.description().to_string(),
            module_type: logic.module_type(),
            me: me.clone(),
            prototype: AtomicBool::new(false),
            init_started: AtomicBool::new(false),
            connectors: OnceLock::new(),
            properties: OnceLock::new(),
            requirements: OnceLock::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: ModuleState::Uninitialized,
                ready: false,
                crash: None,
            }),
            lifecycle_changed: Condvar::new(),
            container: RwLock::new(Weak::new()),
            logic: Mutex::new(Some(logic)),
            thread: Mutex::new(None),
            inbox_tx,
            inbox_rx,
            stop_requested: AtomicBool::new(false),
        })
    }

    /// Run the init sequence: base properties, requirements, connectors,
    /// then module properties. Connector sets are fixed afterwards.
    pub fn initialize(&self) -> Result<()> {
        if self.init_started.swap(true, Ordering::AcqRel) {
            return Err(KernelError::ConnectorInitFailed(format!(
                "module \"{}\" is already initialized",
                self.name
            )));
        }

        let mut guard = self.logic.lock();
        let logic = guard.as_mut().ok_or_else(|| {
            KernelError::ConnectorInitFailed(format!("module \"{}\" has no logic", self.name))
        })?;

        let mut properties = Properties::new(Some(self.inbox_tx.clone()));
        properties.add_string("Name", "Name of this module instance", &self.name)?;
        properties.add_bool("active", "Whether the module takes part in processing", true)?;

        let requirements = logic.requirements();

        let mut builder = ConnectorBuilder::new(self);
        logic.connectors(&mut builder)?;
        let connectors = builder.connectors;

        logic.properties(&mut properties)?;
        drop(guard);

        // Guarded by init_started; the cells are empty here.
        let _ = self.requirements.set(requirements);
        let _ = self.connectors.set(connectors);
        let _ = self.properties.set(properties);

        self.update_lifecycle(|lc| lc.state = ModuleState::Initialized);
        tracing::debug!(
            "Module \"{}\" initialized with {} connectors",
            self.name,
            self.connectors().len()
        );
        Ok(())
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub(crate) fn weak_self(&self) -> Weak<Module> {
        self.me.clone()
    }

    pub fn is_prototype(&self) -> bool {
        self.prototype.load(Ordering::Acquire)
    }

    pub(crate) fn mark_prototype(&self) {
        self.prototype.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.connectors.get().is_some() && self.properties.get().is_some()
    }

    /// A fresh logic instance of the same kind, for cloning prototypes.
    pub(crate) fn fresh_logic(&self) -> Option<Box<dyn ModuleLogic>> {
        self.logic.lock().as_ref().map(|logic| logic.factory())
    }

    // ── Connectors ──

    pub fn connectors(&self) -> &[Connector] {
        self.connectors.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn inputs(&self) -> Vec<InputConnector> {
        self.connectors().iter().filter_map(Connector::as_input).collect()
    }

    pub fn outputs(&self) -> Vec<OutputConnector> {
        self.connectors().iter().filter_map(Connector::as_output).collect()
    }

    pub fn has_inputs(&self) -> bool {
        self.connectors().iter().any(Connector::is_input)
    }

    /// Look up a connector by plain or canonical name.
    pub fn get_connector(&self, name: &str) -> Result<Connector> {
        self.connectors()
            .iter()
            .find(|c| c.name() == name || c.canonical_name() == name)
            .cloned()
            .ok_or_else(|| KernelError::ConnectorNotFound {
                module: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn get_input_connector(&self, name: &str) -> Result<InputConnector> {
        let connector = self.get_connector(name)?;
        connector.as_input().ok_or_else(|| KernelError::ConnectorNotFound {
            module: self.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn get_output_connector(&self, name: &str) -> Result<OutputConnector> {
        let connector = self.get_connector(name)?;
        connector.as_output().ok_or_else(|| KernelError::ConnectorNotFound {
            module: self.name.clone(),
            name: name.to_string(),
        })
    }

    pub(crate) fn connector_by_id(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors().iter().find(|c| c.id() == id)
    }

    /// Disconnect every connector of this module.
    pub fn disconnect(&self) {
        for connector in self.connectors() {
            connector.disconnect_all();
        }
    }

    /// One combiner per live edge, each able to tear that edge down.
    pub fn possible_disconnections(&self) -> Vec<DisconnectCombiner> {
        self.connectors()
            .iter()
            .flat_map(|connector| {
                connector
                    .peers()
                    .into_iter()
                    .map(move |peer| DisconnectCombiner::new(connector.clone(), peer))
            })
            .collect()
    }

    // ── Properties ──

    pub fn properties(&self) -> &Properties {
        self.properties.get().unwrap_or(&NO_PROPERTIES)
    }

    /// Whether the `active` property is set.
    pub fn is_active(&self) -> bool {
        self.properties()
            .find("active")
            .and_then(|p| p.as_bool())
            .unwrap_or(true)
    }

    // ── Lifecycle ──

    pub fn state(&self) -> ModuleState {
        self.lifecycle.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.lock().ready
    }

    pub fn is_crashed(&self) -> bool {
        self.lifecycle.lock().crash.is_some()
    }

    pub fn is_ready_or_crashed(&self) -> bool {
        let lc = self.lifecycle.lock();
        lc.ready || lc.crash.is_some()
    }

    pub fn crash_reason(&self) -> Option<String> {
        self.lifecycle.lock().crash.clone()
    }

    /// Block until the module signalled ready or crashed.
    pub fn wait_ready_or_crashed(&self) {
        let mut lc = self.lifecycle.lock();
        while !(lc.ready || lc.crash.is_some()) {
            self.lifecycle_changed.wait(&mut lc);
        }
    }

    /// As [`wait_ready_or_crashed`](Self::wait_ready_or_crashed), giving up
    /// after `timeout`. Returns whether the condition was reached.
    pub fn wait_ready_or_crashed_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lc = self.lifecycle.lock();
        while !(lc.ready || lc.crash.is_some()) {
            if self
                .lifecycle_changed
                .wait_until(&mut lc, deadline)
                .timed_out()
            {
                return lc.ready || lc.crash.is_some();
            }
        }
        true
    }

    /// Whether a module thread exists and has not finished.
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Ask the module thread to finish. Does not wait.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.post(ModuleEvent::Stop);
    }

    pub fn container(&self) -> Option<Arc<ModuleContainer>> {
        self.container.read().upgrade()
    }

    pub(crate) fn set_container(&self, container: Weak<ModuleContainer>) {
        *self.container.write() = container;
    }

    pub(crate) fn clear_container(&self) {
        *self.container.write() = Weak::new();
    }

    pub(crate) fn post(&self, event: ModuleEvent) {
        // The receiver lives as long as self.
        let _ = self.inbox_tx.send(event);
    }

    fn update_lifecycle(&self, f: impl FnOnce(&mut Lifecycle)) {
        let mut lc = self.lifecycle.lock();
        f(&mut lc);
        drop(lc);
        self.lifecycle_changed.notify_all();
    }

    fn emit(&self, event: ContainerEvent) {
        if let Some(container) = self.container() {
            container.emit(event);
        }
    }

    pub(crate) fn mark_ready(&self) {
        let mut lc = self.lifecycle.lock();
        if lc.ready || lc.crash.is_some() {
            return;
        }
        lc.ready = true;
        lc.state = ModuleState::Ready;
        drop(lc);

        tracing::info!("Module \"{}\" is ready", self.name);
        self.emit(ContainerEvent::Ready {
            module: self.id,
            name: self.name.clone(),
        });
        self.lifecycle_changed.notify_all();
    }

    fn mark_crashed(&self, reason: String) {
        tracing::error!("Module \"{}\" crashed: {}", self.name, reason);
        self.emit(ContainerEvent::Crashed {
            module: self.id,
            name: self.name.clone(),
            reason: reason.clone(),
        });
        self.update_lifecycle(|lc| {
            lc.state = ModuleState::Crashed;
            lc.crash = Some(reason);
        });
    }

    fn check_requirements(&self) -> Result<()> {
        for requirement in self.requirements.get().into_iter().flatten() {
            if !requirement.is_met() {
                return Err(KernelError::RequirementNotMet(requirement.description()));
            }
        }
        Ok(())
    }

    /// Spawn the module thread. A no-op if it is already running.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        if self.is_prototype() {
            return Err(KernelError::IsPrototype(self.name.clone()));
        }
        if !self.is_initialized() {
            return Err(KernelError::Uninitialized(self.name.clone()));
        }

        // A previous run may have finished, or still be winding down after a
        // stop request, without being joined.
        let stale = self.thread.lock().as_ref().is_some_and(|handle| {
            handle.thread().id() != thread::current().id()
                && (handle.is_finished() || self.stop_requested.load(Ordering::Acquire))
        });
        if stale {
            self.join();
        }

        let taken = self.logic.lock().take();
        let Some(logic) = taken else {
            if self.is_running() {
                tracing::debug!("Module \"{}\" is already running", self.name);
                return Ok(());
            }
            return Err(KernelError::ModuleFailed {
                module: self.name.clone(),
                message: "module logic is unavailable".to_string(),
            });
        };

        self.stop_requested.store(false, Ordering::Release);
        self.update_lifecycle(|lc| {
            lc.state = ModuleState::Running;
            lc.ready = false;
            lc.crash = None;
        });

        let module = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("module:{}", self.name))
            .spawn(move || run_module(module, logic));

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.mark_crashed(format!("could not spawn thread: {}", e));
                self.update_lifecycle(|lc| {
                    lc.state = ModuleState::Stopped;
                    lc.ready = false;
                });
                Err(KernelError::Io(e))
            }
        }
    }

    /// Wait for the module thread to finish and take its logic back.
    pub(crate) fn join(&self) {
        let taken = self.thread.lock().take();
        let Some(handle) = taken else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // The logic comes back once this thread returns. Keep the handle
            // so the next start can collect it.
            tracing::debug!("Module \"{}\" cannot join its own thread", self.name);
            *self.thread.lock() = Some(handle);
            return;
        }
        match handle.join() {
            Ok(logic) => *self.logic.lock() = Some(logic),
            Err(_) => tracing::error!(
                "Module \"{}\" thread panicked outside its main loop",
                self.name
            ),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("prototype", &self.is_prototype())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

fn run_module(module: Arc<Module>, mut logic: Box<dyn ModuleLogic>) -> Box<dyn ModuleLogic> {
    tracing::debug!("Module \"{}\" thread started", module.name);
    let ctx = ModuleContext {
        module: Arc::clone(&module),
    };

    let outcome = module.check_requirements().and_then(|()| {
        match panic::catch_unwind(AssertUnwindSafe(|| logic.main(&ctx))) {
            Ok(result) => result.map_err(|e| KernelError::ModuleFailed {
                module: module.name.clone(),
                message: e.to_string(),
            }),
            Err(payload) => Err(KernelError::ModuleFailed {
                module: module.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    });

    match outcome {
        Ok(()) if !module.is_ready() => {
            module.mark_crashed("main loop finished without signalling ready".to_string())
        }
        Ok(()) => {}
        Err(e) => module.mark_crashed(e.to_string()),
    }

    module.disconnect();
    module.update_lifecycle(|lc| {
        lc.state = ModuleState::Stopped;
        lc.ready = false;
    });
    tracing::debug!("Module \"{}\" thread finished", module.name);
    logic
}

/// What a running module sees of itself.
pub struct ModuleContext {
    module: Arc<Module>,
}

impl ModuleContext {
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Signal that the module finished its setup.
    pub fn ready(&self) {
        self.module.mark_ready();
    }

    pub fn should_stop(&self) -> bool {
        self.module.stop_requested.load(Ordering::Acquire)
    }

    pub fn properties(&self) -> &Properties {
        self.module.properties()
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.module.connector_by_id(id)
    }

    /// Block for the next inbox event. `None` once a stop was requested.
    pub fn wait_event(&self) -> Option<ModuleEvent> {
        loop {
            if self.should_stop() {
                return None;
            }
            match self.module.inbox_rx.recv() {
                Ok(ModuleEvent::Stop) => continue,
                Ok(event) => return Some(event),
                Err(_) => return None,
            }
        }
    }

    /// Like [`wait_event`](Self::wait_event) but gives up after `timeout`.
    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<ModuleEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.should_stop() {
                return None;
            }
            match self.module.inbox_rx.recv_deadline(deadline) {
                Ok(ModuleEvent::Stop) => continue,
                Ok(event) => return Some(event),
                Err(_) => return None,
            }
        }
    }

    /// The next pending event, without blocking.
    pub fn try_event(&self) -> Option<ModuleEvent> {
        loop {
            match self.module.inbox_rx.try_recv() {
                Ok(ModuleEvent::Stop) => continue,
                Ok(event) => return Some(event),
                Err(_) => return None,
            }
        }
    }
}
