//! ProjectFileCombiner: build a module graph from a declarative file.
//!
//! The format is line oriented:
//!
//! ```text
//! // comment
//! MODULE:<id>:<prototype name>
//! PROPERTY:(<id>,<property name>)=<value>
//! CONNECTION:(<id>,<output name>)->(<id>,<input name>)
//! ```
//!
//! Parsing creates (but does not start) one module per `MODULE` line.
//! Applying then sets properties, adds every module to the target container,
//! waits for them to get ready and finally wires the connections. Every bad
//! declaration is logged and skipped on its own.

use crate::error::{Result, ResultExt};
use crate::kernel::combiner::report::{
    ApplyReport, DeclarationKind, Outcome, ReportEntry, SkipReason,
};
use crate::kernel::combiner::ModuleCombiner;
use crate::kernel::container::ModuleContainer;
use crate::kernel::factory::ModuleFactory;
use crate::kernel::module::Module;
use crate::kernel::property::PropertyPurpose;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Conventional extension of project files.
pub const PROJECT_FILE_EXTENSION: &str = "owproj";

static MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^MODULE:([0-9]*):(.*)$").expect("static regex should not panic")
});
static CONNECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CONNECTION:\(([0-9]*),(.*)\)->\(([0-9]*),(.*)\)$")
        .expect("static regex should not panic")
});
static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PROPERTY:\(([0-9]*),(.*)\)=(.*)$").expect("static regex should not panic")
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//.*$").expect("static regex should not panic"));

struct ModuleDecl {
    line: usize,
    text: String,
    module: Arc<Module>,
}

struct ConnectionDecl {
    line: usize,
    text: String,
    from: (u32, String),
    to: (u32, String),
}

struct PropertyDecl {
    line: usize,
    text: String,
    module: u32,
    name: String,
    value: String,
}

fn entry(line: usize, kind: DeclarationKind, text: &str, outcome: Outcome) -> ReportEntry {
    ReportEntry {
        line,
        kind,
        declaration: text.to_string(),
        outcome,
    }
}

fn skipped(reason: SkipReason) -> Outcome {
    Outcome::Skipped { reason }
}

pub struct ProjectFileCombiner {
    factory: Arc<ModuleFactory>,
    source: Option<PathBuf>,
    modules: BTreeMap<u32, ModuleDecl>,
    connections: Vec<ConnectionDecl>,
    properties: Vec<PropertyDecl>,
    /// Declarations already rejected while parsing.
    entries: Vec<ReportEntry>,
}

impl ProjectFileCombiner {
    pub fn new(factory: Arc<ModuleFactory>) -> Self {
        Self {
            factory,
            source: None,
            modules: BTreeMap::new(),
            connections: Vec::new(),
            properties: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Open and parse the project at `path`.
    pub fn from_path(factory: Arc<ModuleFactory>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading project file \"{}\"", path.display());
        let file = File::open(path)
            .with_context(|| format!("The project file \"{}\" does not exist", path.display()))?;

        let mut combiner = Self::new(factory);
        combiner.source = Some(path.to_path_buf());
        combiner
            .parse_reader(BufReader::new(file))
            .with_context(|| format!("Reading project file \"{}\"", path.display()))?;
        Ok(combiner)
    }

    pub fn parse(&mut self, text: &str) {
        for (index, line) in text.lines().enumerate() {
            self.parse_line(index + 1, line);
        }
        tracing::debug!("Parsing done");
    }

    /// Parse line by line. Invalid UTF-8 is replaced rather than rejected, so
    /// only I/O failures abort.
    pub fn parse_reader(&mut self, mut reader: impl BufRead) -> Result<()> {
        let mut buf = Vec::new();
        let mut number = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            number += 1;
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            let line = String::from_utf8_lossy(&buf);
            self.parse_line(number, &line);
        }
        tracing::debug!("Parsing done");
        Ok(())
    }

    fn parse_line(&mut self, number: usize, raw: &str) {
        let line = raw.trim_end_matches('\r');

        if let Some(caps) = MODULE_RE.captures(line) {
            match caps[1].parse::<u32>() {
                Ok(id) => self.declare_module(number, line, id, &caps[2]),
                Err(_) => self.malformed(number, line),
            }
        } else if let Some(caps) = CONNECTION_RE.captures(line) {
            match (caps[1].parse::<u32>(), caps[3].parse::<u32>()) {
                (Ok(from), Ok(to)) => {
                    tracing::debug!(
                        "Line {}: Connection between \"{}\" of module {} and \"{}\" of module {}",
                        number,
                        &caps[2],
                        from,
                        &caps[4],
                        to
                    );
                    self.connections.push(ConnectionDecl {
                        line: number,
                        text: line.to_string(),
                        from: (from, caps[2].to_string()),
                        to: (to, caps[4].to_string()),
                    });
                }
                _ => self.malformed(number, line),
            }
        } else if let Some(caps) = PROPERTY_RE.captures(line) {
            match caps[1].parse::<u32>() {
                Ok(module) => {
                    tracing::debug!(
                        "Line {}: Property \"{}\" of module {} set to {}",
                        number,
                        &caps[2],
                        module,
                        &caps[3]
                    );
                    self.properties.push(PropertyDecl {
                        line: number,
                        text: line.to_string(),
                        module,
                        name: caps[2].to_string(),
                        value: caps[3].to_string(),
                    });
                }
                Err(_) => self.malformed(number, line),
            }
        } else if !line.trim().is_empty() && !COMMENT_RE.is_match(line) {
            self.malformed(number, line);
        }
    }

    fn malformed(&mut self, number: usize, line: &str) {
        tracing::debug!("Line {}: Malformed. Skipping.", number);
        self.entries.push(entry(
            number,
            DeclarationKind::Unknown,
            line,
            skipped(SkipReason::Malformed),
        ));
    }

    fn declare_module(&mut self, number: usize, line: &str, id: u32, name: &str) {
        tracing::debug!("Line {}: Module \"{}\" with ID {}", number, name, id);

        let reason = if self.modules.contains_key(&id) {
            tracing::error!("Module ID {} is declared twice. Skipping.", id);
            SkipReason::DuplicateId(id)
        } else {
            match self.factory.is_prototype_available(name) {
                None => {
                    tracing::error!(
                        "There is no prototype available for module \"{}\". Skipping.",
                        name
                    );
                    SkipReason::UnknownPrototype(name.to_string())
                }
                Some(prototype) => match self.factory.create(&prototype) {
                    Ok(module) => {
                        self.modules.insert(
                            id,
                            ModuleDecl {
                                line: number,
                                text: line.to_string(),
                                module,
                            },
                        );
                        return;
                    }
                    Err(e) => {
                        tracing::error!("Could not create module \"{}\": {}", name, e);
                        SkipReason::CreateFailed(e.to_string())
                    }
                },
            }
        };
        self.entries
            .push(entry(number, DeclarationKind::Module, line, skipped(reason)));
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The module parsed for `id`, before `apply` consumes it.
    pub fn module(&self, id: u32) -> Option<&Arc<Module>> {
        self.modules.get(&id).map(|decl| &decl.module)
    }

    fn apply_property(modules: &BTreeMap<u32, ModuleDecl>, decl: &PropertyDecl) -> Outcome {
        let Some(target) = modules.get(&decl.module) else {
            tracing::error!(
                "There is no module with ID \"{}\" to set the property \"{}\" for. Skipping.",
                decl.module,
                decl.name
            );
            return skipped(SkipReason::UnknownModuleId(decl.module));
        };
        let Some(property) = target.module.properties().find(&decl.name) else {
            tracing::error!(
                "The module \"{}\" has no property named \"{}\". Skipping.",
                target.module.name(),
                decl.name
            );
            return skipped(SkipReason::UnknownProperty(decl.name.clone()));
        };
        match property.set_as_string(&decl.value) {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                tracing::error!("{}. Skipping.", e);
                skipped(SkipReason::InvalidValue(e.to_string()))
            }
        }
    }

    fn apply_connection(modules: &BTreeMap<u32, ModuleDecl>, decl: &ConnectionDecl) -> Outcome {
        let ((from_id, from_name), (to_id, to_name)) = (&decl.from, &decl.to);

        for id in [from_id, to_id] {
            if !modules.contains_key(id) {
                tracing::error!(
                    "There is no module with ID \"{}\" for the connection {}. Skipping.",
                    id,
                    decl.text
                );
                return skipped(SkipReason::UnknownModuleId(*id));
            }
        }
        let (Some(source), Some(target)) = (modules.get(from_id), modules.get(to_id)) else {
            return skipped(SkipReason::UnknownModuleId(*from_id));
        };

        // The first endpoint names an output, the second an input.
        let output = match source.module.get_output_connector(from_name) {
            Ok(output) => output,
            Err(_) => {
                tracing::error!(
                    "There is no output connector \"{}\" in module \"{}\"",
                    from_name,
                    source.module.name()
                );
                return skipped(SkipReason::UnknownConnector(from_name.clone()));
            }
        };
        let input = match target.module.get_input_connector(to_name) {
            Ok(input) => input,
            Err(_) => {
                tracing::error!(
                    "There is no input connector \"{}\" in module \"{}\"",
                    to_name,
                    target.module.name()
                );
                return skipped(SkipReason::UnknownConnector(to_name.clone()));
            }
        };

        match output.connect(&input) {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                tracing::error!(
                    "Connection {} could not be created: {}. Skipping.",
                    decl.text,
                    e
                );
                skipped(SkipReason::ConnectFailed(e.to_string()))
            }
        }
    }
}

impl ModuleCombiner for ProjectFileCombiner {
    type Outcome = ApplyReport;

    fn apply(&mut self, container: &Arc<ModuleContainer>) -> ApplyReport {
        tracing::debug!("Applying project to container \"{}\"", container.name());
        let mut entries = std::mem::take(&mut self.entries);
        let mut modules = std::mem::take(&mut self.modules);

        for decl in std::mem::take(&mut self.properties) {
            let outcome = Self::apply_property(&modules, &decl);
            entries.push(entry(decl.line, DeclarationKind::Property, &decl.text, outcome));
        }

        let mut failed: BTreeMap<u32, SkipReason> = BTreeMap::new();
        for (id, decl) in &modules {
            if let Err(e) = container.add(&decl.module) {
                tracing::error!("Could not add module with ID {}: {}", id, e);
                failed.insert(*id, SkipReason::AddFailed(e.to_string()));
            }
        }

        // Wait only after all modules started, so a slow one does not
        // hold back the others.
        for (id, decl) in &modules {
            if failed.contains_key(id) {
                continue;
            }
            decl.module.wait_ready_or_crashed();
            if let Some(reason) = decl.module.crash_reason() {
                tracing::warn!(
                    "In the module with ID {} a problem occurred. Connections and properties \
                     relating to this module will fail.",
                    id
                );
                failed.insert(*id, SkipReason::ModuleCrashed(reason));
            }
        }

        for (id, reason) in &failed {
            if let Some(decl) = modules.remove(id) {
                entries.push(entry(
                    decl.line,
                    DeclarationKind::Module,
                    &decl.text,
                    skipped(reason.clone()),
                ));
            }
        }
        for decl in modules.values() {
            entries.push(entry(decl.line, DeclarationKind::Module, &decl.text, Outcome::Applied));
        }

        for decl in std::mem::take(&mut self.connections) {
            let outcome = Self::apply_connection(&modules, &decl);
            entries.push(entry(decl.line, DeclarationKind::Connection, &decl.text, outcome));
        }

        ApplyReport::new(self.source.clone(), entries)
    }
}

/// Serialise the graph in `container` into the project format.
///
/// Modules are numbered in container order. Only parameters that differ from
/// their defaults are written.
pub fn write_project(container: &ModuleContainer, writer: &mut impl Write) -> Result<()> {
    let modules = container.modules();

    writeln!(writer, "// Modules and Properties")?;
    for (id, module) in modules.iter().enumerate() {
        writeln!(writer, "MODULE:{}:{}", id, module.name())?;
        for property in module.properties().iter() {
            if property.purpose() == PropertyPurpose::Parameter && property.is_changed() {
                writeln!(
                    writer,
                    "PROPERTY:({},{})={}",
                    id,
                    property.name(),
                    property.as_string()
                )?;
            }
        }
    }

    writeln!(writer)?;
    writeln!(writer, "// Connections")?;
    for (id, module) in modules.iter().enumerate() {
        for output in module.outputs() {
            for input in output.peers() {
                let Some(target) = modules.iter().position(|m| m.id() == input.module_id()) else {
                    continue;
                };
                writeln!(
                    writer,
                    "CONNECTION:({},{})->({},{})",
                    id,
                    output.name(),
                    target,
                    input.name()
                )?;
            }
        }
    }
    Ok(())
}

/// Write the graph in `container` to a file at `path`.
pub fn save_project(container: &ModuleContainer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create project file \"{}\"", path.display()))?;
    write_project(container, &mut file)?;
    tracing::info!("Saved project to \"{}\"", path.display());
    Ok(())
}
