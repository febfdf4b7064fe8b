//! Structured result of applying a project file.
//!
//! One entry per declaration, in file order. Each is either applied or
//! skipped with a reason; applying a project never fails as a whole.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Module,
    Connection,
    Property,
    /// A line that matched no declaration form.
    Unknown,
}

/// Why a declaration was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    Malformed,
    UnknownPrototype(String),
    CreateFailed(String),
    DuplicateId(u32),
    UnknownModuleId(u32),
    UnknownProperty(String),
    InvalidValue(String),
    AddFailed(String),
    ModuleCrashed(String),
    UnknownConnector(String),
    ConnectFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed => write!(f, "malformed line"),
            SkipReason::UnknownPrototype(name) => write!(f, "no prototype named \"{}\"", name),
            SkipReason::CreateFailed(e) => write!(f, "could not create module: {}", e),
            SkipReason::DuplicateId(id) => write!(f, "module id {} declared twice", id),
            SkipReason::UnknownModuleId(id) => write!(f, "no module with id {}", id),
            SkipReason::UnknownProperty(name) => write!(f, "no property named \"{}\"", name),
            SkipReason::InvalidValue(e) => write!(f, "invalid value: {}", e),
            SkipReason::AddFailed(e) => write!(f, "could not add module: {}", e),
            SkipReason::ModuleCrashed(e) => write!(f, "module crashed: {}", e),
            SkipReason::UnknownConnector(name) => write!(f, "no connector named \"{}\"", name),
            SkipReason::ConnectFailed(e) => write!(f, "connect failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// 1-based line number in the source.
    pub line: usize,
    pub kind: DeclarationKind,
    pub declaration: String,
    pub outcome: Outcome,
}

impl ReportEntry {
    pub fn is_applied(&self) -> bool {
        self.outcome == Outcome::Applied
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub source: Option<PathBuf>,
    pub applied_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
}

impl ApplyReport {
    pub(crate) fn new(source: Option<PathBuf>, mut entries: Vec<ReportEntry>) -> Self {
        entries.sort_by_key(|e| e.line);
        Self {
            source,
            applied_at: Utc::now(),
            entries,
        }
    }

    pub fn applied(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.is_applied())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| !e.is_applied())
    }

    /// Applied declarations of `kind`.
    pub fn applied_count(&self, kind: DeclarationKind) -> usize {
        self.applied().filter(|e| e.kind == kind).count()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped().next().is_none()
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            writeln!(f, "Project {}", source.display())?;
        }
        writeln!(
            f,
            "{} modules, {} connections, {} properties applied; {} skipped",
            self.applied_count(DeclarationKind::Module),
            self.applied_count(DeclarationKind::Connection),
            self.applied_count(DeclarationKind::Property),
            self.skipped().count()
        )?;
        for entry in self.skipped() {
            if let Outcome::Skipped { reason } = &entry.outcome {
                writeln!(f, "  line {}: {} ({})", entry.line, entry.declaration, reason)?;
            }
        }
        Ok(())
    }
}
