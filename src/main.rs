//! modkernel - Command line entry point
//!
//! Loads module graphs from project files and inspects the prototype
//! registry.
//!
//! # Usage
//!
//! ```bash
//! # Load a project, print what was applied and stop again
//! modkernel run brain.owproj
//!
//! # Keep the graph running for ten seconds, then save it back out
//! modkernel run brain.owproj --keep-alive 10 --save brain-out.owproj
//!
//! # List prototypes and what can be attached to a Data Module
//! modkernel prototypes
//! modkernel compatible "Data Module"
//! ```

// CLI tools are expected to print to stdout
#![allow(clippy::print_stdout)]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use modkernel::config::{self, KernelConfig};
use modkernel::kernel::combiner::save_project;
use modkernel::kernel::{ModuleCombiner, ModuleContainer, ModuleFactory, ProjectFileCombiner};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "modkernel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a project file into the root container
    Run {
        /// Project file; falls back to `default_project` from the config
        project: Option<PathBuf>,

        /// Print the apply report as JSON
        #[arg(long)]
        json: bool,

        /// Keep the graph running for this many seconds before stopping
        #[arg(long, value_name = "SECS", default_value_t = 0)]
        keep_alive: u64,

        /// Write the running graph to this project file before stopping
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },

    /// List registered prototypes and their connectors
    Prototypes,

    /// List prototypes that can be attached to an instance of PROTOTYPE,
    /// or the source prototypes if none is given
    Compatible {
        prototype: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("Loading config {}", path.display()))?,
        None => KernelConfig::load_or_default(),
    };

    // Held until exit so buffered log lines get flushed
    let _log_guard = init_logging(&config)?;

    tracing::info!(
        "modkernel {} (config dir: {:?})",
        env!("CARGO_PKG_VERSION"),
        config::config_dir()
    );

    let factory = ModuleFactory::global();
    factory.load_filtered(&config.prototype_whitelist);

    match cli.command {
        Command::Run {
            project,
            json,
            keep_alive,
            save,
        } => {
            let Some(project) = project.or_else(|| config.default_project.clone()) else {
                bail!("No project file given and no default_project configured");
            };
            run_project(
                &config,
                factory,
                project,
                json || config.json_report,
                keep_alive,
                save,
            )
        }
        Command::Prototypes => {
            list_prototypes(&factory);
            Ok(())
        }
        Command::Compatible { prototype } => list_compatible(&factory, prototype.as_deref()),
    }
}

fn init_logging(
    config: &KernelConfig,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .context("log_file must name a file")?
                .to_os_string();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Creating log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run_project(
    config: &KernelConfig,
    factory: std::sync::Arc<ModuleFactory>,
    project: PathBuf,
    json: bool,
    keep_alive: u64,
    save: Option<PathBuf>,
) -> anyhow::Result<()> {
    let root = ModuleContainer::new(config.root_container.clone());
    let mut combiner = ProjectFileCombiner::from_path(factory, &project)?;
    let report = combiner.apply(&root);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    if keep_alive > 0 {
        tracing::info!("Keeping {} modules alive for {}s", root.len(), keep_alive);
        std::thread::sleep(Duration::from_secs(keep_alive));
    }

    let saved = save.map(|path| {
        save_project(&root, &path).with_context(|| format!("Saving project {}", path.display()))
    });

    tracing::info!("Shutting down...");
    root.stop();

    saved.transpose()?;
    Ok(())
}

fn list_prototypes(factory: &ModuleFactory) {
    for prototype in factory.get_all_prototypes() {
        println!("{} ({:?})", prototype.name(), prototype.module_type());
        println!("    {}", prototype.description());
        for connector in prototype.connectors() {
            println!(
                "    {:?} {}: {}",
                connector.direction(),
                connector.name(),
                connector.data_type()
            );
        }
    }
}

fn list_compatible(
    factory: &std::sync::Arc<ModuleFactory>,
    prototype: Option<&str>,
) -> anyhow::Result<()> {
    // Pair against a throwaway, never started instance.
    let source = prototype
        .map(|name| {
            let prototype = factory.get_prototype_by_name(name)?;
            factory.create(&prototype)
        })
        .transpose()?;

    let groups = factory.get_compatible_prototypes(source.as_ref());
    if groups.is_empty() {
        println!("Nothing compatible");
    }
    for group in groups {
        println!("{}", group.prototype.name());
        for combiner in &group.combiners {
            println!("    {}", combiner);
        }
    }
    Ok(())
}
