//! Check a mods directory without running any mod code
//!
//! Discovers every mod, validates the information files, runs the
//! dependency checks and prints the failure buckets. With `--plan` the load
//! scheduler runs as well, with every script module replaced by a no-op, and
//! the resulting load order is printed.
//!
//! Usage:
//!   check-mods --mods-dir <dir> [--controller <ns>] [--config <file>] [--plan]

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use mod_loader::config::LoaderConfig;
use mod_loader::mods::{
    FailureKind, ModDescriptor, ModError, ModManager, ScriptImporter, ScriptModule,
};
use mod_loader::utils::{init_logging, init_logging_from_config};

#[derive(Parser, Debug)]
#[command(name = "check-mods", about = "Validate mods and their dependencies")]
struct Args {
    /// Directory holding one sub-directory per mod (overrides the config)
    #[arg(long)]
    mods_dir: Option<PathBuf>,

    /// Namespace of the controlling mod (overrides the config)
    #[arg(long)]
    controller: Option<String>,

    /// Loader configuration file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also compute the load order
    #[arg(long)]
    plan: bool,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long)]
    verbose: bool,
}

/// Stands in for every script module during `--plan`
struct NoopModule(String);

impl ScriptModule for NoopModule {
    fn name(&self) -> &str {
        &self.0
    }
}

struct NoopImporter;

impl ScriptImporter for NoopImporter {
    fn import_module(
        &mut self,
        _descriptor: &ModDescriptor,
        module: &str,
    ) -> Result<Box<dyn ScriptModule>, ModError> {
        Ok(Box::new(NoopModule(module.to_string())))
    }
}

fn load_config(args: &Args) -> anyhow::Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) if path.extension().map_or(false, |e| e == "json") => {
            LoaderConfig::from_json_file(path)
                .with_context(|| format!("reading config {:?}", path))?
        }
        Some(path) => LoaderConfig::from_toml_file(path)
            .with_context(|| format!("reading config {:?}", path))?,
        None => LoaderConfig::default(),
    };

    if let Some(mods_dir) = &args.mods_dir {
        config.mods_dir = mods_dir.clone();
    }
    if let Some(controller) = &args.controller {
        config.controller_namespace = controller.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.verbose {
        init_logging(Some("debug"));
    } else {
        init_logging_from_config(config.logging.as_ref());
    }

    let mods_dir = config.mods_dir.clone();
    let mut manager = ModManager::new(config, Box::new(NoopImporter));
    let discovered = manager
        .discover()
        .with_context(|| format!("scanning {:?}", mods_dir))?;
    println!(
        "Discovered {} mods in {:?} (controller: {})",
        discovered,
        mods_dir,
        manager.controller()
    );

    if args.plan {
        manager.force_load_all()?;
    } else {
        manager.prepare();
    }

    for descriptor in manager.registry().iter() {
        let status = if descriptor.load_controller != manager.controller() {
            format!("controlled by {}", descriptor.load_controller)
        } else if descriptor.is_blocked() {
            "disabled".to_string()
        } else if descriptor.is_available() {
            "ok".to_string()
        } else {
            "pending".to_string()
        };
        println!("  {} [{}] {}", descriptor.namespace(), descriptor.display_label(), status);
    }

    if args.plan {
        println!("Load order:");
        for (position, namespace) in manager.load_order().iter().enumerate() {
            println!("  {:>3}. {}", position + 1, namespace);
        }
    }

    let report = manager.report();
    for kind in FailureKind::ALL {
        let entries = report.entries(kind);
        if entries.is_empty() {
            continue;
        }
        println!("{} ({}):", kind, entries.len());
        for entry in entries {
            println!("  {}", entry);
        }
    }

    manager.shutdown();

    if manager.report().is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
