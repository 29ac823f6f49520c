//! Test utilities for mod loader testing
//!
//! Provides a temporary mods directory, helpers writing manifests,
//! information files and script files, and recording script modules.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use mod_loader::config::LoaderConfig;
use mod_loader::mods::{
    LoadCause, ModDescriptor, ModError, ModManager, Phase, ScriptModule, StaticImporter,
    UnloadCause,
};

/// Shared record of hook calls, as "Namespace.module:Phase"
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// How a recording module misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    FailOn(Phase),
    PanicOn(Phase),
}

/// Script module recording every hook call
pub struct RecordingModule {
    namespace: String,
    id: String,
    log: CallLog,
    fault: Fault,
}

impl RecordingModule {
    fn hook(&self, phase: Phase) -> Result<(), ModError> {
        self.log
            .lock()
            .push(format!("{}.{}:{}", self.namespace, self.id, phase));
        match self.fault {
            Fault::FailOn(p) if p == phase => {
                Err(ModError::HookFailed(format!("{} refused", phase)))
            }
            Fault::PanicOn(p) if p == phase => panic!("{} exploded", phase),
            _ => Ok(()),
        }
    }
}

impl ScriptModule for RecordingModule {
    fn name(&self) -> &str {
        &self.id
    }

    fn initiate(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        self.hook(Phase::Initiate)
    }

    fn initiate_late(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        self.hook(Phase::InitiateLate)
    }

    fn start(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        self.hook(Phase::Start)
    }

    fn start_late(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        self.hook(Phase::StartLate)
    }

    fn stop_early(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        self.hook(Phase::StopEarly)
    }

    fn stop(&mut self, cause: UnloadCause) -> Result<(), ModError> {
        if cause == UnloadCause::Exiting {
            self.log
                .lock()
                .push(format!("{}.{}:Exiting", self.namespace, self.id));
        }
        self.hook(Phase::Stop)
    }

    fn unload_early(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        self.hook(Phase::UnloadEarly)
    }

    fn unload(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        self.hook(Phase::Unload)
    }
}

/// Test fixture for mod loader tests
pub struct ModTestFixture {
    /// Temporary directory for test data
    pub temp_dir: TempDir,
    /// Mods directory path
    pub mods_dir: PathBuf,
    /// Hook calls of every recording module
    pub log: CallLog,
    importer: StaticImporter,
}

impl ModTestFixture {
    /// Create a new fixture with an empty mods directory
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let mods_dir = temp_dir.path().join("Mods");
        std::fs::create_dir_all(&mods_dir)?;

        Ok(Self {
            temp_dir,
            mods_dir,
            log: Arc::default(),
            importer: StaticImporter::new(),
        })
    }

    /// Directory of mod `namespace`
    pub fn mod_dir(&self, namespace: &str) -> PathBuf {
        self.mods_dir.join(namespace)
    }

    /// Write a mod controlled by "Main"
    pub fn create_mod(&self, namespace: &str, information: &str) -> PathBuf {
        self.create_mod_with_controller(namespace, "Main", information)
    }

    /// Write a mod's manifest and information file
    pub fn create_mod_with_controller(
        &self,
        namespace: &str,
        controller: &str,
        information: &str,
    ) -> PathBuf {
        let dir = self.mod_dir(namespace);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("mod.toml"),
            format!(
                "Namespace = \"{}\"\nName = \"{} Mod\"\nLoadController = \"{}\"\n",
                namespace, namespace, controller
            ),
        )
        .unwrap();
        std::fs::write(dir.join("information.toml"), information).unwrap();
        dir
    }

    /// Add `Scripts/<module>.py` to a mod and a recording module behind it
    ///
    /// The mod's information must list `ScriptPaths = ["Scripts"]`.
    pub fn add_script(&mut self, namespace: &str, module: &str, fault: Fault) {
        let scripts = self.mod_dir(namespace).join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(scripts.join(format!("{}.py", module)), "").unwrap();

        let log = Arc::clone(&self.log);
        let id = module.to_string();
        self.importer
            .register(namespace, module, move |descriptor: &ModDescriptor| {
                Ok(Box::new(RecordingModule {
                    namespace: descriptor.namespace().to_string(),
                    id: id.clone(),
                    log: Arc::clone(&log),
                    fault,
                }))
            });
    }

    /// Build a manager over the mods directory and discover every mod
    pub fn manager(&mut self) -> ModManager {
        let config = LoaderConfig {
            mods_dir: self.mods_dir.clone(),
            ..LoaderConfig::default()
        };
        self.manager_with(config)
    }

    pub fn manager_with(&mut self, config: LoaderConfig) -> ModManager {
        let importer = std::mem::take(&mut self.importer);
        let mut manager = ModManager::new(config, Box::new(importer));
        manager.discover().unwrap();
        manager
    }

    /// Hook calls recorded so far
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Recorded calls of one phase, in order
    pub fn calls_of(&self, phase: Phase) -> Vec<String> {
        let suffix = format!(":{}", phase);
        self.calls()
            .into_iter()
            .filter(|c| c.ends_with(&suffix))
            .collect()
    }
}

/// Information file body with Author and Version plus `extra` lines
pub fn information(version: &str, extra: &str) -> String {
    format!("Author = \"tester\"\nVersion = \"{}\"\n{}\n", version, extra)
}

/// Information for a mod with scripts
pub fn scripted_information(extra: &str) -> String {
    information("1.0.0", &format!("ScriptPaths = [\"Scripts\"]\n{}", extra))
}
