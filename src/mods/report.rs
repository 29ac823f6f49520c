//! Aggregated failure reporting
//!
//! Three buckets collect every mod that could not be loaded in a session.
//! Entries are append-only; the manager publishes new entries once per
//! load-all run and remembers how far it has notified.

use std::fmt;

use crate::mods::descriptor::ModDescriptor;

/// Failure bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The mod's own code failed while importing, initiating or starting
    Loading,
    /// Invalid manifest, missing or incompatible mods, version mismatch
    InvalidSetup,
    /// Disabled because a required mod was disabled
    Cascade,
}

impl FailureKind {
    pub const ALL: [FailureKind; 3] = [
        FailureKind::Loading,
        FailureKind::InvalidSetup,
        FailureKind::Cascade,
    ];

    fn index(self) -> usize {
        match self {
            FailureKind::Loading => 0,
            FailureKind::InvalidSetup => 1,
            FailureKind::Cascade => 2,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Loading => f.write_str("loading failures"),
            FailureKind::InvalidSetup => f.write_str("invalid setup"),
            FailureKind::Cascade => f.write_str("cascade failures"),
        }
    }
}

/// One failed mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub namespace: String,
    pub name: String,
    pub version_display: String,
    pub reason: String,
}

impl FailureEntry {
    pub fn new(descriptor: &ModDescriptor, reason: impl Into<String>) -> Self {
        Self {
            namespace: descriptor.namespace().to_string(),
            name: descriptor.name.clone(),
            version_display: descriptor.version_display.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version_display.is_empty() {
            write!(f, "{} ({}): {}", self.name, self.namespace, self.reason)
        } else {
            write!(
                f,
                "{} {} ({}): {}",
                self.name, self.version_display, self.namespace, self.reason
            )
        }
    }
}

/// Payload of the manager's `failures` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub kind: FailureKind,
    pub entries: Vec<FailureEntry>,
}

/// Failure buckets for one session
#[derive(Debug, Default)]
pub struct FailureReport {
    buckets: [Vec<FailureEntry>; 3],
    notified: [usize; 3],
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: FailureKind, entry: FailureEntry) {
        self.buckets[kind.index()].push(entry);
    }

    pub fn entries(&self, kind: FailureKind) -> &[FailureEntry] {
        &self.buckets[kind.index()]
    }

    pub fn loading_failures(&self) -> &[FailureEntry] {
        self.entries(FailureKind::Loading)
    }

    pub fn invalid_setup(&self) -> &[FailureEntry] {
        self.entries(FailureKind::InvalidSetup)
    }

    pub fn cascade_failures(&self) -> &[FailureEntry] {
        self.entries(FailureKind::Cascade)
    }

    /// Whether `namespace` appears in the `kind` bucket
    pub fn contains(&self, kind: FailureKind, namespace: &str) -> bool {
        self.entries(kind).iter().any(|e| e.namespace == namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_empty())
    }

    /// One notice per bucket with entries not yet notified; marks them notified
    pub fn take_new_notices(&mut self) -> Vec<FailureNotice> {
        let mut notices = Vec::new();
        for kind in FailureKind::ALL {
            let i = kind.index();
            let fresh = &self.buckets[i][self.notified[i]..];
            if !fresh.is_empty() {
                notices.push(FailureNotice {
                    kind,
                    entries: fresh.to_vec(),
                });
            }
            self.notified[i] = self.buckets[i].len();
        }
        notices
    }
}
