//! Per-package synchronization across sibling formats.
//!
//! Every config sharing one `package.json` belongs to a [`PackageBuildGroup`].
//! Each finished build arrives at its group; the arrival that completes the
//! expected count runs the package-level steps and then opens the gate for
//! everyone waiting.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bento_config::{Format, ResolvedConfig};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::bundler::Chunk;

/// What one finished build contributes to its package.
#[derive(Debug, Clone)]
pub struct BuildSnapshot {
    pub config: ResolvedConfig,
    pub chunks: Vec<Chunk>,
}

pub enum Arrival {
    /// Siblings are still building; wait on the gate.
    Waiting(watch::Receiver<bool>),
    /// This was the last sibling. Run the package steps, then [`PackageBuildGroup::resolve`].
    Last(Vec<BuildSnapshot>),
}

#[derive(Debug)]
pub struct PackageBuildGroup {
    path: PathBuf,
    count: usize,
    formats: BTreeSet<Format>,
    arrived: Mutex<Vec<BuildSnapshot>>,
    gate: watch::Sender<bool>,
}

impl PackageBuildGroup {
    pub fn new(path: impl Into<PathBuf>, count: usize, formats: BTreeSet<Format>) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            path: path.into(),
            count,
            formats,
            arrived: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn expected(&self) -> usize {
        self.count
    }

    /// Whether the package ships more than one format.
    pub fn is_dual_format(&self) -> bool {
        self.formats.len() > 1
    }

    pub fn arrive(&self, snapshot: BuildSnapshot) -> Arrival {
        if self.is_resolved() {
            // A sibling failed and gave up on the package steps.
            return Arrival::Waiting(self.gate.subscribe());
        }
        let mut arrived = self.arrived.lock();
        arrived.push(snapshot);
        tracing::debug!(
            "{} of {} builds done for {}",
            arrived.len(),
            self.count,
            self.path.display()
        );
        if arrived.len() < self.count {
            Arrival::Waiting(self.gate.subscribe())
        } else {
            Arrival::Last(std::mem::take(&mut *arrived))
        }
    }

    /// Open the gate. Later calls do nothing.
    pub fn resolve(&self) {
        self.gate.send_if_modified(|done| !std::mem::replace(done, true));
    }

    /// Give up on the package steps after a sibling failed, releasing everyone waiting.
    pub fn abandon(&self) {
        tracing::debug!("Abandoning package steps for {}", self.path.display());
        self.arrived.lock().clear();
        self.resolve();
    }

    pub fn is_resolved(&self) -> bool {
        *self.gate.borrow()
    }

    /// Wait until the group is resolved.
    pub async fn wait(mut receiver: watch::Receiver<bool>) {
        // A dropped sender means the invocation is over; nothing left to wait for.
        let _ = receiver.wait_for(|done| *done).await;
    }
}

/// All groups of one invocation, keyed by `package.json` path.
#[derive(Debug, Default)]
pub struct BuildGroups {
    groups: FxHashMap<PathBuf, Arc<PackageBuildGroup>>,
}

impl BuildGroups {
    /// One group per package, counting every config that builds it.
    pub fn new(configs: &[ResolvedConfig]) -> Self {
        let mut counts: FxHashMap<PathBuf, (usize, BTreeSet<Format>)> = FxHashMap::default();
        for config in configs {
            if let Some(path) = config.package_json_path() {
                let (count, formats) = counts.entry(path.to_path_buf()).or_default();
                *count += 1;
                formats.insert(config.format);
            }
        }
        let groups = counts
            .into_iter()
            .map(|(path, (count, formats))| {
                let group = Arc::new(PackageBuildGroup::new(path.clone(), count, formats));
                (path, group)
            })
            .collect();
        Self { groups }
    }

    pub fn get(&self, config: &ResolvedConfig) -> Option<Arc<PackageBuildGroup>> {
        self.groups.get(config.package_json_path()?).cloned()
    }

    /// Configs without a package.json are always treated as dual-format.
    pub fn is_dual_format(&self, config: &ResolvedConfig) -> bool {
        self.get(config).is_none_or(|group| group.is_dual_format())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
