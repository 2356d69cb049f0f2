//! Optional durable engine state: published fingerprints plus scheduler counters as JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ledger::Fingerprint;
use crate::scheduler::SchedulerState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Oldest first.
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
    #[serde(default)]
    pub scheduler: SchedulerState,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file → `None`. A corrupt file is an error; callers decide whether to start fresh.
    pub async fn load(&self) -> Result<Option<EngineSnapshot>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read state {}", self.path.display()))
            }
        };
        let snap = serde_json::from_str(&raw)
            .with_context(|| format!("parse state {}", self.path.display()))?;
        Ok(Some(snap))
    }

    /// Writes a temp file next to the target, then renames it into place.
    pub async fn save(&self, snap: &EngineSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create state dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(snap).context("serialize state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("write state {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace state {}", self.path.display()))?;
        Ok(())
    }
}
