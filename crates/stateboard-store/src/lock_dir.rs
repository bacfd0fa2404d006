//! Directory-backed lock provider.
//!
//! Each active lock is a `<lineage>.lock.json` file holding the lock info
//! document written by the infrastructure tool:
//!
//! ```json
//! {"ID": "...", "Operation": "OperationTypeApply", "Info": "", "Who": "ci@runner",
//!  "Version": "1.5.7", "Created": "2024-01-01T00:00:00Z", "Path": "prod.tfstate"}
//! ```
//!
//! An optional `Lineage` field overrides the file stem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use stateboard_core::lineage::LineageKey;
use stateboard_core::locks::{LockInfo, ProviderError, StateProvider};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LOCK_SUFFIX: &str = ".lock.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LockFile {
    #[serde(rename = "ID")]
    id: String,
    operation: String,
    #[serde(default)]
    info: Option<String>,
    who: String,
    #[serde(default)]
    version: Option<String>,
    created: DateTime<Utc>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    lineage: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

pub struct LockDirProvider {
    name: String,
    dir: PathBuf,
}

impl LockDirProvider {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn lock_files(&self) -> Result<Vec<(String, PathBuf)>, ProviderError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            ProviderError::Io(format!("cannot read {}: {}", self.dir.display(), e))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = file_name.strip_suffix(LOCK_SUFFIX) {
                if !stem.is_empty() {
                    files.push((stem.to_string(), entry.path()));
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

fn parse_lock(stem: &str, path: &Path, bytes: &[u8]) -> Result<LockInfo, ProviderError> {
    let file: LockFile =
        serde_json::from_slice(bytes).map_err(|e| ProviderError::InvalidLockInfo {
            location: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let lineage = non_empty(file.lineage).unwrap_or_else(|| stem.to_string());
    Ok(LockInfo {
        lineage: LineageKey::new(lineage),
        id: file.id,
        operation: file.operation,
        info: non_empty(file.info),
        who: file.who,
        version: non_empty(file.version),
        created: file.created,
        path: non_empty(file.path),
    })
}

#[async_trait]
impl StateProvider for LockDirProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_locks(&self) -> Result<BTreeMap<LineageKey, LockInfo>, ProviderError> {
        let mut locks = BTreeMap::new();
        for (stem, path) in self.lock_files().await? {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Released between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ProviderError::Io(format!(
                        "cannot read {}: {}",
                        path.display(),
                        e
                    )))
                }
            };
            let lock = parse_lock(&stem, &path, &bytes)?;
            locks.insert(lock.lineage.clone(), lock);
        }
        Ok(locks)
    }
}
