// File-backed key/value persistence for the campaign collection and the
// owner budget pools.
//
// Each key is a JSON file under the data directory. Campaign saves are also
// mirrored into `snapshots/` as a timestamped envelope, which is used when
// the primary file is missing. Corrupt files are removed and replaced by an
// empty default rather than failing the caller.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{PlannerError, Result};
use crate::types::{Campaign, RegionalBudget};

pub const CAMPAIGN_KEY: &str = "campaignData";
pub const BUDGET_KEY: &str = "regionalBudgets";
const SNAPSHOT_DIR: &str = "snapshots";

/// Mirror record: `{id: key, data, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub id: String,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    fn snapshot_path(&self, key: &str) -> PathBuf {
        self.root.join(SNAPSHOT_DIR).join(format!("{}.json", key))
    }

    /// Read a key. Missing → `Ok(None)`. Unparsable → the file is removed,
    /// a warning is logged and `Ok(None)` is returned.
    fn read_key<T: DeserializeOwned>(&self, path: &Path, key: &str) -> Result<Option<T>> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<T>(&text) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "corrupt stored data, clearing key");
                fs::remove_file(path).map_err(|io| PlannerError::Storage {
                    key: key.to_string(),
                    reason: io.to_string(),
                })?;
                Ok(None)
            }
        }
    }

    fn write_key<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_campaigns(&self) -> Result<Vec<Campaign>> {
        if let Some(v) = self.read_key::<Vec<Campaign>>(&self.key_path(CAMPAIGN_KEY), CAMPAIGN_KEY)? {
            return Ok(v);
        }
        let snap = self.read_key::<Snapshot<Vec<Campaign>>>(&self.snapshot_path(CAMPAIGN_KEY), CAMPAIGN_KEY)?;
        Ok(match snap {
            Some(s) => {
                info!(timestamp = %s.timestamp, "restored campaigns from snapshot");
                s.data
            }
            None => Vec::new(),
        })
    }

    pub fn save_campaigns(&self, campaigns: &[Campaign]) -> Result<()> {
        self.write_key(&self.key_path(CAMPAIGN_KEY), campaigns)?;
        let snap = Snapshot {
            id: CAMPAIGN_KEY.to_string(),
            data: campaigns,
            timestamp: Utc::now(),
        };
        self.write_key(&self.snapshot_path(CAMPAIGN_KEY), &snap)
    }

    pub fn load_budgets(&self) -> Result<BTreeMap<String, RegionalBudget>> {
        Ok(self
            .read_key(&self.key_path(BUDGET_KEY), BUDGET_KEY)?
            .unwrap_or_default())
    }

    pub fn save_budgets(&self, budgets: &BTreeMap<String, RegionalBudget>) -> Result<()> {
        self.write_key(&self.key_path(BUDGET_KEY), budgets)
    }
}
