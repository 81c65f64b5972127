// Push/pull of the campaign collection and budget pools to a remote store,
// with debounced auto-sync.
//
// The service is built once from configuration, started, fed change
// notifications (directly or through a store subscription) and polled.
// A burst of edits inside the debounce window becomes a single push.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::github::{GitHubClient, RemoteFile};
use crate::metrics::{self, SqlBasis};
use crate::normalize::normalize_row;
use crate::store::CampaignStore;
use crate::types::{Campaign, RawCampaign, RegionalBudget};

/// Where synced data lives. Implemented by [`GitHubClient`].
pub trait RemoteStore {
    fn fetch(&self, path: &str) -> Result<Option<RemoteFile>>;
    fn put(&self, path: &str, content: &str, message: &str) -> Result<()>;
}

impl RemoteStore for GitHubClient {
    fn fetch(&self, path: &str) -> Result<Option<RemoteFile>> {
        GitHubClient::fetch(self, path)
    }

    fn put(&self, path: &str, content: &str, message: &str) -> Result<()> {
        GitHubClient::put(self, path, content, message)
    }
}

#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub campaigns: String,
    pub budgets: String,
}

impl Default for SyncPaths {
    fn default() -> Self {
        SyncPaths {
            campaigns: "data/campaigns.json".to_string(),
            budgets: "data/budgets.json".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct SyncState {
    running: bool,
    last_change: Option<Instant>,
}

/// Remote data after normalization. `campaigns` and `budgets` are `None`
/// when the remote file does not exist yet.
#[derive(Debug, Default)]
pub struct PullOutcome {
    pub campaigns: Option<Vec<Campaign>>,
    pub budgets: Option<BTreeMap<String, RegionalBudget>>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PullOutcome {
    /// Campaigns that may replace the local collection. `None` when the
    /// remote file is missing, or when it held records and all of them
    /// were rejected.
    pub fn replacement(&self) -> Option<&[Campaign]> {
        let campaigns = self.campaigns.as_deref()?;
        if campaigns.is_empty() && !self.errors.is_empty() {
            return None;
        }
        Some(campaigns)
    }
}

pub struct SyncService<R: RemoteStore> {
    remote: R,
    paths: SyncPaths,
    debounce: Duration,
    sql_basis: SqlBasis,
    state: Rc<RefCell<SyncState>>,
}

impl<R: RemoteStore> SyncService<R> {
    pub fn new(remote: R, paths: SyncPaths, debounce: Duration, sql_basis: SqlBasis) -> Self {
        SyncService {
            remote,
            paths,
            debounce,
            sql_basis,
            state: Rc::default(),
        }
    }

    pub fn start(&mut self) {
        self.state.borrow_mut().running = true;
        info!(debounce_secs = self.debounce.as_secs(), "sync service started");
    }

    /// Stop auto-sync, flushing a pending change first.
    pub fn stop(&mut self, campaigns: &[Campaign], budgets: &BTreeMap<String, RegionalBudget>) -> Result<bool> {
        let pending = self.is_pending();
        if pending {
            self.push(campaigns, budgets)?;
        }
        self.state.borrow_mut().running = false;
        info!(flushed = pending, "sync service stopped");
        Ok(pending)
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().last_change.is_some()
    }

    /// Subscribe to a store so every mutation marks the service dirty.
    pub fn watch(&self, store: &mut CampaignStore) {
        let state = Rc::clone(&self.state);
        store.subscribe(move |_| {
            state.borrow_mut().last_change = Some(Instant::now());
        });
    }

    pub fn notify_change(&self, now: Instant) {
        self.state.borrow_mut().last_change = Some(now);
    }

    /// Push if running and the last change is at least one debounce
    /// window old. Returns whether a push happened.
    pub fn poll(
        &mut self,
        now: Instant,
        campaigns: &[Campaign],
        budgets: &BTreeMap<String, RegionalBudget>,
    ) -> Result<bool> {
        let due = {
            let state = self.state.borrow();
            match state.last_change {
                Some(at) if state.running => now.saturating_duration_since(at) >= self.debounce,
                _ => false,
            }
        };
        if !due {
            return Ok(false);
        }
        self.push(campaigns, budgets)?;
        Ok(true)
    }

    /// Write both collections. A failed push leaves the change pending.
    pub fn push(&mut self, campaigns: &[Campaign], budgets: &BTreeMap<String, RegionalBudget>) -> Result<()> {
        let campaign_json = serde_json::to_string_pretty(campaigns)?;
        let budget_json = serde_json::to_string_pretty(budgets)?;
        self.remote.put(
            &self.paths.campaigns,
            &campaign_json,
            &format!("Update campaign data ({} campaigns)", campaigns.len()),
        )?;
        self.remote.put(&self.paths.budgets, &budget_json, "Update regional budgets")?;
        self.state.borrow_mut().last_change = None;
        info!(campaigns = campaigns.len(), "pushed campaign data");
        Ok(())
    }

    /// Load remote data, passing every campaign through the normalizer.
    pub fn pull(&self) -> Result<PullOutcome> {
        let mut out = PullOutcome::default();

        if let Some(file) = self.remote.fetch(&self.paths.campaigns)? {
            let items: Vec<Value> = serde_json::from_str(&file.content)?;
            let mut campaigns = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let normalized = normalize_row(&RawCampaign::from_json(item), Some(i + 1));
                match normalized.campaign {
                    Some(mut c) => {
                        out.warnings.extend(normalized.warnings);
                        metrics::apply(&mut c, self.sql_basis);
                        campaigns.push(c);
                    }
                    None => out.errors.extend(normalized.errors),
                }
            }
            out.campaigns = Some(campaigns);
        } else {
            info!(path = %self.paths.campaigns, "no remote campaign data yet");
        }

        if let Some(file) = self.remote.fetch(&self.paths.budgets)? {
            match serde_json::from_str(&file.content) {
                Ok(b) => out.budgets = Some(b),
                Err(e) => {
                    warn!(error = %e, "remote budgets could not be parsed");
                    out.warnings.push(format!("remote budgets ignored: {}", e));
                }
            }
        }

        debug!(
            campaigns = out.campaigns.as_ref().map_or(0, Vec::len),
            errors = out.errors.len(),
            "pulled campaign data"
        );
        Ok(out)
    }
}
