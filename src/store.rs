// In-memory campaign collection.
//
// Every mutation recomputes derived metrics where needed and notifies
// subscribers, which is how persistence and auto-sync learn about edits.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::budget::{regional_budgets, BudgetTable};
use crate::error::{PlannerError, Result};
use crate::metrics::{self, SqlBasis};
use crate::types::{Campaign, RegionalBudget, Region, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(String),
    Updated(String),
    Removed(String),
    Replaced(usize),
}

type Subscriber = Box<dyn FnMut(&StoreEvent)>;

/// Field edits for [`CampaignStore::update`]. `None` leaves a field alone;
/// for optional numbers `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct CampaignPatch {
    pub campaign_name: Option<String>,
    pub campaign_type: Option<String>,
    pub strategic_pillars: Option<Vec<String>>,
    pub revenue_play: Option<String>,
    pub fiscal_year: Option<String>,
    pub quarter_month: Option<String>,
    pub region: Option<Region>,
    pub country: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub forecasted_cost: Option<Option<f64>>,
    pub expected_leads: Option<Option<f64>>,
    pub status: Option<Status>,
    pub po_raised: Option<bool>,
    pub campaign_code: Option<String>,
    pub issue_link: Option<String>,
    pub actual_cost: Option<Option<f64>>,
    pub actual_leads: Option<Option<f64>>,
    pub actual_mqls: Option<Option<f64>>,
    pub impacted_regions: Option<Vec<String>>,
}

impl CampaignPatch {
    /// True when the patch touches an input of the metrics calculation.
    fn touches_metrics(&self) -> bool {
        self.campaign_type.is_some() || self.forecasted_cost.is_some() || self.expected_leads.is_some()
    }

    fn check_bounds(&self) -> Result<()> {
        for (field, v) in [("forecastedCost", self.forecasted_cost), ("expectedLeads", self.expected_leads)] {
            if let Some(Some(n)) = v {
                if n < 0.0 || !n.is_finite() {
                    return Err(PlannerError::Validation(format!("{} must be >= 0", field)));
                }
            }
        }
        Ok(())
    }

    fn apply_to(self, c: &mut Campaign) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { c.$field = v; })*
            };
        }
        set!(
            campaign_name,
            campaign_type,
            strategic_pillars,
            revenue_play,
            fiscal_year,
            quarter_month,
            region,
            country,
            owner,
            description,
            forecasted_cost,
            expected_leads,
            status,
            po_raised,
            campaign_code,
            issue_link,
            actual_cost,
            actual_leads,
            actual_mqls,
            impacted_regions
        );
    }
}

pub struct CampaignStore {
    campaigns: Vec<Campaign>,
    unlocked: HashSet<String>,
    subscribers: Vec<Subscriber>,
    sql_basis: SqlBasis,
}

impl Default for CampaignStore {
    fn default() -> Self {
        CampaignStore::new(SqlBasis::default())
    }
}

impl CampaignStore {
    pub fn new(sql_basis: SqlBasis) -> Self {
        CampaignStore {
            campaigns: Vec::new(),
            unlocked: HashSet::new(),
            subscribers: Vec::new(),
            sql_basis,
        }
    }

    /// Load an existing collection without notifying subscribers.
    pub fn with_campaigns(sql_basis: SqlBasis, campaigns: Vec<Campaign>) -> Self {
        let mut store = CampaignStore::new(sql_basis);
        store.campaigns = campaigns;
        store
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&StoreEvent) + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    fn notify(&mut self, event: StoreEvent) {
        debug!(?event, "campaign store changed");
        for s in self.subscribers.iter_mut() {
            s(&event);
        }
    }

    /// Add a campaign, assigning an id when it has none. Returns the id.
    pub fn add(&mut self, mut campaign: Campaign) -> String {
        if campaign.id.trim().is_empty() {
            campaign.id = uuid::Uuid::new_v4().to_string();
        }
        metrics::apply(&mut campaign, self.sql_basis);
        let id = campaign.id.clone();
        self.campaigns.push(campaign);
        self.notify(StoreEvent::Added(id.clone()));
        id
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.get(id)
            .map(|c| c.status.is_locked() && !self.unlocked.contains(id))
            .unwrap_or(false)
    }

    /// Allow edits to a shipped or cancelled campaign.
    pub fn unlock(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            return Err(PlannerError::UnknownCampaign(id.to_string()));
        }
        self.unlocked.insert(id.to_string());
        Ok(())
    }

    pub fn lock(&mut self, id: &str) {
        self.unlocked.remove(id);
    }

    /// Apply field edits. Locked campaigns are rejected; derived metrics are
    /// recomputed when leads, cost or type change.
    pub fn update(&mut self, id: &str, patch: CampaignPatch) -> Result<&Campaign> {
        if self.is_locked(id) {
            return Err(PlannerError::Locked(id.to_string()));
        }
        patch.check_bounds()?;
        let idx = self
            .campaigns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| PlannerError::UnknownCampaign(id.to_string()))?;

        let recompute = patch.touches_metrics();
        let basis = self.sql_basis;
        let c = &mut self.campaigns[idx];
        patch.apply_to(c);
        if recompute {
            metrics::apply(c, basis);
        }
        self.notify(StoreEvent::Updated(id.to_string()));
        Ok(&self.campaigns[idx])
    }

    pub fn remove(&mut self, id: &str) -> Result<Campaign> {
        let idx = self
            .campaigns
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| PlannerError::UnknownCampaign(id.to_string()))?;
        let removed = self.campaigns.remove(idx);
        self.unlocked.remove(id);
        self.notify(StoreEvent::Removed(id.to_string()));
        Ok(removed)
    }

    /// Bulk replace, as done by a CSV import in replace mode.
    pub fn replace_all(&mut self, campaigns: Vec<Campaign>) {
        self.campaigns = campaigns;
        for c in self.campaigns.iter_mut() {
            if c.id.trim().is_empty() {
                c.id = uuid::Uuid::new_v4().to_string();
            }
            metrics::apply(c, self.sql_basis);
        }
        self.unlocked.clear();
        let n = self.campaigns.len();
        self.notify(StoreEvent::Replaced(n));
    }

    /// Append imported campaigns, keeping insertion order.
    pub fn extend(&mut self, campaigns: Vec<Campaign>) {
        for c in campaigns {
            self.add(c);
        }
    }

    pub fn regional_budgets(&self, table: &BudgetTable) -> BTreeMap<String, RegionalBudget> {
        regional_budgets(&self.campaigns, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn webinar() -> Campaign {
        let mut c = Campaign::new("Webinars", Region::SouthApac, "Singapore", "Beverly Leck");
        c.expected_leads = Some(100.0);
        c
    }

    #[test]
    fn add_assigns_id_and_derives_metrics() {
        let mut store = CampaignStore::default();
        let id = store.add(webinar());
        let c = store.get(&id).unwrap();
        assert!(!id.is_empty());
        assert_eq!(c.mql, 10);
        assert_eq!(c.pipeline_forecast, 50_000.0);
    }

    #[test]
    fn editing_inputs_recomputes_metrics() {
        let mut store = CampaignStore::default();
        let id = store.add(webinar());
        let patch = CampaignPatch { expected_leads: Some(Some(1000.0)), ..Default::default() };
        let c = store.update(&id, patch).unwrap();
        assert_eq!(c.mql, 100);
        assert_eq!(c.sql, 6);
        assert_eq!(c.opportunities, 5);

        let patch = CampaignPatch { expected_leads: Some(None), ..Default::default() };
        let c = store.update(&id, patch).unwrap();
        assert_eq!(c.mql, 0);
        assert_eq!(c.pipeline_forecast, 0.0);
    }

    #[test]
    fn shipped_campaigns_are_locked_until_unlocked() {
        let mut store = CampaignStore::default();
        let id = store.add(webinar());
        store
            .update(&id, CampaignPatch { status: Some(Status::Shipped), ..Default::default() })
            .unwrap();

        let edit = CampaignPatch { country: Some("Malaysia".into()), ..Default::default() };
        assert!(matches!(store.update(&id, edit.clone()), Err(PlannerError::Locked(_))));

        store.unlock(&id).unwrap();
        assert_eq!(store.update(&id, edit.clone()).unwrap().country, "Malaysia");

        store.lock(&id);
        assert!(store.is_locked(&id));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let mut store = CampaignStore::default();
        let id = store.add(webinar());
        let patch = CampaignPatch { forecasted_cost: Some(Some(-1.0)), ..Default::default() };
        assert!(matches!(store.update(&id, patch), Err(PlannerError::Validation(_))));
    }

    #[test]
    fn subscribers_see_every_mutation() {
        let seen: Rc<RefCell<Vec<StoreEvent>>> = Rc::default();
        let mut store = CampaignStore::default();
        let sink = Rc::clone(&seen);
        store.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let id = store.add(webinar());
        store.update(&id, CampaignPatch::default()).unwrap();
        store.replace_all(vec![webinar()]);
        let other = store.campaigns()[0].id.clone();
        store.remove(&other).unwrap();

        let events = seen.borrow();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StoreEvent::Added(id.clone()));
        assert_eq!(events[1], StoreEvent::Updated(id));
        assert_eq!(events[2], StoreEvent::Replaced(1));
        assert_eq!(events[3], StoreEvent::Removed(other));
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut store = CampaignStore::default();
        assert!(matches!(store.remove("nope"), Err(PlannerError::UnknownCampaign(_))));
        assert!(matches!(store.unlock("nope"), Err(PlannerError::UnknownCampaign(_))));
    }
}
