use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::budget::{Allocation, ExclusionTable};
use crate::types::{Campaign, GroupSummaryRow, OwnerBudgetRow};
use crate::util::format_number;

pub const UNCLASSIFIED: &str = "Unclassified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupBy {
    Region,
    Owner,
    QuarterMonth,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Put campaigns with an empty group key under [`UNCLASSIFIED`]
    /// instead of leaving them out.
    pub unclassified_bucket: bool,
    pub exclusions: ExclusionTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub campaigns: usize,
    pub forecasted_cost: f64,
    pub actual_cost: f64,
    pub expected_leads: f64,
    pub actual_leads: f64,
    pub mql: u64,
    #[serde(rename = "actualMQLs")]
    pub actual_mqls: f64,
    pub pipeline_forecast: f64,
}

impl GroupSummary {
    fn add(&mut self, c: &Campaign) {
        self.campaigns += 1;
        self.forecasted_cost += c.forecasted_cost.unwrap_or(0.0);
        self.actual_cost += c.actual_cost.unwrap_or(0.0);
        self.expected_leads += c.expected_leads.unwrap_or(0.0);
        self.actual_leads += c.actual_leads.unwrap_or(0.0);
        self.mql += c.mql;
        self.actual_mqls += c.actual_mqls.unwrap_or(0.0);
        self.pipeline_forecast += c.pipeline_forecast;
    }

    /// Pipeline per dollar of forecasted spend.
    pub fn roi(&self) -> f64 {
        if self.forecasted_cost > 0.0 {
            self.pipeline_forecast / self.forecasted_cost
        } else {
            0.0
        }
    }
}

fn group_key(c: &Campaign, by: GroupBy) -> String {
    match by {
        GroupBy::Region => c.region.to_string(),
        GroupBy::Owner => c.owner.trim().to_string(),
        GroupBy::QuarterMonth => c.quarter_month.trim().to_string(),
    }
}

/// Sum campaign metrics per group. Campaign types excluded from reporting
/// are skipped before grouping.
pub fn aggregate(campaigns: &[Campaign], by: GroupBy, opts: &AggregateOptions) -> BTreeMap<String, GroupSummary> {
    let mut map: BTreeMap<String, GroupSummary> = BTreeMap::new();
    for c in campaigns {
        if opts.exclusions.excludes_from_reporting(&c.campaign_type) {
            continue;
        }
        let mut key = group_key(c, by);
        if key.is_empty() {
            if !opts.unclassified_bucket {
                continue;
            }
            key = UNCLASSIFIED.to_string();
        }
        map.entry(key).or_default().add(c);
    }
    map
}

pub fn summary_rows(groups: &BTreeMap<String, GroupSummary>) -> Vec<GroupSummaryRow> {
    groups
        .iter()
        .map(|(k, s)| GroupSummaryRow {
            group: k.clone(),
            campaigns: s.campaigns,
            forecasted_cost: format_number(s.forecasted_cost, 2),
            actual_cost: format_number(s.actual_cost, 2),
            expected_leads: format_number(s.expected_leads, 0),
            actual_leads: format_number(s.actual_leads, 0),
            mql: format_number(s.mql as f64, 0),
            actual_mqls: format_number(s.actual_mqls, 0),
            pipeline_forecast: format_number(s.pipeline_forecast, 2),
            roi: format_number(s.roi(), 2),
        })
        .collect()
}

pub fn budget_rows(allocation: &Allocation) -> Vec<OwnerBudgetRow> {
    allocation
        .per_owner
        .values()
        .map(|s| {
            let flag = match (s.forecasted_exceeded, s.actual_exceeded) {
                (_, true) => "Actual over budget",
                (true, false) => "Forecast over budget",
                _ => "OK",
            };
            OwnerBudgetRow {
                owner: s.owner.clone(),
                region: s.region.to_string(),
                assigned_budget: s
                    .assigned_budget
                    .map(|b| format_number(b, 2))
                    .unwrap_or_else(|| "unset".to_string()),
                forecasted: format_number(s.total_forecasted, 2),
                actual: format_number(s.total_actual, 2),
                remaining_forecast: format_number(s.remaining_forecasted, 2),
                remaining_actual: format_number(s.remaining_actual, 2),
                flag: flag.to_string(),
            }
        })
        .collect()
}
