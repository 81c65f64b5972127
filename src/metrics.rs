// Lead-funnel metrics derived from a campaign's forecast inputs.

use serde::{Deserialize, Serialize};

use crate::types::Campaign;

pub const MQL_RATE: f64 = 0.10;
pub const SQL_RATE: f64 = 0.06;
pub const OPPORTUNITY_RATE: f64 = 0.80;
pub const PIPELINE_PER_OPPORTUNITY: f64 = 50_000.0;
/// In-account campaigns without a lead forecast project pipeline as a
/// multiple of spend.
pub const IN_ACCOUNT_PIPELINE_MULTIPLIER: f64 = 20.0;

/// What the SQL rate is applied to.
///
/// Historical screens disagreed: some took 6% of MQLs, others 6% of raw
/// leads, a tenfold difference. `Mql` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlBasis {
    #[default]
    Mql,
    Leads,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub mql: u64,
    pub sql: u64,
    pub opportunities: u64,
    pub pipeline_forecast: f64,
}

/// Matches "In-Account Events (1:1)", "in account", "IN_ACCOUNT" and so on.
pub fn is_in_account(campaign_type: &str) -> bool {
    let key: String = campaign_type
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    key.contains("inaccount")
}

fn round_count(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.round() as u64
    } else {
        0
    }
}

/// Derive funnel metrics with the default SQL basis.
///
/// Inputs are assumed non-negative; the normalizer rejects negatives.
pub fn calculate_metrics(expected_leads: f64, forecasted_cost: f64, campaign_type: &str) -> Metrics {
    calculate_metrics_with(expected_leads, forecasted_cost, campaign_type, SqlBasis::default())
}

pub fn calculate_metrics_with(
    expected_leads: f64,
    forecasted_cost: f64,
    campaign_type: &str,
    basis: SqlBasis,
) -> Metrics {
    if expected_leads > 0.0 {
        let mql = round_count(expected_leads * MQL_RATE);
        let sql = match basis {
            SqlBasis::Mql => round_count(mql as f64 * SQL_RATE),
            SqlBasis::Leads => round_count(expected_leads * SQL_RATE),
        };
        let opportunities = round_count(sql as f64 * OPPORTUNITY_RATE);
        return Metrics {
            mql,
            sql,
            opportunities,
            pipeline_forecast: opportunities as f64 * PIPELINE_PER_OPPORTUNITY,
        };
    }

    if is_in_account(campaign_type) && forecasted_cost > 0.0 {
        return Metrics {
            pipeline_forecast: forecasted_cost * IN_ACCOUNT_PIPELINE_MULTIPLIER,
            ..Metrics::default()
        };
    }

    Metrics::default()
}

/// Recompute and store a campaign's derived fields. Empty inputs count as 0.
pub fn apply(campaign: &mut Campaign, basis: SqlBasis) {
    let m = calculate_metrics_with(
        campaign.expected_leads.unwrap_or(0.0),
        campaign.forecasted_cost.unwrap_or(0.0),
        &campaign.campaign_type,
        basis,
    );
    campaign.mql = m.mql;
    campaign.sql = m.sql;
    campaign.opportunities = m.opportunities;
    campaign.pipeline_forecast = m.pipeline_forecast;
}
