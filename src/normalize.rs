// The single boundary where raw campaign input becomes a typed [`Campaign`].
//
// CSV rows and loosely-typed JSON both pass through here. Problems that make
// a record unusable are errors; problems that can be defaulted are warnings.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{Campaign, RawCampaign, Region, Status};
use crate::util::{is_present, parse_bool, parse_f64_safe, split_multi, text};

pub const STRATEGIC_PILLARS: [&str; 4] = [
    "Account Growth and Product Adoption",
    "Pipeline Acceleration & Executive Engagement",
    "Brand Awareness & Top of Funnel Demand Generation",
    "New Logo Acquisition",
];

pub const CAMPAIGN_TYPES: [&str; 14] = [
    "In-Account Events (1:1)",
    "Exec Engagement Programs",
    "CxO Events (1:Few)",
    "Localized Events",
    "Localized Programs",
    "Lead Recycle and Nurturing (in Region)",
    "Targeted Paid Initiatives",
    "User Groups",
    "Targeted Events",
    "Webinars",
    "Digital Campaigns",
    "Partner Programs",
    "Events (Conferences)",
    "Contractor/Infrastructure",
];

pub const REVENUE_PLAYS: [&str; 3] = [
    "Accelerate New Logos",
    "Accelerate Expansion",
    "Accelerate Renewals",
];

static PILLAR_LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    STRATEGIC_PILLARS
        .iter()
        .map(|p| (p.to_lowercase(), *p))
        .collect()
});

/// Result of normalizing one record. `campaign` is `None` when any error
/// was found; warnings never block the record.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub campaign: Option<Campaign>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Canonical casing for known pillars; unknown tokens are returned as-is.
pub fn canonical_pillar(token: &str) -> Option<&'static str> {
    PILLAR_LOOKUP.get(&token.trim().to_lowercase()).copied()
}

fn canonical_from(list: &'static [&'static str], token: &str) -> Option<&'static str> {
    let wanted = token.trim();
    list.iter().copied().find(|v| v.eq_ignore_ascii_case(wanted))
}

/// Canonical casing for a known campaign type.
pub fn canonical_campaign_type(token: &str) -> Option<&'static str> {
    canonical_from(&CAMPAIGN_TYPES, token)
}

fn canonical_region_name(token: &str) -> Option<&'static str> {
    token.parse::<Region>().ok().map(|r| r.as_str())
}

/// Match tokens case-insensitively against a canonical list. Unmatched
/// tokens pass through unchanged and are reported separately.
fn canonicalize(tokens: Vec<String>, lookup: fn(&str) -> Option<&'static str>) -> (Vec<String>, Vec<String>) {
    let mut out: Vec<String> = Vec::new();
    let mut unmatched = Vec::new();
    for t in tokens {
        let value = match lookup(&t) {
            Some(canon) => canon.to_string(),
            None => {
                unmatched.push(t.clone());
                t
            }
        };
        if !out.contains(&value) {
            out.push(value);
        }
    }
    (out, unmatched)
}

fn prefix(row: Option<usize>) -> String {
    match row {
        Some(n) => format!("Row {}: ", n),
        None => String::new(),
    }
}

/// Parse an optional numeric cell, warning when something was entered but
/// could not be read.
fn number(field: &str, raw: Option<&str>, pre: &str, warnings: &mut Vec<String>) -> Option<f64> {
    let parsed = parse_f64_safe(raw);
    if parsed.is_none() && is_present(raw) {
        warnings.push(format!(
            "{}could not parse {} '{}'; left empty",
            pre,
            field,
            raw.unwrap_or("").trim()
        ));
    }
    parsed
}

pub fn normalize(raw: &RawCampaign) -> Normalized {
    normalize_row(raw, None)
}

/// Normalize a record, prefixing messages with `Row N:` when `row` is given.
pub fn normalize_row(raw: &RawCampaign, row: Option<usize>) -> Normalized {
    let pre = prefix(row);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (field, value) in [
        ("campaignType", &raw.campaign_type),
        ("region", &raw.region),
        ("country", &raw.country),
        ("owner", &raw.owner),
    ] {
        if !is_present(value.as_deref()) {
            errors.push(format!("{}missing required field '{}'", pre, field));
        }
    }

    let region = match raw.region.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(r) => match r.parse::<Region>() {
            Ok(region) => Some(region),
            Err(e) => {
                errors.push(format!("{}{}", pre, e));
                None
            }
        },
        None => None,
    };

    let forecasted_cost = number("forecastedCost", raw.forecasted_cost.as_deref(), &pre, &mut warnings);
    let expected_leads = number("expectedLeads", raw.expected_leads.as_deref(), &pre, &mut warnings);
    for (field, value) in [("forecastedCost", forecasted_cost), ("expectedLeads", expected_leads)] {
        if matches!(value, Some(v) if v < 0.0) {
            errors.push(format!("{}{} must be >= 0", pre, field));
        }
    }
    let actual_cost = number("actualCost", raw.actual_cost.as_deref(), &pre, &mut warnings);
    let actual_leads = number("actualLeads", raw.actual_leads.as_deref(), &pre, &mut warnings);
    let actual_mqls = number("actualMQLs", raw.actual_mqls.as_deref(), &pre, &mut warnings);

    let (strategic_pillars, unknown_pillars) =
        canonicalize(split_multi(raw.strategic_pillars.as_deref()), canonical_pillar);
    if !unknown_pillars.is_empty() {
        warnings.push(format!(
            "{}unrecognized strategic pillar(s): {}",
            pre,
            unknown_pillars.join(", ")
        ));
    }
    let (impacted_regions, unknown_regions) =
        canonicalize(split_multi(raw.impacted_regions.as_deref()), canonical_region_name);
    if !unknown_regions.is_empty() {
        warnings.push(format!(
            "{}unrecognized impacted region(s): {}",
            pre,
            unknown_regions.join(", ")
        ));
    }

    let campaign_type = text(raw.campaign_type.as_deref());
    let campaign_type = match canonical_campaign_type(&campaign_type) {
        Some(canon) => canon.to_string(),
        None => {
            if !campaign_type.is_empty() {
                warnings.push(format!("{}unrecognized campaign type '{}'", pre, campaign_type));
            }
            campaign_type
        }
    };
    let revenue_play = text(raw.revenue_play.as_deref());
    let revenue_play = match canonical_from(&REVENUE_PLAYS, &revenue_play) {
        Some(canon) => canon.to_string(),
        None => {
            if !revenue_play.is_empty() {
                warnings.push(format!("{}unrecognized revenue play '{}'", pre, revenue_play));
            }
            revenue_play
        }
    };

    let status = match raw.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => s.parse::<Status>().unwrap_or_else(|e| {
            warnings.push(format!("{}{}; defaulted to Planning", pre, e));
            Status::Planning
        }),
        None => Status::Planning,
    };

    let po_raised = match raw.po_raised.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => parse_bool(Some(s)).unwrap_or_else(|| {
            warnings.push(format!("{}could not parse poRaised '{}'; defaulted to false", pre, s.trim()));
            false
        }),
        None => false,
    };

    let Some(region) = region.filter(|_| errors.is_empty()) else {
        return Normalized { campaign: None, errors, warnings };
    };

    let id = text(raw.id.as_deref());
    let campaign = Campaign {
        id: if id.is_empty() { uuid::Uuid::new_v4().to_string() } else { id },
        campaign_name: text(raw.campaign_name.as_deref()),
        campaign_type,
        strategic_pillars,
        revenue_play,
        fiscal_year: text(raw.fiscal_year.as_deref()),
        quarter_month: text(raw.quarter_month.as_deref()),
        region,
        country: text(raw.country.as_deref()),
        owner: text(raw.owner.as_deref()),
        description: text(raw.description.as_deref()),
        forecasted_cost,
        expected_leads,
        mql: 0,
        sql: 0,
        opportunities: 0,
        pipeline_forecast: 0.0,
        status,
        po_raised,
        campaign_code: text(raw.campaign_code.as_deref()),
        issue_link: text(raw.issue_link.as_deref()),
        actual_cost,
        actual_leads,
        actual_mqls,
        impacted_regions,
    };
    Normalized { campaign: Some(campaign), errors, warnings }
}

fn json_cell(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|i| json_cell(Some(i)))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => None,
    }
}

impl RawCampaign {
    /// Lift a loosely-typed JSON object (numbers as strings, arrays or
    /// comma lists, missing keys) into a raw record for normalization.
    pub fn from_json(value: &Value) -> RawCampaign {
        let get = |key: &str| json_cell(value.get(key));
        RawCampaign {
            id: get("id"),
            campaign_name: get("campaignName"),
            campaign_type: get("campaignType"),
            strategic_pillars: get("strategicPillars"),
            revenue_play: get("revenuePlay"),
            fiscal_year: get("fiscalYear"),
            quarter_month: get("quarterMonth"),
            region: get("region"),
            country: get("country"),
            owner: get("owner"),
            description: get("description"),
            forecasted_cost: get("forecastedCost"),
            expected_leads: get("expectedLeads"),
            impacted_regions: get("impactedRegions"),
            status: get("status"),
            po_raised: get("poRaised"),
            campaign_code: get("campaignCode"),
            issue_link: get("issueLink"),
            actual_cost: get("actualCost"),
            actual_leads: get("actualLeads"),
            actual_mqls: get("actualMQLs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw() -> RawCampaign {
        RawCampaign {
            campaign_type: Some("Webinars".into()),
            region: Some("SAARC".into()),
            country: Some("India".into()),
            owner: Some("Shruti Narang".into()),
            ..Default::default()
        }
    }

    #[test]
    fn coerces_numbers_and_keeps_empty_as_unset() {
        let mut r = raw();
        r.forecasted_cost = Some("$12,500".into());
        r.expected_leads = Some("".into());
        let n = normalize(&r);
        let c = n.campaign.unwrap();
        assert_eq!(c.forecasted_cost, Some(12500.0));
        assert_eq!(c.expected_leads, None);
        assert!(n.warnings.is_empty());
        assert!(!c.id.is_empty());
    }

    #[test]
    fn unparsable_number_is_a_warning() {
        let mut r = raw();
        r.actual_cost = Some("TBD".into());
        let n = normalize(&r);
        assert!(n.campaign.unwrap().actual_cost.is_none());
        assert_eq!(n.warnings.len(), 1);
        assert!(n.warnings[0].contains("actualCost"));
    }

    #[test]
    fn missing_required_fields_are_errors() {
        let mut r = raw();
        r.owner = Some("  ".into());
        r.country = None;
        let n = normalize_row(&r, Some(4));
        assert!(n.campaign.is_none());
        assert_eq!(n.errors.len(), 2);
        assert!(n.errors.iter().all(|e| e.starts_with("Row 4: ")));
        assert!(n.errors.iter().any(|e| e.contains("'owner'")));
    }

    #[test]
    fn invalid_region_and_negative_cost_are_errors() {
        let mut r = raw();
        r.region = Some("EMEA".into());
        r.forecasted_cost = Some("-10".into());
        let n = normalize(&r);
        assert!(n.campaign.is_none());
        assert_eq!(n.errors.len(), 2);
    }

    #[test]
    fn pillars_are_canonicalized_and_unknowns_pass_through() {
        let mut r = raw();
        r.strategic_pillars = Some("new logo acquisition, Moonshots".into());
        let n = normalize(&r);
        let c = n.campaign.unwrap();
        assert_eq!(c.strategic_pillars, vec!["New Logo Acquisition".to_string(), "Moonshots".to_string()]);
        assert_eq!(n.warnings.len(), 1);
    }

    #[test]
    fn region_is_canonicalized() {
        let mut r = raw();
        r.region = Some("x apac english".into());
        r.impacted_regions = Some("jp & korea, SAARC".into());
        let c = normalize(&r).campaign.unwrap();
        assert_eq!(c.region, Region::XApacEnglish);
        assert_eq!(c.impacted_regions, vec!["JP & Korea".to_string(), "SAARC".to_string()]);
    }

    #[test]
    fn campaign_type_and_revenue_play_are_canonicalized() {
        let mut r = raw();
        r.campaign_type = Some("in-account events (1:1)".into());
        r.revenue_play = Some("Moon Shot".into());
        let n = normalize(&r);
        assert_eq!(n.campaign.unwrap().campaign_type, "In-Account Events (1:1)");
        assert_eq!(n.warnings, vec!["unrecognized revenue play 'Moon Shot'".to_string()]);
    }

    #[test]
    fn status_and_po_defaults() {
        let mut r = raw();
        r.status = Some("Someday".into());
        r.po_raised = Some("YES".into());
        let n = normalize(&r);
        let c = n.campaign.unwrap();
        assert_eq!(c.status, Status::Planning);
        assert!(c.po_raised);
        assert_eq!(n.warnings.len(), 1);
    }

    #[test]
    fn json_input_is_lifted_from_loose_types() {
        let v = json!({
            "id": "abc",
            "campaignType": "Webinars",
            "region": "South APAC",
            "country": "Singapore",
            "owner": "Beverly Leck",
            "forecastedCost": 1500,
            "expectedLeads": "200",
            "strategicPillars": ["New Logo Acquisition"],
            "poRaised": true,
            "actualCost": null
        });
        let c = normalize(&RawCampaign::from_json(&v)).campaign.unwrap();
        assert_eq!(c.id, "abc");
        assert_eq!(c.forecasted_cost, Some(1500.0));
        assert_eq!(c.expected_leads, Some(200.0));
        assert!(c.po_raised);
        assert_eq!(c.actual_cost, None);
    }
}
