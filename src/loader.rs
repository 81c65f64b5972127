use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::{debug, info};

use crate::budget::{BudgetTable, BudgetTally};
use crate::error::Result;
use crate::metrics::{self, SqlBasis};
use crate::normalize::normalize_row;
use crate::types::{Campaign, RawCampaign};

/// Headers every import file must carry.
pub const REQUIRED_HEADERS: [&str; 4] = ["campaignType", "region", "country", "owner"];

/// Full column set, in export order.
pub const CSV_HEADERS: [&str; 21] = [
    "id",
    "campaignName",
    "campaignType",
    "strategicPillars",
    "revenuePlay",
    "fiscalYear",
    "quarterMonth",
    "region",
    "country",
    "owner",
    "description",
    "forecastedCost",
    "expectedLeads",
    "impactedRegions",
    "status",
    "poRaised",
    "campaignCode",
    "issueLink",
    "actualCost",
    "actualLeads",
    "actualMQLs",
];

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub campaigns: Vec<Campaign>,
    /// Rows listed here were left out.
    pub errors: Vec<String>,
    /// Rows listed here were imported but flagged.
    pub warnings: Vec<String>,
    pub total_rows: usize,
}

/// Settings for a single import run.
#[derive(Debug, Clone)]
pub struct ImportOptions<'a> {
    pub required_headers: &'a [&'a str],
    pub budgets: &'a BudgetTable,
    pub sql_basis: SqlBasis,
}

pub fn import_file(path: &Path, opts: &ImportOptions<'_>) -> Result<ImportOutcome> {
    let text = std::fs::read_to_string(path)?;
    let outcome = import_csv(&text, opts)?;
    info!(
        path = %path.display(),
        imported = outcome.campaigns.len(),
        errors = outcome.errors.len(),
        warnings = outcome.warnings.len(),
        "CSV import finished"
    );
    Ok(outcome)
}

/// Parse CSV text into normalized campaigns with derived metrics attached.
///
/// Lines starting with `#` and blank lines are skipped. If any required
/// header is missing nothing is imported. Per-row problems exclude the row
/// (errors) or flag it (warnings); a running per-owner tally flags rows that
/// push an owner over budget.
pub fn import_csv(text: &str, opts: &ImportOptions<'_>) -> Result<ImportOutcome> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let mut out = ImportOutcome::default();

    let missing: Vec<&str> = opts
        .required_headers
        .iter()
        .copied()
        .filter(|h| !headers.iter().any(|c| c == *h))
        .collect();
    if !missing.is_empty() {
        out.errors = missing
            .iter()
            .map(|h| format!("missing required header '{}'", h))
            .collect();
        return Ok(out);
    }

    let mut tally = BudgetTally::default();
    let mut record = StringRecord::new();
    while rdr.read_record(&mut record)? {
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        out.total_rows += 1;
        let row = record.position().map(|p| p.line() as usize).unwrap_or(out.total_rows + 1);

        let raw: RawCampaign = match record.deserialize(Some(&headers)) {
            Ok(r) => r,
            Err(e) => {
                out.errors.push(format!("Row {}: {}", row, e));
                continue;
            }
        };
        let normalized = normalize_row(&raw, Some(row));
        let Some(mut campaign) = normalized.campaign else {
            debug!(row, "row rejected");
            out.errors.extend(normalized.errors);
            continue;
        };
        out.warnings.extend(normalized.warnings);
        metrics::apply(&mut campaign, opts.sql_basis);

        if !opts.budgets.canonicalize_owner(&mut campaign) {
            out.warnings.push(format!(
                "Row {}: owner '{}' has no budget pool",
                row, campaign.owner
            ));
        } else if let Some(msg) = opts.budgets.region_mismatch(&campaign.owner, campaign.region) {
            out.warnings.push(format!("Row {}: {}", row, msg));
        }
        if let Some(msg) = tally.record(opts.budgets, &campaign.owner, campaign.forecasted_cost) {
            out.warnings.push(format!("Row {}: {}", row, msg));
        }
        out.campaigns.push(campaign);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(table: &BudgetTable) -> ImportOptions<'_> {
        ImportOptions {
            required_headers: &REQUIRED_HEADERS,
            budgets: table,
            sql_basis: SqlBasis::Mql,
        }
    }

    #[test]
    fn imports_rows_and_skips_comments_and_blanks() {
        let text = "\
campaignType,region,country,owner,forecastedCost,expectedLeads
# planning sheet exported from the team drive
Webinars,SAARC,India,Shruti Narang,\"$1,000\",100

,,,,,
In-Account Events (1:1),JP & Korea,Japan,Tomoko Tanaka,2500,
";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.campaigns.len(), 2);
        assert_eq!(out.campaigns[0].forecasted_cost, Some(1000.0));
        assert_eq!(out.campaigns[0].mql, 10);
        assert_eq!(out.campaigns[1].pipeline_forecast, 50_000.0);
    }

    #[test]
    fn owner_is_matched_to_budget_table_spelling() {
        let text = "\
campaignType,region,country,owner,forecastedCost
Webinars,Digital,Australia,giorgia parham,90000
Webinars,Digital,Australia,Pat Doe,10
";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert_eq!(out.campaigns[0].owner, "Giorgia Parham");
        assert_eq!(out.campaigns[1].owner, "Pat Doe");
        assert!(out.warnings.iter().any(|w| w.starts_with("Row 2:") && w.contains("Giorgia Parham exceeds budget")));
        assert!(out.warnings.iter().any(|w| w.starts_with("Row 3:") && w.contains("no budget pool")));
        assert!(!out.warnings.iter().any(|w| w.contains("giorgia parham")), "{:?}", out.warnings);
    }

    #[test]
    fn rejected_rows_do_not_add_warnings() {
        let text = "\
campaignType,region,country,owner,forecastedCost,status
Webinars,Atlantis,India,Shruti Narang,lots,Someday
";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert!(out.campaigns.is_empty());
        assert_eq!(out.errors.len(), 1);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn missing_required_header_imports_nothing() {
        let text = "campaignType,region,country\nWebinars,SAARC,India\n";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert!(out.campaigns.is_empty());
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].contains("owner"));
    }

    #[test]
    fn bad_rows_are_excluded_with_row_numbers() {
        let text = "\
campaignType,region,country,owner
Webinars,SAARC,India,Shruti Narang
Webinars,Atlantis,India,Shruti Narang
";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert_eq!(out.campaigns.len(), 1);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].starts_with("Row 3:"), "{}", out.errors[0]);
    }

    #[test]
    fn running_tally_warns_when_owner_goes_over() {
        let text = "\
campaignType,region,country,owner,forecastedCost
Webinars,Digital,Australia,Giorgia Parham,60000
Webinars,Digital,Australia,Giorgia Parham,9000
";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert_eq!(out.campaigns.len(), 2);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("exceeds budget"));
    }

    #[test]
    fn unknown_owner_is_a_warning_not_an_error() {
        let text = "campaignType,region,country,owner\nWebinars,SAARC,India,Pat Doe\n";
        let table = BudgetTable::default();
        let out = import_csv(text, &opts(&table)).unwrap();
        assert_eq!(out.campaigns.len(), 1);
        assert!(out.warnings.iter().any(|w| w.contains("no budget pool")));
    }
}
