use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;
use crate::loader::CSV_HEADERS;
use crate::types::Campaign;
use crate::util::format_optional;

fn campaign_record(c: &Campaign) -> [String; 21] {
    [
        c.id.clone(),
        c.campaign_name.clone(),
        c.campaign_type.clone(),
        c.strategic_pillars.join(", "),
        c.revenue_play.clone(),
        c.fiscal_year.clone(),
        c.quarter_month.clone(),
        c.region.to_string(),
        c.country.clone(),
        c.owner.clone(),
        c.description.clone(),
        format_optional(c.forecasted_cost),
        format_optional(c.expected_leads),
        c.impacted_regions.join(", "),
        c.status.to_string(),
        c.po_raised.to_string(),
        c.campaign_code.clone(),
        c.issue_link.clone(),
        format_optional(c.actual_cost),
        format_optional(c.actual_leads),
        format_optional(c.actual_mqls),
    ]
}

/// Serialize campaigns to CSV text with the full header row.
///
/// Multi-value fields are joined with `", "`, booleans are `true`/`false`
/// and unset numbers are empty cells. Derived metrics are not written; they
/// are recomputed on import.
pub fn export_csv(campaigns: &[Campaign]) -> Result<String> {
    // Import treats `#` lines as comments, so such leading cells are quoted.
    let mut wtr = csv::WriterBuilder::new().comment(Some(b'#')).from_writer(Vec::new());
    wtr.write_record(CSV_HEADERS)?;
    for c in campaigns {
        wtr.write_record(campaign_record(c))?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The full campaign list, verbatim and pretty-printed.
pub fn export_json(campaigns: &[Campaign]) -> Result<String> {
    Ok(serde_json::to_string_pretty(campaigns)?)
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
