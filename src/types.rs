use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Budget and reporting regions. The two cross-APAC regions are valid
/// campaign regions but never own a budget pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "JP & Korea")]
    JpKorea,
    #[serde(rename = "South APAC")]
    SouthApac,
    #[serde(rename = "SAARC")]
    Saarc,
    #[serde(rename = "Digital")]
    Digital,
    #[serde(rename = "X APAC English")]
    XApacEnglish,
    #[serde(rename = "X APAC Non English")]
    XApacNonEnglish,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::JpKorea,
        Region::SouthApac,
        Region::Saarc,
        Region::Digital,
        Region::XApacEnglish,
        Region::XApacNonEnglish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::JpKorea => "JP & Korea",
            Region::SouthApac => "South APAC",
            Region::Saarc => "SAARC",
            Region::Digital => "Digital",
            Region::XApacEnglish => "X APAC English",
            Region::XApacNonEnglish => "X APAC Non English",
        }
    }

    /// Regions exempt from owner budget-pool checks.
    pub fn is_cross_apac(&self) -> bool {
        matches!(self, Region::XApacEnglish | Region::XApacNonEnglish)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("invalid region '{}'", wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Planning,
    #[serde(rename = "On Track")]
    OnTrack,
    Shipped,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Planning => "Planning",
            Status::OnTrack => "On Track",
            Status::Shipped => "Shipped",
            Status::Cancelled => "Cancelled",
        }
    }

    /// Shipped and cancelled campaigns are read-only until unlocked.
    pub fn is_locked(&self) -> bool {
        matches!(self, Status::Shipped | Status::Cancelled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "planning" => Ok(Status::Planning),
            "ontrack" => Ok(Status::OnTrack),
            "shipped" => Ok(Status::Shipped),
            "cancelled" | "canceled" => Ok(Status::Cancelled),
            _ => Err(format!("invalid status '{}'", s.trim())),
        }
    }
}

/// A planned or executed marketing activity.
///
/// `mql`, `sql`, `opportunities` and `pipeline_forecast` are derived from
/// the forecast inputs and campaign type; see [`crate::metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub campaign_name: String,
    pub campaign_type: String,
    #[serde(default)]
    pub strategic_pillars: Vec<String>,
    #[serde(default)]
    pub revenue_play: String,
    #[serde(default)]
    pub fiscal_year: String,
    #[serde(default)]
    pub quarter_month: String,
    pub region: Region,
    pub country: String,
    pub owner: String,
    #[serde(default)]
    pub description: String,
    pub forecasted_cost: Option<f64>,
    pub expected_leads: Option<f64>,
    #[serde(default)]
    pub mql: u64,
    #[serde(default)]
    pub sql: u64,
    #[serde(default)]
    pub opportunities: u64,
    #[serde(default)]
    pub pipeline_forecast: f64,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub po_raised: bool,
    #[serde(default)]
    pub campaign_code: String,
    #[serde(default)]
    pub issue_link: String,
    pub actual_cost: Option<f64>,
    pub actual_leads: Option<f64>,
    #[serde(rename = "actualMQLs")]
    pub actual_mqls: Option<f64>,
    #[serde(default)]
    pub impacted_regions: Vec<String>,
}

impl Campaign {
    /// A campaign with only the required classification filled in.
    pub fn new(campaign_type: &str, region: Region, country: &str, owner: &str) -> Self {
        Campaign {
            id: String::new(),
            campaign_name: String::new(),
            campaign_type: campaign_type.to_string(),
            strategic_pillars: Vec::new(),
            revenue_play: String::new(),
            fiscal_year: String::new(),
            quarter_month: String::new(),
            region,
            country: country.to_string(),
            owner: owner.to_string(),
            description: String::new(),
            forecasted_cost: None,
            expected_leads: None,
            mql: 0,
            sql: 0,
            opportunities: 0,
            pipeline_forecast: 0.0,
            status: Status::Planning,
            po_raised: false,
            campaign_code: String::new(),
            issue_link: String::new(),
            actual_cost: None,
            actual_leads: None,
            actual_mqls: None,
            impacted_regions: Vec::new(),
        }
    }
}

/// Untyped campaign row as it arrives from CSV. Every cell is optional text;
/// the normalizer is the only place these become typed values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCampaign {
    pub id: Option<String>,
    pub campaign_name: Option<String>,
    pub campaign_type: Option<String>,
    pub strategic_pillars: Option<String>,
    pub revenue_play: Option<String>,
    pub fiscal_year: Option<String>,
    pub quarter_month: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub forecasted_cost: Option<String>,
    pub expected_leads: Option<String>,
    pub impacted_regions: Option<String>,
    pub status: Option<String>,
    pub po_raised: Option<String>,
    pub campaign_code: Option<String>,
    pub issue_link: Option<String>,
    pub actual_cost: Option<String>,
    pub actual_leads: Option<String>,
    #[serde(rename = "actualMQLs")]
    pub actual_mqls: Option<String>,
}

/// A campaign's footprint inside an owner's budget pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub forecasted_cost: f64,
    pub actual_cost: f64,
}

/// One owner's allocation pool. `programs` is rebuilt from the campaign
/// collection and never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalBudget {
    pub owner: String,
    pub region: Region,
    pub assigned_budget: Option<f64>,
    #[serde(default)]
    pub programs: Vec<Program>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupSummaryRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Campaigns")]
    #[tabled(rename = "Campaigns")]
    pub campaigns: usize,
    #[serde(rename = "ForecastedCost")]
    #[tabled(rename = "ForecastedCost")]
    pub forecasted_cost: String,
    #[serde(rename = "ActualCost")]
    #[tabled(rename = "ActualCost")]
    pub actual_cost: String,
    #[serde(rename = "ExpectedLeads")]
    #[tabled(rename = "ExpectedLeads")]
    pub expected_leads: String,
    #[serde(rename = "ActualLeads")]
    #[tabled(rename = "ActualLeads")]
    pub actual_leads: String,
    #[serde(rename = "MQL")]
    #[tabled(rename = "MQL")]
    pub mql: String,
    #[serde(rename = "ActualMQLs")]
    #[tabled(rename = "ActualMQLs")]
    pub actual_mqls: String,
    #[serde(rename = "PipelineForecast")]
    #[tabled(rename = "PipelineForecast")]
    pub pipeline_forecast: String,
    #[serde(rename = "ROI")]
    #[tabled(rename = "ROI")]
    pub roi: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct OwnerBudgetRow {
    #[serde(rename = "Owner")]
    #[tabled(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "AssignedBudget")]
    #[tabled(rename = "AssignedBudget")]
    pub assigned_budget: String,
    #[serde(rename = "Forecasted")]
    #[tabled(rename = "Forecasted")]
    pub forecasted: String,
    #[serde(rename = "Actual")]
    #[tabled(rename = "Actual")]
    pub actual: String,
    #[serde(rename = "RemainingForecast")]
    #[tabled(rename = "RemainingForecast")]
    pub remaining_forecast: String,
    #[serde(rename = "RemainingActual")]
    #[tabled(rename = "RemainingActual")]
    pub remaining_actual: String,
    #[serde(rename = "Flag")]
    #[tabled(rename = "Flag")]
    pub flag: String,
}
