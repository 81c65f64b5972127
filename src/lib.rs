// Marketing campaign planning: funnel metrics, owner budget allocation,
// CSV import/export, reporting and GitHub sync.

pub mod budget;
pub mod config;
pub mod error;
pub mod github;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod reports;
pub mod storage;
pub mod store;
pub mod sync;
pub mod types;
pub mod util;

pub use error::{PlannerError, Result};
pub use types::{Campaign, RawCampaign, Region, RegionalBudget, Status};
