// Command-line entry point.
//
// Each subcommand loads the saved campaign collection, runs one operation
// and persists the result:
// - `import` reads a CSV, printing row errors and warnings.
// - `report` / `budget` print table previews and can write CSV.
// - `sync` pushes to or pulls from GitHub.
use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use tracing::Level;

use campaign_planner::budget::{allocate, AllocationOrder, BudgetTable};
use campaign_planner::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use campaign_planner::github::GitHubClient;
use campaign_planner::loader::{self, ImportOptions, REQUIRED_HEADERS};
use campaign_planner::metrics::calculate_metrics_with;
use campaign_planner::output;
use campaign_planner::reports::{self, AggregateOptions, GroupBy};
use campaign_planner::storage::JsonStorage;
use campaign_planner::store::CampaignStore;
use campaign_planner::sync::SyncService;
use campaign_planner::util::{format_int, format_number};

/// Plan marketing campaigns, forecast funnel metrics and track owner budgets
#[derive(Parser)]
#[command(name = "campaign_planner", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./campaign_planner.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding campaignData.json and regionalBudgets.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import campaigns from a CSV file
    Import {
        file: PathBuf,
        /// Replace the saved collection instead of appending
        #[arg(long)]
        replace: bool,
    },
    /// Export all campaigns
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summarize campaigns by region, owner or quarter
    Report {
        #[arg(long, value_enum, default_value = "region")]
        group_by: GroupByArg,
        /// Keep campaigns with no group value under "Unclassified"
        #[arg(long)]
        unclassified: bool,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        rows: usize,
    },
    /// Show budget usage per owner
    Budget {
        #[arg(long, value_enum)]
        order: Option<OrderArg>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compute funnel metrics for one set of inputs
    Metrics {
        #[arg(long, default_value_t = 0.0)]
        leads: f64,
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
        #[arg(long = "type")]
        campaign_type: String,
    },
    /// Sync with the configured GitHub repository
    Sync {
        #[arg(value_enum)]
        action: SyncAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupByArg {
    Region,
    Owner,
    QuarterMonth,
}

impl From<GroupByArg> for GroupBy {
    fn from(g: GroupByArg) -> Self {
        match g {
            GroupByArg::Region => GroupBy::Region,
            GroupByArg::Owner => GroupBy::Owner,
            GroupByArg::QuarterMonth => GroupBy::QuarterMonth,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Insertion,
    CostDesc,
}

impl From<OrderArg> for AllocationOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Insertion => AllocationOrder::Insertion,
            OrderArg::CostDesc => AllocationOrder::CostDesc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SyncAction {
    Push,
    Pull,
}

fn init_logging(config: &AppConfig) {
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_messages(label: &str, messages: &[String]) {
    if messages.is_empty() {
        return;
    }
    println!("{} ({}):", label, format_int(messages.len()));
    for m in messages {
        println!("  - {}", m);
    }
    println!();
}

fn load_store(config: &AppConfig, storage: &JsonStorage) -> Result<CampaignStore, Box<dyn Error>> {
    let campaigns = storage.load_campaigns()?;
    Ok(CampaignStore::with_campaigns(config.metrics.sql_basis, campaigns))
}

/// Owner pools from config, with assigned budgets from the saved pools.
fn budget_table(config: &AppConfig, storage: &JsonStorage) -> Result<BudgetTable, Box<dyn Error>> {
    Ok(config.budget_table().with_assigned(&storage.load_budgets()?))
}

fn save_all(storage: &JsonStorage, store: &CampaignStore, table: &BudgetTable) -> Result<(), Box<dyn Error>> {
    storage.save_campaigns(store.campaigns())?;
    storage.save_budgets(&store.regional_budgets(table))?;
    Ok(())
}

fn handle_import(config: &AppConfig, storage: &JsonStorage, file: PathBuf, replace: bool) -> Result<(), Box<dyn Error>> {
    let table = budget_table(config, storage)?;
    let opts = ImportOptions {
        required_headers: &REQUIRED_HEADERS,
        budgets: &table,
        sql_basis: config.metrics.sql_basis,
    };
    let outcome = loader::import_file(&file, &opts)?;
    println!(
        "Processing file... ({} rows read, {} imported)",
        format_int(outcome.total_rows),
        format_int(outcome.campaigns.len())
    );
    print_messages("Errors", &outcome.errors);
    print_messages("Warnings", &outcome.warnings);
    if outcome.campaigns.is_empty() {
        println!("Nothing imported.");
        return Ok(());
    }

    let mut store = load_store(config, storage)?;
    if replace {
        store.replace_all(outcome.campaigns);
    } else {
        store.extend(outcome.campaigns);
    }
    save_all(storage, &store, &table)?;
    println!("Saved {} campaigns to {}", format_int(store.len()), storage.root().display());
    Ok(())
}

fn handle_export(config: &AppConfig, storage: &JsonStorage, format: ExportFormat, out: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let store = load_store(config, storage)?;
    let text = match format {
        ExportFormat::Csv => output::export_csv(store.campaigns())?,
        ExportFormat::Json => output::export_json(store.campaigns())?,
    };
    match out {
        Some(path) => {
            output::write_text(&path, &text)?;
            println!("Exported {} campaigns to {}", format_int(store.len()), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn handle_report(
    config: &AppConfig,
    storage: &JsonStorage,
    group_by: GroupBy,
    unclassified: bool,
    out: Option<PathBuf>,
    rows: usize,
) -> Result<(), Box<dyn Error>> {
    let store = load_store(config, storage)?;
    let opts = AggregateOptions { unclassified_bucket: unclassified, exclusions: config.exclusions() };
    let summary = reports::summary_rows(&reports::aggregate(store.campaigns(), group_by, &opts));
    println!("Campaign Summary by {:?}\n", group_by);
    output::preview_table_rows(&summary, rows);
    if let Some(path) = out {
        output::write_csv(&path, &summary)?;
        println!("(Full table exported to {})\n", path.display());
    }
    Ok(())
}

fn handle_budget(config: &AppConfig, storage: &JsonStorage, order: Option<OrderArg>, out: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let store = load_store(config, storage)?;
    let order = order.map(AllocationOrder::from).unwrap_or(config.budget.order);
    let table = budget_table(config, storage)?;
    let allocation = allocate(store.campaigns(), &table, &config.exclusions(), order);
    let rows = reports::budget_rows(&allocation);
    println!("Regional Budget Usage ({:?} order)\n", order);
    output::preview_table_rows(&rows, rows.len());
    if allocation.unassigned.campaigns > 0 {
        println!(
            "Unassigned: {} campaigns, {} forecasted\n",
            format_int(allocation.unassigned.campaigns),
            format_number(allocation.unassigned.forecasted, 2)
        );
    }
    print_messages("Warnings", &allocation.warnings);
    if let Some(path) = out {
        output::write_csv(&path, &rows)?;
        println!("(Full table exported to {})\n", path.display());
    }
    storage.save_budgets(&store.regional_budgets(&table))?;
    Ok(())
}

fn handle_sync(config: &AppConfig, storage: &JsonStorage, action: SyncAction) -> Result<(), Box<dyn Error>> {
    let client = GitHubClient::new(config.github()?)?;
    let mut service = SyncService::new(client, config.sync_paths(), config.debounce(), config.metrics.sql_basis);
    match action {
        SyncAction::Push => {
            let store = load_store(config, storage)?;
            let budgets = store.regional_budgets(&budget_table(config, storage)?);
            service.push(store.campaigns(), &budgets)?;
            println!("Pushed {} campaigns.", format_int(store.len()));
        }
        SyncAction::Pull => {
            let pulled = service.pull()?;
            print_messages("Errors", &pulled.errors);
            print_messages("Warnings", &pulled.warnings);
            let mut store = load_store(config, storage)?;
            let mut table = budget_table(config, storage)?;
            if let Some(pools) = &pulled.budgets {
                table = table.with_assigned(pools);
            }
            match pulled.replacement() {
                Some(campaigns) => {
                    let mut campaigns = campaigns.to_vec();
                    for c in &mut campaigns {
                        table.canonicalize_owner(c);
                    }
                    store.replace_all(campaigns);
                    println!("Pulled {} campaigns.", format_int(store.len()));
                }
                None => println!(
                    "No usable remote campaign data; kept {} local campaigns.",
                    format_int(store.len())
                ),
            }
            save_all(storage, &store, &table)?;
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load(LoadOptions {
        config_path: cli.config,
        require_file: false,
        overrides: ConfigOverrides { data_dir: cli.data_dir, log_level: cli.log_level },
    })?;
    init_logging(&config);
    let storage = JsonStorage::new(config.data_dir.clone());

    match cli.command {
        Commands::Import { file, replace } => handle_import(&config, &storage, file, replace),
        Commands::Export { format, out } => handle_export(&config, &storage, format, out),
        Commands::Report { group_by, unclassified, out, rows } => {
            handle_report(&config, &storage, group_by.into(), unclassified, out, rows)
        }
        Commands::Budget { order, out } => handle_budget(&config, &storage, order, out),
        Commands::Metrics { leads, cost, campaign_type } => {
            if leads < 0.0 || cost < 0.0 {
                return Err("leads and cost must be >= 0".into());
            }
            let m = calculate_metrics_with(leads, cost, &campaign_type, config.metrics.sql_basis);
            println!("{}", serde_json::to_string_pretty(&m)?);
            Ok(())
        }
        Commands::Sync { action } => handle_sync(&config, &storage, action),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
