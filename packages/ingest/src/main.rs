#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the wildfire data tool.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use wildfire_map_analytics_models::{
    FilterState, SortColumn, SortDirection, TOP_CAUSES_LIMIT, TableQuery,
};
use wildfire_map_incident_models::{AreaBucket, IncidentRecord};
use wildfire_map_ingest::{FetchRange, open_geocode_cache, save_geocode_cache};
use wildfire_map_ingest::commands::{self, TableOverrides};
use wildfire_map_ingest::config::IngestConfig;

/// Default number of recent years for `fetch-registry`.
const DEFAULT_YEARS: u32 = 5;

#[derive(Parser)]
#[command(name = "wildfire_map_ingest", about = "Wildfire data import and analysis tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct TableArgs {
    /// Candidate projection table (TOML) replacing the built-in one
    #[arg(long)]
    candidates: Option<PathBuf>,
    /// Column alias table (TOML) replacing the built-in one
    #[arg(long)]
    columns: Option<PathBuf>,
}

impl From<TableArgs> for TableOverrides {
    fn from(args: TableArgs) -> Self {
        Self {
            candidates: args.candidates,
            columns: args.columns,
        }
    }
}

#[derive(Args)]
struct FilterArgs {
    /// Case-insensitive location substring
    #[arg(long, default_value = "")]
    search: String,
    /// Hide a cause (repeatable)
    #[arg(long = "exclude-cause")]
    exclude_causes: Vec<String>,
    /// Only show these area buckets (repeatable: verySmall, small, medium, large, veryLarge)
    #[arg(long = "bucket")]
    buckets: Vec<AreaBucket>,
    /// Only show these years (repeatable)
    #[arg(long = "year")]
    years: Vec<i32>,
}

impl FilterArgs {
    fn into_state(self, records: &[IncidentRecord]) -> FilterState {
        let mut state = FilterState::permit_all(records);
        state.search_text = self.search;
        for cause in self.exclude_causes {
            state.causes.set(cause, false);
        }
        if !self.buckets.is_empty() {
            state.area_buckets = self.buckets.into_iter().collect();
        }
        if !self.years.is_empty() {
            state.years.set_all(false);
            for year in self.years {
                state.years.set(year, true);
            }
        }
        state
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import a spreadsheet (xlsx, CSV, or JSON)
    Import {
        /// Input file
        file: PathBuf,
        /// Batch tag used in record ids
        #[arg(long, default_value = "import")]
        tag: String,
        /// Geocode records that have an address but no coordinate
        #[arg(long)]
        geocode: bool,
        /// Write normalized records to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        tables: TableArgs,
    },
    /// Fetch records from the Safety Map registry API
    FetchRegistry {
        /// Fetch the most recent N years (default 5)
        #[arg(long, conflicts_with = "pages")]
        years: Option<u32>,
        /// Fetch the first N unfiltered pages instead
        #[arg(long)]
        pages: Option<u32>,
        /// Geocode records that have an address but no coordinate
        #[arg(long)]
        geocode: bool,
        /// Write normalized records to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        tables: TableArgs,
    },
    /// Summarize a file: totals, facet counts, and chart series
    Stats {
        /// Spreadsheet export or normalized records JSON
        file: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        /// Number of causes to list
        #[arg(long, default_value_t = TOP_CAUSES_LIMIT)]
        top: usize,
        #[command(flatten)]
        tables: TableArgs,
    },
    /// Print one page of the record table
    Table {
        /// Spreadsheet export or normalized records JSON
        file: PathBuf,
        /// Case-insensitive location substring
        #[arg(long, default_value = "")]
        search: String,
        /// Minimum area (ha, inclusive)
        #[arg(long)]
        min_area: Option<f64>,
        /// Maximum area (ha, inclusive)
        #[arg(long)]
        max_area: Option<f64>,
        /// Only this cause
        #[arg(long)]
        cause: Option<String>,
        /// Sort column: date, area, amount, location
        #[arg(long, default_value = "date")]
        sort: SortColumn,
        /// Sort direction: asc, desc
        #[arg(long, default_value = "desc")]
        direction: SortDirection,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[command(flatten)]
        tables: TableArgs,
    },
    /// Inspect or clear the persistent geocode cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache counters
    Stats,
    /// Delete every cached address
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = wildfire_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = IngestConfig::from_env();
    let today = chrono::Local::now().date_naive();

    let Some(command) = cli.command else {
        return wildfire_map_ingest::interactive::run(&config, &multi).await;
    };

    let start = Instant::now();
    match command {
        Commands::Import {
            file,
            tag,
            geocode,
            output,
            tables,
        } => {
            let cache = geocode
                .then(|| open_geocode_cache(&config, reqwest::Client::new()))
                .transpose()?;
            commands::import(
                &multi,
                &file,
                &tag,
                cache.as_ref(),
                &tables.into(),
                output.as_deref(),
                today,
            )
            .await?;
            if let Some(cache) = &cache {
                save_geocode_cache(cache)?;
            }
        }
        Commands::FetchRegistry {
            years,
            pages,
            geocode,
            output,
            tables,
        } => {
            config.warn_missing_credentials();
            let range = pages.map_or_else(
                || FetchRange::RecentYears(years.unwrap_or(DEFAULT_YEARS)),
                FetchRange::Pages,
            );
            let cache = geocode
                .then(|| open_geocode_cache(&config, reqwest::Client::new()))
                .transpose()?;
            commands::fetch(
                &config,
                &multi,
                range,
                cache.as_ref(),
                &tables.into(),
                output.as_deref(),
                today,
            )
            .await?;
            if let Some(cache) = &cache {
                save_geocode_cache(cache)?;
            }
        }
        Commands::Stats {
            file,
            filters,
            top,
            tables,
        } => {
            let records = commands::load_records(&file, &tables.into(), today)?;
            let state = filters.into_state(&records);
            commands::print_stats(records, state, top, today);
        }
        Commands::Table {
            file,
            search,
            min_area,
            max_area,
            cause,
            sort,
            direction,
            page,
            tables,
        } => {
            let records = commands::load_records(&file, &tables.into(), today)?;
            let query = TableQuery {
                search_text: search,
                min_area,
                max_area,
                cause,
                sort,
                direction,
                page,
                ..TableQuery::default()
            };
            commands::print_table(&records, &query);
        }
        Commands::Cache { action } => {
            let cache = open_geocode_cache(&config, reqwest::Client::new())?;
            match action {
                CacheAction::Stats => commands::cache_stats(&config, &cache),
                CacheAction::Clear { yes } => {
                    let confirmed = yes
                        || dialoguer::Confirm::new()
                            .with_prompt("Delete every cached geocode result?")
                            .default(false)
                            .interact()?;
                    if confirmed {
                        commands::clear_cache(&cache)?;
                    } else {
                        println!("Cache left untouched.");
                    }
                }
            }
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
