use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use opsconsole::api::routes;
use opsconsole::client::{FilterApiClient, SavedFilters};
use opsconsole::filter::{collect, from_backend_row, identify_filter_name, FilterForm, FilterSession};
use opsconsole::inventory::InventoryManager;
use opsconsole::models::config::AppConfig;
use opsconsole::models::filter::{FilterId, PersistedFilter};
use opsconsole::permission::PermissionRegistry;
use opsconsole::storage::{JsonFileStore, KeyValueStore, LocalFilterStore, MemoryStore};
use opsconsole::store::FilterRepository;
use opsconsole::utils::logging;

const LOCAL_STORE_FILE: &str = "local.json";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Operations console: saved log filters, role permissions and component inventory")]
struct Args {
    /// Address for the REST API server
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Port for the REST API server
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Directory for local filter storage
    #[clap(long, default_value = ".opsconsole")]
    data_dir: std::path::PathBuf,

    /// Console API used by the filters commands
    #[clap(long, default_value = "http://127.0.0.1:3000")]
    api_url: String,

    /// Timeout for API requests, in seconds
    #[clap(long, default_value = "10")]
    request_timeout_secs: u64,

    /// Owner recorded on saved filters
    #[clap(long)]
    user_id: Option<u64>,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST API server (default)
    Serve,

    /// Manage and apply saved log filters
    #[clap(subcommand)]
    Filters(FiltersCommand),
}

#[derive(Subcommand, Debug)]
enum FiltersCommand {
    /// List saved filters
    List,

    /// Save a filter built from the given form values
    Save {
        #[clap(long)]
        name: Option<String>,

        #[clap(flatten)]
        form: FormArgs,
    },

    /// Apply a saved filter to this console session
    Apply { id: String },

    /// Delete a saved filter
    Delete { id: String },

    /// Print the name a filter would be given
    Name {
        #[clap(flatten)]
        form: FormArgs,
    },

    /// Show the applied filter
    Current,

    /// Drop the applied filter
    Clear,

    /// Push filters saved while offline to the API
    Sync,

    /// Import saved filters from a JSON array of filter rows
    Import { file: std::path::PathBuf },
}

/// Filter form values as command-line flags
#[derive(clap::Args, Debug)]
struct FormArgs {
    /// Whole form as JSON; individual flags override its fields
    #[clap(long)]
    form_json: Option<String>,

    /// today, week, month or custom
    #[clap(long)]
    time_range: Option<String>,

    #[clap(long)]
    start_time: Option<String>,

    #[clap(long)]
    end_time: Option<String>,

    #[clap(long)]
    keyword: Option<String>,

    #[clap(long)]
    source_ip: Option<String>,

    #[clap(long)]
    hostname: Option<String>,

    #[clap(long = "device-type")]
    device_types: Vec<String>,

    /// Severity level 0-7, repeatable
    #[clap(long = "severity")]
    severities: Vec<String>,

    #[clap(long)]
    event_ids: Option<String>,

    #[clap(long)]
    alert_only: bool,

    #[clap(long)]
    error_only: bool,

    #[clap(long)]
    exclude_keyword: Option<String>,
}

impl FormArgs {
    fn into_form(self) -> Result<FilterForm> {
        let mut form = match &self.form_json {
            Some(raw) => serde_json::from_str(raw).context("--form-json is not a filter form")?,
            None => FilterForm::default(),
        };
        let overrides = [
            (&mut form.time_range, self.time_range),
            (&mut form.start_time, self.start_time),
            (&mut form.end_time, self.end_time),
            (&mut form.keyword, self.keyword),
            (&mut form.source_ip, self.source_ip),
            (&mut form.hostname, self.hostname),
            (&mut form.event_ids, self.event_ids),
            (&mut form.exclude_keyword, self.exclude_keyword),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if !self.device_types.is_empty() {
            form.device_types = self.device_types;
        }
        if !self.severities.is_empty() {
            form.severities = self.severities;
        }
        form.alert_only |= self.alert_only;
        form.error_only |= self.error_only;
        Ok(form)
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger with specified level
    logging::init_logger(logging::get_log_level(&args.log_level));

    let config = AppConfig {
        host: args.host,
        port: args.port,
        data_dir: args.data_dir,
        api_url: args.api_url,
        request_timeout_secs: args.request_timeout_secs,
        user_id: args.user_id,
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Filters(command) => run_filters(config, command).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting Ops Console v{}", env!("CARGO_PKG_VERSION"));

    let repository = web::Data::new(FilterRepository::new());
    let registry = web::Data::new(PermissionRegistry::with_defaults()?);
    let inventory = web::Data::new(Arc::new(RwLock::new(InventoryManager::with_defaults())));

    info!("Starting API server on {}:{}", config.host, config.port);

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(repository.clone())
            .app_data(registry.clone())
            .app_data(inventory.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

async fn run_filters(config: AppConfig, command: FiltersCommand) -> Result<()> {
    let persistent: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::open(config.data_dir.join(LOCAL_STORE_FILE))?);
    let client = FilterApiClient::new(
        &config.api_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let saved = SavedFilters::new(client, LocalFilterStore::new(persistent.clone()), config.user_id);
    // one CLI invocation is one console session
    let session = FilterSession::new(Arc::new(MemoryStore::new()), persistent);

    match command {
        FiltersCommand::List => {
            for filter in saved.list().await? {
                print_filter(&filter);
            }
        }
        FiltersCommand::Save { name, form } => {
            let criteria = collect(&form.into_form()?)?;
            let filter = saved.save(&criteria, name.as_deref()).await?;
            print_filter(&filter);
        }
        FiltersCommand::Apply { id } => {
            let filter = saved.get(&FilterId::parse(&id)).await?;
            let criteria = from_backend_row(&filter)?;
            let applied = session.apply(Some(&filter.filter_name), criteria)?;
            println!("{}", serde_json::to_string_pretty(&applied)?);
        }
        FiltersCommand::Delete { id } => {
            saved.delete(&FilterId::parse(&id)).await?;
            println!("deleted {}", id);
        }
        FiltersCommand::Name { form } => {
            let criteria = collect(&form.into_form()?)?;
            println!("{}", identify_filter_name(&criteria));
        }
        FiltersCommand::Current => match session.restore()? {
            Some(applied) => println!("{}", serde_json::to_string_pretty(&applied)?),
            None => println!("no filter applied"),
        },
        FiltersCommand::Clear => session.clear()?,
        FiltersCommand::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let rows: Vec<PersistedFilter> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a list of filters", file.display()))?;
            let report = saved.import(rows).await?;
            println!(
                "imported {}/{} filter(s), {} failed",
                report.success, report.total, report.fail
            );
            for error in &report.errors {
                println!("  {}", error);
            }
        }
        FiltersCommand::Sync => {
            let pushed = saved.sync_local().await?;
            println!("pushed {} local filter(s)", pushed);
        }
    }

    Ok(())
}

fn print_filter(filter: &PersistedFilter) {
    let id = filter
        .id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());
    println!("{}\t{}", id, filter.filter_name);
}
