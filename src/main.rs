use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rubrik_polaris::common::{primitives, PageArgs};
use rubrik_polaris::config::{Config, Overrides, Settings};
use rubrik_polaris::graphql::query_names;
use rubrik_polaris::polaris::{format_polaris_error, PolarisClient, PolarisHttpClient};
use rubrik_polaris::{gps, PolarisError, VERSION};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Command-line client for the Rubrik Polaris GraphQL API
#[derive(Parser, Debug)]
#[command(name = "polaris", version = VERSION, about, long_about = None)]
struct Args {
    /// Polaris account domain, e.g. my-account
    #[arg(long, global = true)]
    domain: Option<String>,

    /// Root domain of the account
    #[arg(long, global = true)]
    root_domain: Option<String>,

    /// Username for a password session; the password comes from rubrik_password
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Service account JSON file
    #[arg(long, global = true)]
    service_account: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the embedded GraphQL queries
    Queries,
    /// Run an embedded query
    Query {
        name: String,
        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
        /// Print the full GraphQL response
        #[arg(long, conflicts_with = "paginate")]
        raw: bool,
        /// Fetch every page into one response
        #[arg(long)]
        paginate: bool,
    },
    /// Values of a GraphQL enum
    Enum { name: String },
    /// Polaris deployment version
    Version,
    /// SLA domains, or the one named
    SlaDomains {
        #[arg(long)]
        name: Option<String>,
    },
    /// CDM clusters
    Clusters,
    /// State of a task chain
    TaskStatus { id: String },
    /// Session on a CDM appliance for the configured service account
    ApplianceToken { uuid: String },
    /// Show or change the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    SetDomain { domain: String },
    SetRootDomain { root_domain: String },
    SetUsername { username: String },
    SetServiceAccount { path: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_env("POLARIS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("polaris {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("rubrik-polaris").join("polaris.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".rubrik-polaris").join("polaris.log");
    }
    PathBuf::from("polaris.log")
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<PolarisError>() {
        Some(polaris) => format_polaris_error(polaris),
        None => format!("{:#}", err),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Logging disabled: {:#}", err);
            None
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {}", describe(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let format = args.output;
    let mut config = Config::load();

    match &args.command {
        Command::Queries => return print(&query_names(), format),
        Command::Config { action } => return configure(&mut config, action, format),
        _ => {}
    }

    let overrides = Overrides {
        domain: args.domain.clone(),
        root_domain: args.root_domain.clone(),
        username: args.username.clone(),
        service_account_file: args.service_account.clone(),
        insecure: args.insecure,
        timeout: args.timeout.map(Duration::from_secs),
        ..Overrides::default()
    };
    let settings = Settings::resolve(&overrides, &config)?;

    if let Command::ApplianceToken { uuid } = &args.command {
        let rubrik_polaris::config::AuthMethod::ServiceAccount(account) = &settings.auth else {
            anyhow::bail!("appliance-token needs a service account");
        };
        let http = PolarisHttpClient::new(settings.insecure)?;
        let token = account.get_appliance_token(&http, uuid).await?;
        return print(&token, format);
    }

    let client = PolarisClient::connect(settings).await?;
    let result: Value = match args.command {
        Command::Query {
            name,
            variables,
            raw,
            paginate,
        } => {
            let variables: Value = match variables {
                Some(text) => serde_json::from_str(&text).context("--variables must be a JSON object")?,
                None => Value::Null,
            };
            if raw {
                client.query_raw(&name, variables).await?
            } else if paginate {
                client.query_paginated(&name, variables).await?
            } else {
                client.query(&name, variables).await?
            }
        }
        Command::Enum { name } => Value::from(client.enum_values(&name).await?),
        Command::Version => Value::from(primitives::get_polaris_version(&client).await?),
        Command::SlaDomains { name } => primitives::get_sla_domains(&client, name.as_deref()).await?,
        Command::Clusters => gps::cluster::list_clusters(&client, Value::Null, &PageArgs::default()).await?,
        Command::TaskStatus { id } => primitives::get_task_status(&client, &id).await?,
        Command::Queries | Command::Config { .. } | Command::ApplianceToken { .. } => Value::Null,
    };

    print(&result, format)
}

fn configure(config: &mut Config, action: &ConfigCommand, format: OutputFormat) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            if let Some(path) = Config::config_path() {
                eprintln!("# {}", path.display());
            }
            return print(config, format);
        }
        ConfigCommand::SetDomain { domain } => config.set_domain(domain)?,
        ConfigCommand::SetRootDomain { root_domain } => config.set_root_domain(root_domain)?,
        ConfigCommand::SetUsername { username } => config.set_username(username)?,
        ConfigCommand::SetServiceAccount { path } => {
            rubrik_polaris::polaris::ServiceAccount::from_json_file(path)
                .with_context(|| format!("{} is not a Polaris service account", path.display()))?;
            config.set_service_account_file(path.clone())?
        }
    }
    print(config, format)
}
