#![forbid(unsafe_code)]

use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

use kayentactl::analysis::{
    build_execution_request, classify, parse_thresholds, write_report, AnalysisParams,
    CompletionPoller, LoggingObserver, PollError, ReportFormat, SharedObserver, SpinnerObserver,
    StageTablePrinter,
};
use kayentactl::canary_config::load_canary_config;
use kayentactl::duration::{format_duration, parse_duration};
use kayentactl::kayenta::{
    expand_account_type, AccountCredential, AnalysisApi, CanaryConfig, CanaryConfigApi,
    ClientConfig, CredentialsApi, KayentaAdapter, StandaloneCanaryAnalysisInput, Threshold,
    DEFAULT_BASE_URL,
};

const BANNER: &str = r"
   __ _______  _______  ___________  _____________
  / //_/ _ \ \/ / __/ |/ /_  __/ _ |/ ___/_  __/ /
 / ,< / __ |\  / _//    / / / / __ / /__  / / / /__
/_/|_/_/ |_|/_/___/_/|_/ /_/ /_/ |_\___/ /_/ /____/
";

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(
    name = "kayentactl",
    version,
    about = "Run Kayenta standalone canary analyses and report the verdict"
)]
struct Cli {
    /// Base URL of the Kayenta service
    #[arg(long, short = 'u', global = true, env = "KAYENTA_URL", default_value = DEFAULT_BASE_URL)]
    kayenta_url: String,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, short = 'v', global = true, default_value = "info")]
    verbosity: String,
    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start and inspect canary analyses
    Analysis {
        #[command(subcommand)]
        command: AnalysisCommands,
    },
    /// Inspect the accounts configured on the service
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage canary configs stored on the service
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum AnalysisCommands {
    /// Submit a standalone analysis and wait for its verdict
    Start(StartArgs),
    /// Fetch the current status of an analysis
    Get {
        /// Execution ID returned by `analysis start`
        id: String,
        #[arg(long, short = 'o', default_value = "pretty")]
        output: ReportFormat,
    },
}

#[derive(Subcommand)]
enum AccountsCommands {
    /// List accounts, optionally filtered by type
    List {
        /// Account type, or one of the shorthands metrics, config, object
        #[arg(long = "type", short = 't')]
        account_type: Option<String>,
        #[arg(long, short = 'o', default_value = "pretty")]
        output: ReportFormat,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List stored canary configs
    List {
        /// Only configs that belong to this application
        #[arg(long)]
        application: Option<String>,
        #[arg(long, short = 'o', default_value = "pretty")]
        output: ReportFormat,
    },
    /// Create the config, or replace the stored one with the same name
    Upsert {
        /// Location of the canary config (http(s) URL, file:// URL or path)
        #[arg(long, alias = "canary-config-url")]
        canary_config: String,
        /// Application the config is stored under
        #[arg(long)]
        application: String,
    },
}

#[derive(Args)]
struct StartArgs {
    /// Location of the canary config (http(s) URL, file:// URL or path)
    #[arg(long, alias = "canary-config-url")]
    canary_config: String,
    /// Scope used for whichever of control or experiment is not given
    #[arg(long, short = 's')]
    scope: Option<String>,
    /// Baseline identifier, `scope` or `location/scope`
    #[arg(long, short = 'c')]
    control: Option<String>,
    /// Canary identifier, `scope` or `location/scope`
    #[arg(long, short = 'e')]
    experiment: Option<String>,
    /// Start of the analysis window, e.g. 2020-12-20T14:49:31.647Z
    #[arg(long, default_value = "")]
    start_time_iso: String,
    /// End of the analysis window, e.g. 2020-12-20T15:49:31.647Z
    #[arg(long, default_value = "")]
    end_time_iso: String,
    /// Comma separated thresholds, e.g. `marginal=50,pass=90`
    #[arg(long, default_value = "")]
    thresholds: String,
    /// How often to poll for completion
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    interval: Duration,
    /// How long to wait for completion before giving up
    #[arg(long, default_value = "1h", value_parser = parse_duration)]
    timeout: Duration,
    /// How often the service judges the canary during its lifetime
    #[arg(long, default_value = "5m", value_parser = parse_duration)]
    analysis_interval: Duration,
    /// Total duration of the analysis
    #[arg(long, default_value = "5m", value_parser = parse_duration)]
    lifetime_duration: Duration,
    /// How far the control window is shifted back from the experiment window
    #[arg(long, default_value = "0s", value_parser = parse_duration)]
    control_offset: Duration,
    /// Print the execution ID and exit without waiting
    #[arg(long)]
    no_wait: bool,
    #[arg(long, short = 'o', default_value = "pretty")]
    output: ReportFormat,
    #[arg(long, value_enum, default_value_t = ProgressMode::Table)]
    progress: ProgressMode,
    #[arg(long)]
    metrics_account: Option<String>,
    #[arg(long)]
    storage_account: Option<String>,
    #[arg(long)]
    application: Option<String>,
    #[arg(long)]
    user: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// Redraw a stage table in place
    Table,
    /// A single spinner line on stderr
    Spinner,
    /// One log line per poll
    Log,
    /// Show nothing while waiting
    #[value(name = "none")]
    Off,
}

impl ProgressMode {
    fn observer(self) -> Option<SharedObserver> {
        match self {
            ProgressMode::Table => Some(Arc::new(StageTablePrinter::stdout())),
            ProgressMode::Spinner => Some(Arc::new(SpinnerObserver::stderr())),
            ProgressMode::Log => Some(Arc::new(LoggingObserver)),
            ProgressMode::Off => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    if let Err(e) = init_logging(&cli.verbosity, cli.no_color) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    eprintln!("{}", BANNER.bright_magenta());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "kayentactl failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: &str, no_color: bool) -> CliResult<()> {
    let level: LevelFilter = verbosity
        .parse()
        .map_err(|_| format!("invalid verbosity {verbosity:?}"))?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init()
        .map_err(|e| format!("failed to initialise logging: {e}"))?;
    Ok(())
}

async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = ClientConfig::from_env().with_base_url(cli.kayenta_url);
    let client = Arc::new(KayentaAdapter::new(config)?);

    match cli.command {
        Commands::Analysis { command } => match command {
            AnalysisCommands::Start(args) => start(client, args).await,
            AnalysisCommands::Get { id, output } => {
                let status = client.fetch(&id).await?;
                write_report(&status, output, &mut io::stdout().lock())?;
                Ok(ExitCode::SUCCESS)
            }
        },
        Commands::Accounts { command } => match command {
            AccountsCommands::List {
                account_type,
                output,
            } => {
                let mut accounts = client.list_credentials().await?;
                if let Some(kind) = account_type.as_deref().map(expand_account_type) {
                    accounts.retain(|a| a.supports(&kind));
                }
                print_accounts(&accounts, output)?;
                Ok(ExitCode::SUCCESS)
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::List {
                application,
                output,
            } => {
                let configs = client.list_canary_configs(application.as_deref()).await?;
                print_configs(&configs, output)?;
                Ok(ExitCode::SUCCESS)
            }
            ConfigCommands::Upsert {
                canary_config,
                application,
            } => {
                let config = load_canary_config(&canary_config).await?;
                let id = client.upsert_canary_config(&application, &config).await?;
                info!(canary_config_id = %id, name = %config.name, "canary config stored");
                println!("{id}");
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

async fn start(client: Arc<KayentaAdapter>, args: StartArgs) -> CliResult<ExitCode> {
    let control = args
        .control
        .or_else(|| args.scope.clone())
        .ok_or("either --control or --scope is required")?;
    let experiment = args
        .experiment
        .or_else(|| args.scope.clone())
        .ok_or("either --experiment or --scope is required")?;

    let params = AnalysisParams {
        control,
        experiment,
        start_time_iso: args.start_time_iso,
        end_time_iso: args.end_time_iso,
        control_offset: args.control_offset,
        analysis_interval: args.analysis_interval,
        lifetime: args.lifetime_duration,
        thresholds: parse_thresholds(&args.thresholds, &Threshold::default()),
    };
    let request = build_execution_request(&params)?;
    let canary_config = load_canary_config(&args.canary_config).await?;

    let mut input = StandaloneCanaryAnalysisInput::new(canary_config, request);
    input.metrics_account_name = args.metrics_account;
    input.storage_account_name = args.storage_account;
    input.application = args.application;
    input.user = args.user;

    info!(kayenta_url = %client.base_url(), "starting canary analysis");
    let execution_id = client.submit(&input).await?;
    info!(execution_id = %execution_id, "canary analysis started");

    if args.no_wait {
        println!("{execution_id}");
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        interval = %format_duration(args.interval),
        timeout = %format_duration(args.timeout),
        "polling until canary analysis is complete"
    );
    let poller = CompletionPoller::new(Arc::clone(&client), args.interval);
    let status = match poller
        .poll_for(&execution_id, args.timeout, args.progress.observer())
        .await
    {
        Ok(status) => status,
        Err(e @ PollError::Timeout { .. }) => {
            warn!(
                execution_id = %execution_id,
                "stopped waiting; the analysis may still be running"
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    write_report(&status, args.output, &mut io::stdout().lock())?;

    let verdict = classify(&status);
    if verdict.success {
        info!(execution_id = %execution_id, "{}", verdict.message);
    } else {
        error!(execution_id = %execution_id, "{}", verdict.message);
    }
    Ok(verdict.exit_code())
}

#[derive(Tabled)]
struct AccountRow<'a> {
    #[tabled(rename = "NAME")]
    name: &'a str,
    #[tabled(rename = "TYPE")]
    account_type: &'a str,
    #[tabled(rename = "SUPPORTED TYPES")]
    supported_types: String,
}

impl<'a> From<&'a AccountCredential> for AccountRow<'a> {
    fn from(account: &'a AccountCredential) -> Self {
        Self {
            name: &account.name,
            account_type: &account.account_type,
            supported_types: account.supported_types.join(", "),
        }
    }
}

fn print_accounts(accounts: &[AccountCredential], format: ReportFormat) -> CliResult<()> {
    let mut out = io::stdout().lock();
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, accounts)?;
            writeln!(out)?;
        }
        ReportFormat::Pretty => {
            let rows = accounts.iter().map(AccountRow::from);
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            writeln!(out, "{table}")?;
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct ConfigRow<'a> {
    #[tabled(rename = "ID")]
    id: &'a str,
    #[tabled(rename = "NAME")]
    name: &'a str,
    #[tabled(rename = "APPLICATIONS")]
    applications: String,
    #[tabled(rename = "METRICS")]
    metrics: usize,
}

impl<'a> From<&'a CanaryConfig> for ConfigRow<'a> {
    fn from(config: &'a CanaryConfig) -> Self {
        Self {
            id: config.id.as_deref().unwrap_or(""),
            name: &config.name,
            applications: config.applications.join(", "),
            metrics: config.metrics.len(),
        }
    }
}

fn print_configs(configs: &[CanaryConfig], format: ReportFormat) -> CliResult<()> {
    let mut out = io::stdout().lock();
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut out, configs)?;
            writeln!(out)?;
        }
        ReportFormat::Pretty => {
            let mut table = Table::new(configs.iter().map(ConfigRow::from));
            table.with(Style::rounded());
            writeln!(out, "{table}")?;
        }
    }
    Ok(())
}
