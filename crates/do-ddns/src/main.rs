// # do_ddns - Dynamic DNS for DigitalOcean domains
//
// This binary is a THIN front-end only:
// - DO NOT add catalog, DNS, or reconciliation logic here
// - All of that lives in ddns-core; this file only wires components,
//   prints outcomes, and picks an exit code
//
// The binary is responsible for:
// 1. Loading configuration (file, environment, flags)
// 2. Initializing logging
// 3. Building the provider, IP resolver and catalog
// 4. Running exactly one command on a single-threaded runtime
//
// ## Configuration
//
// Lowest to highest precedence: built-in defaults, the JSON file given
// with `--config`, environment variables, command-line flags.
//
// - `DO_DDNS_API_TOKEN`: DigitalOcean API token
// - `DO_DDNS_IP_RESOLVER`: URL answering with the public IPv4 as plain text
// - `DO_DDNS_DATABASE`: Catalog file (default `~/.config/ddns/ddns.db`)
// - `DO_DDNS_LOG_LEVEL`: trace, debug, info, warn (default), error
//
// ## Example
//
// ```bash
// export DO_DDNS_API_TOKEN=your_token
// export DO_DDNS_IP_RESOLVER=https://api.ipify.org
//
// do_ddns domains add example.com
// do_ddns subdomains add support example.com
// do_ddns update-ips
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddns_core::{DdnsConfig, DdnsEngine, RecordId, SqliteCatalogStore};
use ddns_ip_http::HttpIpResolver;
use ddns_provider_digitalocean::DigitalOceanProvider;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

/// Exit codes
///
/// - 0: Command succeeded
/// - 1: Configuration or startup error
/// - 2: Runtime error (provider, resolver, or catalog failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep the A records of your DigitalOcean domains pointed at this host
#[derive(Debug, Parser)]
#[command(name = "do_ddns", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// DigitalOcean API token
    #[arg(long, global = true, env = "DO_DDNS_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// URL answering with the public IPv4 address as plain text
    #[arg(long, global = true, env = "DO_DDNS_IP_RESOLVER", value_name = "URL")]
    ip_resolver: Option<String>,

    /// Catalog database file
    #[arg(long, global = true, env = "DO_DDNS_DATABASE", value_name = "FILE")]
    database: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long, global = true, env = "DO_DDNS_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Top-level domains on the account
    #[command(subcommand)]
    Domains(DomainsCommand),

    /// A records below a managed domain
    #[command(subcommand)]
    Subdomains(SubdomainsCommand),

    /// Point every managed record at the current public IP
    UpdateIps {
        /// Patch records even when they already match
        #[arg(long)]
        force: bool,
    },

    /// Summarize configuration and catalog
    ShowInfo,
}

#[derive(Debug, Subcommand)]
enum DomainsCommand {
    /// List every domain on the account; managed ones are marked [*]
    List,
    /// Manage a domain
    Add { domain: String },
    /// Stop managing a domain and all of its subdomains
    Remove { domain: String },
    /// Manage every existing A record of a managed domain
    Import { domain: String },
}

#[derive(Debug, Subcommand)]
enum SubdomainsCommand {
    /// Upstream A records that are managed
    List { domain: String },
    /// Upstream A records that are not managed
    Unmanaged { domain: String },
    /// Create an A record pointing at the public IP and manage it
    Add { subdomain: String, domain: String },
    /// Manage an existing A record by its id
    Adopt {
        subdomain: String,
        domain: String,
        record_id: i64,
    },
    /// Stop managing a subdomain (the record is left as is)
    Remove { subdomain: String, domain: String },
    /// Compare the cached address with the public IP
    Current { subdomain: String, domain: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match parse_log_level(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_logging(log_level, cli.log_file.as_ref()) {
        eprintln!("Failed to initialize logging: {e:#}");
        return DdnsExitCode::ConfigError.into();
    }

    let (config, database) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return DdnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(config, database, cli.command).await {
            Ok(code) => code,
            Err(e) => {
                error!("Command failed: {}", e);
                eprintln!("{}", e.guidance());
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "Log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn init_logging(level: Level, log_file: Option<&PathBuf>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

/// Merge file, environment and flags into one validated configuration
///
/// # Returns
///
/// The configuration and the catalog file to open.
fn load_config(cli: &Cli) -> Result<(DdnsConfig, PathBuf)> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            DdnsConfig::from_json(&text)?
        }
        None => DdnsConfig::new(),
    };

    // clap has already folded the environment into these
    if let Some(token) = &cli.api_token {
        config.provider.api_token = Some(token.clone());
    }
    if let Some(url) = &cli.ip_resolver {
        config.ip_resolver.url = Some(url.clone());
    }
    if let Some(path) = &cli.database {
        config.catalog.path = Some(path.clone());
    }

    config.validate()?;

    let database = match &config.catalog.path {
        Some(path) => path.clone(),
        None => default_database_path()?,
    };

    Ok((config, database))
}

fn default_database_path() -> Result<PathBuf> {
    let home = home::home_dir()
        .context("cannot locate the home directory; pass --database or set DO_DDNS_DATABASE")?;
    Ok(home.join(".config").join("ddns").join("ddns.db"))
}

/// Configuration problems exit with 1, everything else with 2
fn exit_code_for(err: &ddns_core::Error) -> DdnsExitCode {
    use ddns_core::Error;

    match err {
        Error::Config(_) | Error::MissingApiToken | Error::NoIpResolverConfigured => {
            DdnsExitCode::ConfigError
        }
        _ => DdnsExitCode::RuntimeError,
    }
}

/// Build the components and run one command
async fn run(
    config: DdnsConfig,
    database: PathBuf,
    command: Command,
) -> ddns_core::Result<DdnsExitCode> {
    let provider = DigitalOceanProvider::new(&config.provider)?;
    let resolver = HttpIpResolver::from_config(&config.ip_resolver)?;
    let catalog = SqliteCatalogStore::open(&database).await?;
    debug!("Using catalog {}", database.display());

    let engine = DdnsEngine::new(
        Box::new(provider),
        Box::new(resolver),
        Box::new(catalog.clone()),
        config.engine.clone(),
    )?;

    let result = dispatch(&engine, &database, command).await;
    catalog.close().await;
    result
}

async fn dispatch(
    engine: &DdnsEngine,
    database: &std::path::Path,
    command: Command,
) -> ddns_core::Result<DdnsExitCode> {
    match command {
        Command::Domains(DomainsCommand::List) => {
            println!("{}", engine.show_all_domains().await?);
        }
        Command::Domains(DomainsCommand::Add { domain }) => {
            println!("{}", engine.manage_domain(&domain).await?);
        }
        Command::Domains(DomainsCommand::Remove { domain }) => {
            println!("{}", engine.un_manage_domain(&domain).await?);
        }
        Command::Domains(DomainsCommand::Import { domain }) => {
            let outcomes = engine.manage_all_existing_a_records(&domain).await?;
            if outcomes.is_empty() {
                println!("No A records to import for {domain}");
            }
            for outcome in outcomes {
                println!("{}", outcome.describe(&domain));
            }
        }
        Command::Subdomains(SubdomainsCommand::List { domain }) => {
            println!("{}", engine.list_sub_domains(&domain).await?);
        }
        Command::Subdomains(SubdomainsCommand::Unmanaged { domain }) => {
            println!("{}", engine.list_unmanaged(&domain).await?);
        }
        Command::Subdomains(SubdomainsCommand::Add { subdomain, domain }) => {
            let outcome = engine.manage_subdomain(&subdomain, &domain).await?;
            println!("{}", outcome.describe(&domain));
        }
        Command::Subdomains(SubdomainsCommand::Adopt {
            subdomain,
            domain,
            record_id,
        }) => {
            let outcome = engine
                .adopt_subdomain(&subdomain, &domain, RecordId(record_id))
                .await?;
            println!("{}", outcome.describe(&domain));
        }
        Command::Subdomains(SubdomainsCommand::Remove { subdomain, domain }) => {
            println!("{}", engine.un_manage_subdomain(&subdomain, &domain).await?);
        }
        Command::Subdomains(SubdomainsCommand::Current { subdomain, domain }) => {
            println!("{}", engine.subdomain_status(&subdomain, &domain).await?);
        }
        Command::UpdateIps { force } => {
            let report = engine.update_all_managed_subdomains(force).await?;
            println!("{report}");
            if !report.failures.is_empty() {
                return Ok(DdnsExitCode::RuntimeError);
            }
        }
        Command::ShowInfo => {
            println!("Catalog        : {}", database.display());
            println!("{}", engine.catalog_summary().await?);
        }
    }

    Ok(DdnsExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_adopt_with_global_flags() {
        let cli = Cli::try_parse_from([
            "do_ddns",
            "subdomains",
            "adopt",
            "support",
            "example.com",
            "10002",
            "--database",
            "/tmp/ddns.db",
        ])
        .unwrap();

        assert_eq!(cli.database, Some(PathBuf::from("/tmp/ddns.db")));
        match cli.command {
            Command::Subdomains(SubdomainsCommand::Adopt {
                subdomain,
                domain,
                record_id,
            }) => {
                assert_eq!(subdomain, "support");
                assert_eq!(domain, "example.com");
                assert_eq!(record_id, 10002);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_update_ips_force() {
        let cli = Cli::try_parse_from(["do_ddns", "update-ips", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::UpdateIps { force: true }));
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_config_errors_exit_with_one() {
        assert_eq!(
            exit_code_for(&ddns_core::Error::MissingApiToken),
            DdnsExitCode::ConfigError
        );
        assert_eq!(
            exit_code_for(&ddns_core::Error::NoManagedSubdomains),
            DdnsExitCode::RuntimeError
        );
    }
}
