use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use metatools_api::{query::markdown_table, Server};
use metatools_cache::DiskCache;
use metatools_core::{AssetIdentifier, Settings};
use metatools_docdb::DocDbClient;
use metatools_service::{CachedProceduresFetcher, MetadataServiceClient};
use metatools_upgrade::{NativeUpgrader, UpgradeTester};
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod channels;

#[derive(Debug, Parser)]
#[command(name = "metatools")]
#[command(about = "AIND metadata tools - queries, upgrade tests and reports", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty, table)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// DocDB REST API host
    #[arg(long, global = true, env = "METATOOLS_DOCDB_HOST")]
    db_host: Option<String>,

    /// v1 metadata database name
    #[arg(long, global = true)]
    database: Option<String>,

    /// v2 metadata database name
    #[arg(long, global = true)]
    database_v2: Option<String>,

    /// Metadata service base URL
    #[arg(long, global = true, env = "METATOOLS_SERVICE_URL")]
    service_url: Option<String>,

    /// Procedures cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Cache entry time-to-live in seconds; entries never expire if unset
    #[arg(long, global = true)]
    cache_ttl_secs: Option<u64>,

    /// Result limit applied to bare filter queries
    #[arg(long, global = true)]
    default_limit: Option<usize>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    Table,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP server mounting every tool
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Bind port
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Test the v1 to v2 schema upgrade for one asset
    #[command(group(clap::ArgGroup::new("ident").required(true)))]
    UpgradeTest {
        /// Look the asset up by its record id
        #[arg(long, group = "ident", value_name = "ID")]
        id: Option<String>,

        /// Look the asset up by its name
        #[arg(long, group = "ident", value_name = "NAME")]
        name: Option<String>,
    },

    /// Report v1-session assets whose fiber connections lack channel data
    FindMissingChannels {
        /// Maximum number of assets to sample
        #[arg(short, long, default_value = "1000")]
        limit: usize,

        /// Write the per-asset report to this CSV file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Pre-fetch procedures for every fiber photometry subject
    PopulateCache {
        /// Cap the number of subjects processed
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only report cache status, without fetching
        #[arg(long)]
        query_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = settings_from(&cli);

    if let Commands::Serve { host, port } = &cli.command {
        let addr = SocketAddr::new(*host, *port);
        let server = Server::new(addr, &settings)
            .await
            .context("Failed to initialize server state")?;
        return server.run().await.context("Server error");
    }

    match execute_command(&cli, &settings).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            if matches!(cli.command, Commands::UpgradeTest { .. }) && output["success"] != json!(true)
            {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug,hyper=info" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn settings_from(cli: &Cli) -> Settings {
    let mut settings = Settings::default();
    if let Some(host) = &cli.db_host {
        settings.docdb_host = host.clone();
    }
    if let Some(database) = &cli.database {
        settings.database = database.clone();
    }
    if let Some(database_v2) = &cli.database_v2 {
        settings.database_v2 = database_v2.clone();
    }
    if let Some(url) = &cli.service_url {
        settings.service_url = url.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = dir.clone();
    }
    if let Some(secs) = cli.cache_ttl_secs {
        settings.cache_ttl = Some(Duration::from_secs(secs));
    }
    if let Some(limit) = cli.default_limit {
        settings.default_limit = limit;
    }
    settings
}

async fn execute_command(cli: &Cli, settings: &Settings) -> Result<Value> {
    match &cli.command {
        Commands::Serve { .. } => unreachable!("handled in main"),
        Commands::UpgradeTest { id, name } => {
            execute_upgrade_test(settings, id.as_deref(), name.as_deref()).await
        }
        Commands::FindMissingChannels { limit, out } => {
            execute_find_missing_channels(settings, *limit, out.as_deref()).await
        }
        Commands::PopulateCache { limit, query_only } => {
            execute_populate_cache(settings, *limit, *query_only).await
        }
    }
}

async fn execute_upgrade_test(
    settings: &Settings,
    id: Option<&str>,
    name: Option<&str>,
) -> Result<Value> {
    let identifier = match (id, name) {
        (Some(id), None) => AssetIdentifier::Id(id.to_string()),
        (None, Some(name)) => AssetIdentifier::Name(name.to_string()),
        _ => unreachable!("clap enforces exactly one of --id/--name"),
    };

    let store = DocDbClient::new(&settings.docdb_host, &settings.database, &settings.collection);
    let tester = UpgradeTester::new(NativeUpgrader::new());
    let report = tester
        .test_asset(&store, &identifier)
        .await
        .context("Upgrade test failed")?;

    Ok(serde_json::to_value(report)?)
}

async fn execute_find_missing_channels(
    settings: &Settings,
    limit: usize,
    out: Option<&std::path::Path>,
) -> Result<Value> {
    use metatools_core::DocumentStore;

    let store = DocDbClient::new(&settings.docdb_host, &settings.database, &settings.collection);
    let pipeline = vec![
        json!({"$match": {"session.schema_version": {"$regex": "^1\\."}}}),
        json!({"$project": {"_id": 1, "name": 1, "created": 1, "session": 1}}),
        json!({"$limit": limit}),
    ];
    let records = store
        .aggregate(&pipeline)
        .await
        .context("Failed to sample v1-session assets")?;

    let rows = channels::survey_assets(&records);
    let missing: Vec<_> = rows.iter().filter(|r| r.missing_channel_data).collect();
    let examples: Vec<Value> = missing
        .iter()
        .take(10)
        .map(|row| {
            json!({
                "asset_id": row.asset_id,
                "name": row.name,
                "num_missing_channel": row.num_missing_channel,
                "num_fiber_connections": row.num_fiber_connections,
            })
        })
        .collect();

    let mut report = json!({
        "assets_checked": records.len(),
        "assets_with_fiber_connections": rows.len(),
        "assets_missing_channel_data": missing.len(),
        "session_version_breakdown": channels::version_breakdown(&rows),
        "examples": examples,
    });

    if let Some(path) = out {
        channels::write_csv(path, &rows)?;
        report["csv"] = json!(path.display().to_string());
    }

    Ok(report)
}

async fn execute_populate_cache(
    settings: &Settings,
    limit: Option<usize>,
    query_only: bool,
) -> Result<Value> {
    use metatools_core::DocumentStore;

    let store = DocDbClient::new(&settings.docdb_host, &settings.database, &settings.collection);
    let pipeline = vec![
        json!({"$match": {"data_description.modality.abbreviation": {"$regex": "fib", "$options": "i"}}}),
        json!({"$group": {"_id": "$subject.subject_id"}}),
        json!({"$sort": {"_id": -1}}),
    ];
    let groups = store
        .aggregate(&pipeline)
        .await
        .context("Failed to list fiber photometry subjects")?;

    let mut subject_ids: Vec<String> = groups
        .iter()
        .filter_map(|group| group.get("_id").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if let Some(limit) = limit {
        subject_ids.truncate(limit);
    }

    let cache = DiskCache::open(settings.cache_dir.clone(), settings.cache_ttl).await?;

    if query_only {
        let mut cached = 0;
        for subject_id in &subject_ids {
            if cache.contains(subject_id).await {
                cached += 1;
            }
        }
        return Ok(json!({
            "total_subjects": subject_ids.len(),
            "already_cached": cached,
            "not_cached": subject_ids.len() - cached,
        }));
    }

    let service = MetadataServiceClient::new(&settings.service_url);
    let fetcher = CachedProceduresFetcher::new(service, cache);

    let (mut already_cached, mut fetched, mut no_procedures, mut errors) = (0, 0, 0, 0);
    for subject_id in &subject_ids {
        if fetcher.cache().contains(subject_id).await {
            already_cached += 1;
            continue;
        }
        match fetcher.fetch(subject_id).await {
            Ok(Some(_)) => fetched += 1,
            Ok(None) => {
                warn!(subject_id, "no procedures found");
                no_procedures += 1;
            }
            Err(e) => {
                warn!(subject_id, error = %e, "failed to fetch procedures");
                errors += 1;
            }
        }
    }

    Ok(json!({
        "total_subjects": subject_ids.len(),
        "already_cached": already_cached,
        "newly_fetched": fetched,
        "no_procedures": no_procedures,
        "errors": errors,
    }))
}

fn print_output(format: &OutputFormat, value: &Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value)?;
        }
        OutputFormat::Table => {
            print_table(value)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    Value::String(s) => println!("{}: {}", key_colored, s.green()),
                    Value::Number(n) => println!("{}: {}", key_colored, n.to_string().yellow()),
                    Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}: {}", key_colored, val_colored);
                    }
                    _ => println!("{}: {}", key_colored, val),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("\n{}{}:", "Item ".cyan(), (i + 1).to_string().yellow());
                print_pretty(item)?;
            }
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

/// Arrays of flat records render as a markdown table; everything else
/// falls back to pretty output.
fn print_table(value: &Value) -> Result<()> {
    let records = match value {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![value.clone()],
        _ => return print_pretty(value),
    };

    match markdown_table(&records) {
        Some(table) => {
            println!("{table}");
            Ok(())
        }
        None => print_pretty(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_test_accepts_an_id_lookup() {
        let cli = Cli::try_parse_from(["metatools", "upgrade-test", "--id", "abc-123"]).unwrap();
        match cli.command {
            Commands::UpgradeTest { id, name } => {
                assert_eq!(id.as_deref(), Some("abc-123"));
                assert_eq!(name, None);
            }
            _ => panic!("expected an upgrade-test command"),
        }
    }

    #[test]
    fn upgrade_test_accepts_a_name_lookup() {
        let cli =
            Cli::try_parse_from(["metatools", "upgrade-test", "--name", "behavior_767891"]).unwrap();
        match cli.command {
            Commands::UpgradeTest { id, name } => {
                assert_eq!(id, None);
                assert_eq!(name.as_deref(), Some("behavior_767891"));
            }
            _ => panic!("expected an upgrade-test command"),
        }
    }

    #[test]
    fn upgrade_test_rejects_both_lookups() {
        let err = Cli::try_parse_from([
            "metatools",
            "upgrade-test",
            "--id",
            "abc-123",
            "--name",
            "behavior_767891",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn upgrade_test_requires_a_lookup() {
        let err = Cli::try_parse_from(["metatools", "upgrade-test"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
