//! Sheetshard CLI
//!
//! Entry point for the `sheetshard` command-line tool. Results are printed
//! as JSON on stdout; logs go to stderr.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use sheetshard::config::{user_config_path, ConfigError, EffectiveConfig, PROJECT_CONFIG_FILE};
use sheetshard::logging::init_logging;
use sheetshard::{
    escape, DeleteQuery, InsertQuery, RecordStore, SelectQuery, Settings, ShardError, ShardResult,
    UpdateQuery,
};

/// Exit code when a write applied to no row anywhere.
const EXIT_NOT_APPLIED: i32 = 2;

#[derive(Parser)]
#[command(name = "sheetshard")]
#[command(about = "Sharded record store over spreadsheet workbooks", version)]
struct Cli {
    /// Project config file (default: ./sheetshard.toml when present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Logical table name; repeat for several. Replaces `workbooks` from config
    #[arg(long = "workbook", short = 'w', global = true)]
    workbooks: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved shard ids
    Shards {
        /// Discard the cached list and resolve it again
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch matching rows from every shard
    Select {
        #[arg(long)]
        table: String,

        #[arg(long)]
        criteria: String,

        /// Columns to return (comma-separated; default all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Criteria parameter KEY=VALUE (repeatable). KEY is replaced
        /// literally wherever it occurs, e.g. `--param '${name}=Ada'`
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Append rows to the first shard with room
    Insert {
        #[arg(long)]
        table: String,

        /// A JSON object, or an array of objects
        #[arg(long)]
        data: String,
    },

    /// Update matching rows on one shard or all of them
    Update {
        #[arg(long)]
        table: String,

        #[arg(long)]
        criteria: String,

        /// A JSON object of column values
        #[arg(long)]
        data: String,

        /// Only this shard
        #[arg(long)]
        shard: Option<String>,

        /// Criteria parameter KEY=VALUE (repeatable); KEY is replaced literally
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Delete matching rows on one shard or all of them
    Delete {
        #[arg(long)]
        table: String,

        #[arg(long)]
        criteria: String,

        /// Only this shard
        #[arg(long)]
        shard: Option<String>,

        /// Only this row index
        #[arg(long)]
        row_id: Option<u64>,

        /// Criteria parameter KEY=VALUE (repeatable); KEY is replaced literally
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Print the effective configuration with secrets redacted
    Config,

    /// Bootstrap OAuth tokens for the configured client
    ///
    /// Without `--redirect-url`, prints the consent URL to visit. With it,
    /// exchanges the authorization code and caches the tokens.
    Auth {
        /// URL the consent page redirected to, or the bare code
        #[arg(long)]
        redirect_url: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let effective = match load_config(cli.config.as_deref(), &cli.workbooks) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    let settings = match effective.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Warning: {}", e);
    }

    match run(cli.command, &effective, &settings) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(explicit: Option<&Path>, workbooks: &[String]) -> Result<EffectiveConfig, ConfigError> {
    let project = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::IoError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(PROJECT_CONFIG_FILE)),
    };
    let overrides = (!workbooks.is_empty()).then(|| json!({ "workbooks": workbooks }));

    EffectiveConfig::build(user_config_path().as_deref(), project.as_deref(), overrides)
}

fn run(command: Commands, effective: &EffectiveConfig, settings: &Settings) -> ShardResult<i32> {
    match &command {
        Commands::Config => {
            emit(&effective.redacted())?;
            return Ok(0);
        }
        Commands::Auth { redirect_url } => return authorize(settings, redirect_url.as_deref()),
        _ => {}
    }

    let store = settings.open_store()?;
    match command {
        Commands::Shards { refresh } => {
            let shards = if refresh {
                store.refresh_shards()?
            } else {
                store.shards()?
            };
            emit(&shards)?;
            Ok(0)
        }
        Commands::Select {
            table,
            criteria,
            columns,
            params,
        } => {
            let query = SelectQuery::new(table)
                .with_criteria(escape(&criteria, &params))
                .with_columns(columns);
            emit(&store.select(&query)?)?;
            Ok(0)
        }
        Commands::Insert { table, data } => {
            let query = InsertQuery::new(table).with_data(parse_data(&data)?);
            report(&store, "inserted", store.insert(&query)?)
        }
        Commands::Update {
            table,
            criteria,
            data,
            shard,
            params,
        } => {
            let mut query = UpdateQuery::new(table)
                .with_criteria(escape(&criteria, &params))
                .with_data(parse_data(&data)?);
            if let Some(shard) = shard {
                query = query.with_shard(shard);
            }
            report(&store, "updated", store.update(&query)?)
        }
        Commands::Delete {
            table,
            criteria,
            shard,
            row_id,
            params,
        } => {
            let mut query = DeleteQuery::new(table).with_criteria(escape(&criteria, &params));
            if let Some(shard) = shard {
                query = query.with_shard(shard);
            }
            if let Some(row_id) = row_id {
                query = query.with_row_id(row_id);
            }
            report(&store, "deleted", store.delete(&query)?)
        }
        Commands::Config | Commands::Auth { .. } => Ok(0),
    }
}

fn authorize(settings: &Settings, redirect_url: Option<&str>) -> ShardResult<i32> {
    let provider = settings.oauth_provider(settings.http_transport()?)?;
    match redirect_url {
        None => emit(&json!({ "authorization_url": provider.authorization_url()? }))?,
        Some(redirected) => {
            provider.exchange_code(redirected)?;
            emit(&json!({
                "authorized": true,
                "token_cache": provider.cache_path().display().to_string(),
            }))?;
        }
    }
    Ok(0)
}

fn report(store: &RecordStore, action: &str, applied: bool) -> ShardResult<i32> {
    emit(&json!({ action: applied, "namespace": store.namespace().as_str() }))?;
    Ok(if applied { 0 } else { EXIT_NOT_APPLIED })
}

fn parse_data(raw: &str) -> ShardResult<Value> {
    serde_json::from_str(raw)
        .map_err(|e| ShardError::InvalidType(format!("--data is not valid JSON: {}", e)))
}

fn emit<T: Serialize + ?Sized>(value: &T) -> ShardResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).map_err(io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}
