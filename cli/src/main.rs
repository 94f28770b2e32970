//! BigQuery-on-SQLite CLI
//!
//! ```bash
//! # Run statements against a database file
//! bqlite --database test.db exec "CREATE TABLE t (c ARRAY<INT64>)"
//!
//! # Named parameters take JSON values
//! bqlite exec "SELECT %(x)s" --param 'x=[1, 2, 3]'
//!
//! # Catalog
//! bqlite describe mydataset.t
//! bqlite tables myproject.mydataset
//! bqlite datasets
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use engine::protocol::DatasetReference;
use engine::{Parameters, Session, SessionConfig, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is unset. Targets follow the binary crate name.
const DEFAULT_FILTER: &str = "bqlite=info,engine=info";

/// BigQuery-dialect shell over SQLite
#[derive(Parser, Debug)]
#[command(name = "bqlite", version, about = "Run BigQuery-dialect SQL against SQLite")]
struct Args {
    /// SQLite database path
    #[arg(long, env = "BQLITE_DATABASE")]
    database: Option<String>,

    /// Default project for table references
    #[arg(long, env = "BQLITE_PROJECT")]
    project: Option<String>,

    /// JSON session configuration
    #[arg(long, value_name = "FILE", env = "BQLITE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute statements in order and print their results
    Exec {
        #[arg(required = true)]
        sql: Vec<String>,

        /// Named parameter as NAME=JSON
        #[arg(long = "param", value_name = "NAME=JSON")]
        params: Vec<String>,
    },
    /// Print the descriptor of a table or view
    Describe { table: String },
    /// List tables of a dataset
    Tables { dataset: Option<String> },
    /// List datasets
    Datasets,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::from_env(),
    };
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(project) = args.project {
        config.project = project;
    }

    let mut session = Session::open(config)?;
    tracing::debug!("Using session {}", session.id);

    match args.command {
        Command::Exec { sql, params } => {
            let parameters = parse_params(&params)?;
            for statement in &sql {
                exec(&mut session, statement, &parameters)?;
            }
        }
        Command::Describe { table } => {
            let descriptor = session.catalog().resolve_table(&table)?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Command::Tables { dataset } => {
            let catalog = session.catalog();
            let dataset = match dataset {
                Some(dataset) => DatasetReference::parse(&dataset, &session.config().project)?,
                None => catalog
                    .list_datasets()?
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("no datasets configured"))?,
            };
            let tables = catalog.list_tables(&dataset)?;
            println!("{}", serde_json::to_string_pretty(&tables)?);
        }
        Command::Datasets => {
            let datasets = session.catalog().list_datasets()?;
            println!("{}", serde_json::to_string_pretty(&datasets)?);
        }
    }

    Ok(())
}

fn exec(session: &mut Session, sql: &str, parameters: &Parameters) -> Result<()> {
    let mut cursor = session.cursor();
    cursor.execute(sql, parameters)?;

    if cursor.description().is_empty() {
        println!("{}", serde_json::json!({ "rowCount": cursor.row_count() }));
        return Ok(());
    }

    let names: Vec<String> = cursor
        .description()
        .iter()
        .map(|column| column.name.clone())
        .collect();
    for row in cursor.fetch_all() {
        let record: serde_json::Map<String, serde_json::Value> = names
            .iter()
            .cloned()
            .zip(row?.iter().map(Value::to_json))
            .collect();
        println!("{}", serde_json::Value::Object(record));
    }
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Parameters> {
    let mut parameters = Parameters::new();
    for param in raw {
        let (name, json) = param
            .split_once('=')
            .ok_or_else(|| anyhow!("parameter '{}' is not NAME=JSON", param))?;
        let value: serde_json::Value = serde_json::from_str(json)
            .with_context(|| format!("parameter '{}' is not valid JSON", name))?;
        parameters.insert(name, Value::from(value));
    }
    Ok(parameters)
}
