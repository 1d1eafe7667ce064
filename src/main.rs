use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use docmap::Manifest;

/// Derive container definitions and search statements from entity manifests
#[derive(Parser, Debug)]
#[command(name = "docmap")]
#[command(about = "Schema derivation and search synthesis for document stores", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the container definition of every entity in the manifest
    Schema {
        /// Path to the manifest file
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Print the statement and parameters of every search in the manifest
    Query {
        /// Path to the manifest file
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the JSON output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let output = match &args.command {
        Command::Schema { manifest } => {
            info!("Deriving schemas from {:?}", manifest);
            let schemas = Manifest::load(manifest)?.schemas()?;
            info!("Derived {} container definition(s)", schemas.len());
            serde_json::Value::Array(schemas.iter().map(|s| s.to_definition()).collect())
        }
        Command::Query { manifest } => {
            info!("Building statements from {:?}", manifest);
            let statements = Manifest::load(manifest)?.statements()?;
            let rendered = statements
                .iter()
                .map(|spec| {
                    let parameters: Vec<serde_json::Value> = spec
                        .parameters
                        .iter()
                        .map(|p| serde_json::json!({ "name": p.name, "value": p.value }))
                        .collect();
                    serde_json::json!({ "query": spec.query, "parameters": parameters })
                })
                .collect();
            serde_json::Value::Array(rendered)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
