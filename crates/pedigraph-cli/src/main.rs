use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pedigraph_analytics::{
    audit_breeds, breed_inbreeding_stats, coefficient_for_mating, coefficient_of_inbreeding,
    pedigree_completeness, pedigree_tree, self_ancestry_path,
};
use pedigraph_core::{
    AnalyticsConfig, CoalescerConfig, ImportConfig, PedigreeSource, RegistryId,
};
use pedigraph_import::{JsonFileSource, PedigreeImporter};
use pedigraph_store::{GraphStore, NodeId};

#[derive(Parser)]
#[command(name = "pedigraph")]
#[command(about = "Pedigraph - pedigree graph import and genetic analytics", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// JSON file of dog records serving as the pedigree source
    #[arg(short, long, global = true, env = "PEDIGRAPH_SOURCE", default_value = "dogs.json")]
    source: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a dog, its ancestry and one level of offspring
    Import {
        /// Registry id of the dog
        id: String,
    },

    /// Print a dog's ancestry tree
    Pedigree {
        /// Registry id of the dog
        id: String,

        /// Tree depth in generations
        #[arg(short, long)]
        depth: Option<u32>,
    },

    /// Coefficient of inbreeding for one dog
    Coi {
        /// Registry id of the dog
        id: String,

        /// Generation depth
        #[arg(short, long)]
        generations: Option<u32>,
    },

    /// Coefficient of inbreeding for a hypothetical mating
    Mating {
        /// Registry id of the sire
        father: String,

        /// Registry id of the dam
        mother: String,

        /// Generation depth
        #[arg(short, long)]
        generations: Option<u32>,
    },

    /// Audit breeds for dogs recorded as their own ancestor
    Audit {
        /// Breed names defining the cohort
        #[arg(required = true)]
        breeds: Vec<String>,
    },

    /// Trace the self-ancestry loop of one dog, if any
    Loop {
        /// Registry id of the dog
        id: String,
    },

    /// Pedigree completeness of one dog
    Completeness {
        /// Registry id of the dog
        id: String,

        /// Generation depth
        #[arg(short, long)]
        generations: Option<u32>,
    },

    /// Inbreeding distribution over breed cohorts
    Stats {
        /// Breed names defining the cohort
        #[arg(required = true)]
        breeds: Vec<String>,

        /// Generation depth
        #[arg(short, long)]
        generations: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match execute_command(&cli).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<serde_json::Value> {
    let source = Arc::new(
        JsonFileSource::load(&cli.source)
            .with_context(|| format!("failed to load pedigree source {}", cli.source))?,
    );
    let store = Arc::new(GraphStore::new());
    let importer = PedigreeImporter::new(
        Arc::clone(&store),
        Arc::clone(&source) as Arc<dyn PedigreeSource>,
        ImportConfig::default(),
        CoalescerConfig::default(),
    );
    let analytics = AnalyticsConfig::default();

    match &cli.command {
        Commands::Import { id } => {
            let node = importer.import(&RegistryId::from(id.as_str())).await?;
            let read = store.read();
            Ok(json!({
                "id": id,
                "imported": node.is_some(),
                "nodes": read.node_count(),
                "relationships": read.relationship_count(),
            }))
        }
        Commands::Pedigree { id, depth } => {
            let node = import_one(&importer, id).await?;
            let tree = pedigree_tree(&store.read(), node, depth.unwrap_or(analytics.generations));
            Ok(serde_json::to_value(tree)?)
        }
        Commands::Coi { id, generations } => {
            let generations = generations.unwrap_or(analytics.generations);
            let node = import_one(&importer, id).await?;
            let coefficient = coefficient_of_inbreeding(&store.read(), node, generations);
            Ok(json!({
                "id": id,
                "generations": generations,
                "coefficient": coefficient,
                "percent": coefficient * 100.0,
            }))
        }
        Commands::Mating {
            father,
            mother,
            generations,
        } => {
            let generations = generations.unwrap_or(analytics.generations);
            let sire = import_one(&importer, father).await?;
            let dam = import_one(&importer, mother).await?;
            let coefficient = coefficient_for_mating(&store.read(), sire, dam, generations);
            Ok(json!({
                "father": father,
                "mother": mother,
                "generations": generations,
                "coefficient": coefficient,
                "percent": coefficient * 100.0,
            }))
        }
        Commands::Audit { breeds } => {
            import_all(&importer, &source).await;
            let findings = audit_breeds(&store.read(), breeds);
            Ok(json!({
                "breeds": breeds,
                "findings": findings.iter().map(RegistryId::as_str).collect::<Vec<_>>(),
            }))
        }
        Commands::Loop { id } => {
            import_one(&importer, id).await?;
            let path = self_ancestry_path(&store.read(), &RegistryId::from(id.as_str()));
            Ok(json!({
                "id": id,
                "own_ancestor": path.is_some(),
                "path": path.unwrap_or_default()
                    .iter()
                    .map(RegistryId::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            }))
        }
        Commands::Completeness { id, generations } => {
            let generations = generations.unwrap_or(analytics.generations);
            let node = import_one(&importer, id).await?;
            let percent = pedigree_completeness(&store.read(), node, generations);
            Ok(json!({
                "id": id,
                "generations": generations,
                "percent": percent,
            }))
        }
        Commands::Stats {
            breeds,
            generations,
        } => {
            import_all(&importer, &source).await;
            let stats = breed_inbreeding_stats(
                &store,
                breeds,
                generations.unwrap_or(analytics.generations),
            );
            Ok(serde_json::to_value(stats)?)
        }
    }
}

async fn import_one(importer: &Arc<PedigreeImporter>, id: &str) -> Result<NodeId> {
    let id = RegistryId::from(id);
    importer
        .import(&id)
        .await?
        .ok_or_else(|| anyhow!("no dog with id {id} in the pedigree source"))
}

/// Import every record of the source file; cohort analytics need the full
/// graph. Individual failures are logged, not fatal.
async fn import_all(importer: &Arc<PedigreeImporter>, source: &JsonFileSource) {
    for id in source.canonical_ids() {
        if let Err(e) = importer.import(id).await {
            warn!(%id, error = %e, "import failed");
        }
    }
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, indent: usize) -> Result<()> {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => {
                        println!("{pad}{}: {}", key_colored, s.green());
                    }
                    serde_json::Value::Number(n) => {
                        println!("{pad}{}: {}", key_colored, n.to_string().yellow());
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{pad}{}: {}", key_colored, val_colored);
                    }
                    serde_json::Value::Null => {
                        println!("{pad}{}: -", key_colored);
                    }
                    nested => {
                        println!("{pad}{}:", key_colored);
                        print_pretty(nested, indent + 1)?;
                    }
                }
            }
        }
        serde_json::Value::Array(arr) if arr.is_empty() => {
            println!("{pad}{}", "(none)".dimmed());
        }
        serde_json::Value::Array(arr) => {
            for item in arr {
                match item {
                    serde_json::Value::String(s) => println!("{pad}- {}", s.green()),
                    nested => print_pretty(nested, indent + 1)?,
                }
            }
        }
        _ => {
            println!("{pad}{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}
