#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use retrieve_rank::{ClusterSize, DocumentSource, RetrieveAndRankClient, ServiceConfig};

#[derive(Parser)]
#[command(name = "rnr", version, about = "Retrieve and rank service CLI")]
struct Cli {
    /// TOML file with url, version, username, password (default: RNR_* env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every call at info level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage search clusters
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
    /// Manage configuration sets
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// Index a JSON update file into a collection
    Index {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Search a collection, optionally re-scored by a ranker
    Search {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        question: String,
        /// Comma-separated fields to return
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        #[arg(long)]
        ranker: Option<String>,
    },
    /// Build ranker training data from a ground-truth CSV
    GenerateTrainingData {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        ground_truth: PathBuf,
        /// Training data output (appended to)
        #[arg(long)]
        out: PathBuf,
    },
    /// Manage rankers
    Ranker {
        #[command(subcommand)]
        command: RankerCommands,
    },
}

#[derive(Subcommand)]
enum ClusterCommands {
    List,
    Create {
        #[arg(long)]
        name: String,
        /// 1-7 units; omit for a free cluster
        #[arg(long)]
        size: Option<u32>,
    },
    Get {
        id: String,
    },
    Delete {
        id: String,
    },
    Resize {
        id: String,
        #[arg(long)]
        size: u32,
    },
    ResizeStatus {
        id: String,
    },
    Stats {
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    List {
        #[arg(long)]
        cluster: String,
    },
    Upload {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        zip: PathBuf,
    },
    Download {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        out: PathBuf,
    },
    Delete {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    List {
        #[arg(long)]
        cluster: String,
    },
    Create {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        config_name: String,
        #[arg(long)]
        name: String,
    },
    Delete {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum RankerCommands {
    List,
    Get {
        id: String,
    },
    Delete {
        id: String,
    },
    /// Generate training data and train a new ranker
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        ground_truth: PathBuf,
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        collection: String,
        /// Also keep the generated training data here
        #[arg(long)]
        training_out: Option<PathBuf>,
    },
    /// Rank candidate answers from a feature CSV
    Rank {
        id: String,
        #[arg(long)]
        answers: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ServiceConfig::from_toml_file(path)?,
        None => ServiceConfig::from_env()?,
    };
    let client = RetrieveAndRankClient::new(config)?;

    let output: Value = match cli.command {
        Commands::Cluster { command } => match command {
            ClusterCommands::List => client.list_clusters().await?,
            ClusterCommands::Create { name, size } => {
                let size = size.map(ClusterSize::new).transpose()?;
                client.create_cluster(&name, size).await?
            }
            ClusterCommands::Get { id } => client.get_cluster(&id).await?,
            ClusterCommands::Delete { id } => {
                client.delete_cluster(&id).await?;
                json!({ "deleted": id })
            }
            ClusterCommands::Resize { id, size } => client.resize_cluster(&id, size).await?,
            ClusterCommands::ResizeStatus { id } => client.cluster_resize_status(&id).await?,
            ClusterCommands::Stats { id } => client.cluster_stats(&id).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::List { cluster } => client.list_configs(&cluster).await?,
            ConfigCommands::Upload { cluster, name, zip } => {
                client.upload_config(&cluster, &name, &zip).await?;
                json!({ "uploaded": name })
            }
            ConfigCommands::Download { cluster, name, out } => {
                let bytes = client.download_config(&cluster, &name, &out).await?;
                json!({ "path": out.display().to_string(), "bytes": bytes })
            }
            ConfigCommands::Delete { cluster, name } => {
                client.delete_config(&cluster, &name).await?;
                json!({ "deleted": name })
            }
        },
        Commands::Collection { command } => match command {
            CollectionCommands::List { cluster } => client.list_collections(&cluster).await?,
            CollectionCommands::Create {
                cluster,
                config_name,
                name,
            } => client.create_collection(&cluster, &config_name, &name).await?,
            CollectionCommands::Delete { cluster, name } => {
                client.delete_collection(&cluster, &name).await?
            }
        },
        Commands::Index {
            cluster,
            collection,
            file,
        } => {
            client
                .index_documents(&cluster, &collection, DocumentSource::File(file))
                .await?
        }
        Commands::Search {
            cluster,
            collection,
            question,
            fields,
            ranker,
        } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            match ranker {
                Some(ranker) => {
                    client
                        .ranked_search(&cluster, &collection, &ranker, &question, &fields)
                        .await?
                }
                None => client.search(&cluster, &collection, &question, &fields).await?,
            }
        }
        Commands::GenerateTrainingData {
            cluster,
            collection,
            ground_truth,
            out,
        } => {
            let data = client
                .training_data_generator(cluster, collection)
                .persist_to(&out)
                .generate_from_path(&ground_truth)
                .await?;
            let skipped: Vec<Value> = data
                .skipped
                .iter()
                .map(|f| {
                    json!({
                        "row": f.row_index,
                        "question": f.question,
                        "error": f.error.to_string(),
                    })
                })
                .collect();
            json!({
                "path": out.display().to_string(),
                "queries": data.queries_issued,
                "fragments": data.fragments_collected,
                "skipped": skipped,
            })
        }
        Commands::Ranker { command } => match command {
            RankerCommands::List => client.list_rankers().await?,
            RankerCommands::Get { id } => client.get_ranker(&id).await?,
            RankerCommands::Delete { id } => {
                client.delete_ranker(&id).await?;
                json!({ "deleted": id })
            }
            RankerCommands::Create {
                name,
                ground_truth,
                cluster,
                collection,
                training_out,
            } => {
                client
                    .create_ranker(
                        &name,
                        &ground_truth,
                        &cluster,
                        &collection,
                        training_out.as_deref(),
                    )
                    .await?
            }
            RankerCommands::Rank { id, answers } => client.rank(&id, &answers).await?,
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
