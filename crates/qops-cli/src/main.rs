use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;


#[tokio::main]
pub async fn main() {
    env_logger::init();
    if let Err(e) = Cli::parse().run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, Parser)]
#[command(name = "qops")]
#[command(about = "aws sqs queue operations CLI written in rust", long_about = None)]
pub struct Cli {
    /// Target a LocalStack endpoint with static test credentials
    #[arg(long, global = true)]
    local: bool,

    /// Backend endpoint URL override (implies --local credentials)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List queues, or show attributes for the named queues
    Ls {
        names: Vec<String>,
        /// List queue names only, without fetching attributes
        #[arg(short = '1', long)]
        one: bool,
        /// Print full queue URLs instead of names (with -1)
        #[arg(short, long)]
        urls: bool,
    },
    /// Move messages from one queue to another
    Mv {
        source: String,
        destination: String,
        /// Maximum number of messages to move (0 = unlimited)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// Download messages from a queue into a directory
    Download {
        queue: String,
        dir: PathBuf,
        /// Number of messages to download (0 = unlimited)
        #[arg(short, long, default_value_t = 1)]
        limit: usize,
        /// Delete downloaded messages from the queue
        #[arg(short, long)]
        delete: bool,
    },
    /// Send a message to a queue
    Send {
        queue: String,
        /// Message body; stdin is read to end when omitted
        #[arg(long)]
        body: Option<String>,
        /// key=value message attribute, repeatable
        #[arg(short, long = "attribute", value_name = "KEY=VALUE")]
        attribute: Vec<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = sdk_config(self.local, self.endpoint.as_deref()).await;
        let client = qops::QueueClient::from_config(config);

        match self.command {
            Commands::Ls { names, one, urls } => ls(&client, names, one, urls).await,
            Commands::Mv {
                source,
                destination,
                limit,
            } => mv(&client, &source, &destination, limit).await,
            Commands::Download {
                queue,
                dir,
                limit,
                delete,
            } => download(&client, &queue, &dir, limit, delete).await,
            Commands::Send {
                queue,
                body,
                attribute,
            } => send(&client, &queue, body, &attribute).await,
        }
    }
}

/// `--local`/`--endpoint` target a LocalStack-style endpoint with static
/// test credentials; otherwise the ambient AWS environment is used.
async fn sdk_config(local: bool, endpoint: Option<&str>) -> aws_config::SdkConfig {
    if local || endpoint.is_some() {
        log::debug!(
            "using local endpoint {}",
            endpoint.unwrap_or("http://localhost:4566")
        );
        aws_config::from_env()
            .region(
                // supports loading region from known env variables
                aws_config::meta::region::RegionProviderChain::default_provider()
                    .or_else(aws_config::Region::from_static("us-east-1")),
            )
            .credentials_provider(aws_sdk_sqs::config::Credentials::new(
                "test", "test", None, None, "static",
            ))
            .endpoint_url(endpoint.unwrap_or("http://localhost:4566"))
            .load()
            .await
    } else {
        aws_config::from_env().load().await
    }
}

async fn ls(
    client: &qops::QueueClient,
    names: Vec<String>,
    one: bool,
    urls: bool,
) -> anyhow::Result<()> {
    let names = if names.is_empty() {
        let list = client.list().await?;
        if list.is_empty() {
            println!("No queues");
            return Ok(());
        }
        if one {
            for url in list {
                if urls {
                    println!("{}", url);
                } else {
                    println!("{}", url.name());
                }
            }
            return Ok(());
        }
        list.iter().map(|url| url.name().to_string()).collect()
    } else {
        names
    };

    match client.fetch_many(&names).await {
        Ok(records) => {
            if records.is_empty() {
                println!("No queues");
            } else {
                print_table(&records);
            }
            Ok(())
        }
        Err(error) => {
            // partial results still print; the failures go to stderr
            print_table(&error.records);
            for failure in &error.failures {
                eprintln!("{}", failure);
            }
            Err(error.into())
        }
    }
}

fn print_table(records: &[qops::QueueAttributes]) {
    if records.is_empty() {
        return;
    }
    println!("NAME\tMESSAGES\tIN-FLIGHT\tTIMEOUT\tMAX\tDEAD-LETTER-TARGET");
    for record in records {
        println!("{}", record);
    }
}

async fn mv(
    client: &qops::QueueClient,
    source: &str,
    destination: &str,
    limit: usize,
) -> anyhow::Result<()> {
    if !qops::is_queue_url(source) {
        let names = [source.to_string()];
        if let Ok(records) = client.fetch_many(&names).await {
            if let Some(info) = records.first() {
                if limit > 0 {
                    println!(
                        "Moving {} out of {} messages, please wait...",
                        limit, info.visible
                    );
                } else {
                    println!("Moving {} messages, please wait...", info.visible);
                }
            }
        }
    }

    match client.move_messages(source, destination, limit).await {
        Ok(moved) => {
            println!("Moved {} messages", moved);
            Ok(())
        }
        Err(error) => {
            println!("Moved {} messages", error.processed);
            Err(error.into())
        }
    }
}

async fn download(
    client: &qops::QueueClient,
    queue: &str,
    dir: &PathBuf,
    limit: usize,
    delete: bool,
) -> anyhow::Result<()> {
    match client.download(queue, dir, limit, delete).await {
        Ok(downloaded) => {
            println!("Downloaded {} messages", downloaded);
            Ok(())
        }
        Err(error) => {
            println!("Downloaded {} messages", error.processed);
            Err(error.into())
        }
    }
}

async fn send(
    client: &qops::QueueClient,
    queue: &str,
    body: Option<String>,
    attributes: &[String],
) -> anyhow::Result<()> {
    let attributes = parse_attributes(attributes)?;
    let body = match body {
        Some(body) => body,
        None => read_stdin()?,
    };

    let id = client.publish(queue, &body, &attributes).await?;
    println!("Sent message id: {}", id);
    Ok(())
}

/// Parses repeated `key=value` flags into an attribute map.
fn parse_attributes(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut attributes = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid attribute '{}', expected key=value", pair))?;
        attributes.insert(key.to_string(), value.to_string());
    }
    Ok(attributes)
}

fn read_stdin() -> anyhow::Result<String> {
    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("failed to read message body from stdin")?;
    Ok(body)
}
