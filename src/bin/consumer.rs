use kafka_demo::{
    conf::{load_dotenv, AppConfig},
    kafka::{consume, ConsumeSettings, Credentials, KafkaConnection, KafkaEventSource},
    log_error,
    utils::o11y::logging::build_subscriber,
};

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, instrument};

/// Read messages as a member of a consumer group, print each value, and
/// commit its offset
#[derive(Parser, Debug)]
struct Cli {
    /// Broker address(es), comma-separated host:port
    #[arg(long, env = "KAFKA_BROKER")]
    broker: String,

    /// SASL username
    #[arg(long, env = "KAFKA_USER")]
    user: String,

    /// SASL password
    #[arg(long, env = "KAFKA_PASSWORD", hide_env_values = true)]
    password: String,

    /// Topic to read from [default: demo-events]
    #[arg(long)]
    topic: Option<String>,

    /// Consumer group to join [default: cli]
    #[arg(long)]
    group_id: Option<String>,

    /// Path to the configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit after this many messages instead of consuming forever
    #[arg(long)]
    limit: Option<u64>,
}

#[instrument(skip_all, fields(broker = %args.broker))]
async fn run(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(args.config.as_deref())?;

    let topic = args.topic.unwrap_or_else(|| config.topic.name.clone());
    let group_id = args
        .group_id
        .unwrap_or_else(|| config.consumer.group_id.clone());
    let connection = KafkaConnection::new(
        args.broker,
        Credentials::new(args.user, args.password),
        &config.kafka,
    );

    let mut source = KafkaEventSource::new(
        &connection,
        &group_id,
        &topic,
        Duration::from_millis(config.consumer.poll_timeout_ms),
    )?;
    info!(%topic, %group_id, "consuming");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let settings = ConsumeSettings { limit: args.limit };
    let committed = consume(&mut source, &mut out, &settings).await?;
    info!(committed, "consumer finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file before anything else
    load_dotenv();

    let subscriber = build_subscriber().expect("failed to build subscriber");
    tracing::subscriber::set_global_default(subscriber).expect("failed to install subscriber");

    let args = Cli::parse();
    if let Err(error) = run(args).await {
        log_error!(*error, "consumer failed");
        std::process::exit(1);
    }
}
