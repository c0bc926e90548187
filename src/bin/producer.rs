use kafka_demo::{
    conf::{load_dotenv, AppConfig},
    events::EventGenerator,
    kafka::{
        producer::progress_bar, run_producer, Credentials, KafkaConnection, KafkaEventSink,
        KafkaTopicAdmin, ProduceSettings, TopicSpec,
    },
    log_error,
    utils::o11y::logging::build_subscriber,
};

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, instrument};

/// Ensure the topic exists, then write batches of synthetic events to it
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

    /// Topic to write to [default: demo-events]
    #[arg(long)]
    topic: Option<String>,

    /// Number of messages to write, 0 writes forever [default: 0]
    #[arg(long)]
    message_count: Option<u64>,

    /// Path to the configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show a progress bar when the message count is bounded
    #[arg(long)]
    verbose: bool,
}

#[instrument(skip_all, fields(broker = %args.broker))]
async fn run(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(args.config.as_deref())?;

    let topic = args.topic.unwrap_or_else(|| config.topic.name.clone());
    let message_count = args.message_count.unwrap_or(config.producer.message_count);
    let connection = KafkaConnection::new(
        args.broker,
        Credentials::new(args.user, args.password),
        &config.kafka,
    );
    let spec = TopicSpec::from_config(&config.topic).with_name(&topic);

    let progress = if args.verbose && message_count > 0 {
        Some(progress_bar(message_count, &topic)?)
    } else {
        None
    };
    let settings = ProduceSettings::new(
        topic,
        message_count,
        Duration::from_millis(config.producer.interval_ms),
    )
    .with_progress(progress);
    let mut generator = EventGenerator::from_config(rand::rng(), &config.producer);

    let admin = KafkaTopicAdmin::new(&connection)?;
    let written = run_producer(
        &admin,
        || KafkaEventSink::new(&connection),
        &spec,
        &mut generator,
        &settings,
    )
    .await?;
    info!(written, records = generator.counter(), "producer finished");
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
        log_error!(*error, "producer failed");
        std::process::exit(1);
    }
}
