use crate::{
    events::EventGenerator,
    kafka::{
        admin::{ensure_topic, AdminError, TopicAdmin, TopicSpec},
        base::KafkaConnection,
    },
    utils::o11y::logging::as_error,
};

use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rdkafka::{
    error::KafkaError,
    producer::{FutureProducer, FutureRecord, Producer},
};
use tracing::{debug, info, instrument, trace};

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("failed to bootstrap topic")]
    Admin(#[from] AdminError),
    #[error("error from rdkafka")]
    Kafka(#[from] KafkaError),
    #[error("failed to serialize event batch")]
    Serialize(#[from] serde_json::Error),
}

/// A message ready to be written to the broker.
#[derive(Clone, Debug, PartialEq)]
pub struct EventMessage {
    pub topic: String,
    pub partition: i32,
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Destination of the producer's messages.
#[async_trait::async_trait]
pub trait EventSink {
    /// Write one message, returning once the broker acknowledged it.
    async fn write(&self, message: &EventMessage) -> Result<(), ProducerError>;

    /// Wait for any queued messages to be delivered.
    fn flush(&self) -> Result<(), ProducerError> {
        Ok(())
    }
}

/// [`EventSink`] backed by an rdkafka producer.
pub struct KafkaEventSink {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaEventSink {
    pub fn new(connection: &KafkaConnection) -> Result<Self, ProducerError> {
        let timeout = connection.operation_timeout();
        let producer: FutureProducer = connection
            .client_config()
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("linger.ms", "5")
            .set("acks", "all")
            .create()
            .inspect_err(as_error!("failed to create producer"))?;
        info!(broker = %connection.broker(), user = %connection.username(), "producer connected");
        Ok(Self { producer, timeout })
    }
}

#[async_trait::async_trait]
impl EventSink for KafkaEventSink {
    async fn write(&self, message: &EventMessage) -> Result<(), ProducerError> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(&message.topic)
            .partition(message.partition)
            .payload(message.payload.as_slice())
            .timestamp(message.timestamp.timestamp_millis());
        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(error, _)| error)
            .inspect_err(as_error!("failed to deliver message"))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ProducerError> {
        self.producer.flush(self.timeout)?;
        Ok(())
    }
}

/// How the producer loop writes its messages.
#[derive(Clone)]
pub struct ProduceSettings {
    pub topic: String,
    pub partition: i32,
    /// Number of messages to write, 0 runs forever.
    pub message_count: u64,
    /// Pause after each write.
    pub interval: Duration,
    pub progress: Option<ProgressBar>,
}

impl ProduceSettings {
    pub fn new(topic: impl Into<String>, message_count: u64, interval: Duration) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            message_count,
            interval,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    fn is_done(&self, written: u64) -> bool {
        self.message_count > 0 && written >= self.message_count
    }
}

/// Progress bar for a producer run with a known number of messages.
pub fn progress_bar(
    total: u64,
    topic: &str,
) -> Result<ProgressBar, indicatif::style::TemplateError> {
    Ok(ProgressBar::new(total)
        .with_message(format!("Pushing events to {}", topic))
        .with_style(ProgressStyle::default_bar().template(
            "{spinner:.green} {msg} {wide_bar} [{elapsed_precise}] {human_pos}/{human_len} ({eta})",
        )?))
}

/// Write one batch of generated events per message until
/// `settings.message_count` messages are written, or forever when it is 0.
///
/// Returns the number of messages written. The first failed write ends the
/// loop with its error.
#[instrument(skip_all, fields(topic = %settings.topic, message_count = settings.message_count))]
pub async fn produce<S, R>(
    sink: &S,
    generator: &mut EventGenerator<R>,
    settings: &ProduceSettings,
) -> Result<u64, ProducerError>
where
    S: EventSink + ?Sized,
    R: Rng,
{
    let mut written = 0u64;
    let start = std::time::Instant::now();
    while !settings.is_done(written) {
        let batch = generator.next_batch()?;
        let message = EventMessage {
            topic: settings.topic.clone(),
            partition: settings.partition,
            payload: batch.payload.into_bytes(),
            timestamp: Utc::now(),
        };
        sink.write(&message).await?;
        written += 1;
        trace!(records = batch.records, written, "message written");
        if let Some(progress) = &settings.progress {
            progress.inc(1);
        }
        if written % 1000 == 0 {
            debug!("written {} messages since {:?}", written, start.elapsed());
        }
        tokio::time::sleep(settings.interval).await;
    }

    sink.flush()?;
    if let Some(progress) = &settings.progress {
        progress.finish();
    }
    info!(
        "Pushed {} messages to {} in {:?}",
        written,
        settings.topic,
        start.elapsed()
    );
    Ok(written)
}

/// Bootstrap the topic, then connect the sink and run the producer loop.
///
/// The write connection is only opened once the topic is known to exist, so
/// a failed bootstrap (authentication included) ends the run before any
/// other connection is made.
pub async fn run_producer<A, S, F, R>(
    admin: &A,
    connect: F,
    spec: &TopicSpec,
    generator: &mut EventGenerator<R>,
    settings: &ProduceSettings,
) -> Result<u64, ProducerError>
where
    A: TopicAdmin + ?Sized,
    S: EventSink,
    F: FnOnce() -> Result<S, ProducerError>,
    R: Rng,
{
    ensure_topic(admin, spec).await?;
    let sink = connect()?;
    produce(&sink, generator, settings).await
}
