use crate::{kafka::base::KafkaConnection, utils::o11y::logging::as_error};

use std::borrow::Cow;
use std::io::Write;
use std::time::Duration;

use rdkafka::{
    consumer::{BaseConsumer, CommitMode, Consumer},
    error::KafkaError,
    message::{BorrowedMessage, Message},
    Offset, TopicPartitionList,
};
use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("error from rdkafka")]
    Kafka(#[from] KafkaError),
    #[error("failed to write message")]
    Output(#[from] std::io::Error),
}

/// A message read from the broker, detached from the client that read it.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumedEvent {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Message timestamp in milliseconds, when the broker provides one.
    pub timestamp: Option<i64>,
    pub payload: Vec<u8>,
}

impl ConsumedEvent {
    /// The message value as text; invalid UTF-8 is replaced.
    pub fn value(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl From<&BorrowedMessage<'_>> for ConsumedEvent {
    fn from(message: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            timestamp: message.timestamp().to_millis(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }
}

/// Where the consumer reads its messages from and acknowledges them.
#[async_trait::async_trait]
pub trait EventSource {
    /// Wait until the next message is available.
    async fn next_event(&mut self) -> Result<ConsumedEvent, ConsumerError>;

    /// Commit the offset following `event`, marking it processed for the
    /// consumer group.
    fn commit(&mut self, event: &ConsumedEvent) -> Result<(), ConsumerError>;
}

/// [`EventSource`] backed by an rdkafka consumer subscribed to one topic as
/// a member of a consumer group.
pub struct KafkaEventSource {
    consumer: BaseConsumer,
    poll_timeout: Duration,
}

impl KafkaEventSource {
    #[instrument(skip(connection, poll_timeout))]
    pub fn new(
        connection: &KafkaConnection,
        group_id: &str,
        topic: &str,
        poll_timeout: Duration,
    ) -> Result<Self, ConsumerError> {
        let consumer: BaseConsumer = connection
            .client_config()
            .set("group.id", group_id)
            .set("client.id", format!("kafka-demo-consumer-{}", Uuid::new_v4()))
            .set("auto.offset.reset", "earliest")
            // offsets are committed explicitly after each printed message
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .create()
            .inspect_err(as_error!("failed to create consumer"))?;

        // the broker handles partition assignment for the group
        consumer
            .subscribe(&[topic])
            .inspect_err(as_error!("failed to subscribe to topic"))?;
        info!(broker = %connection.broker(), user = %connection.username(), "consumer subscribed");

        Ok(Self {
            consumer,
            poll_timeout,
        })
    }
}

#[async_trait::async_trait]
impl EventSource for KafkaEventSource {
    async fn next_event(&mut self) -> Result<ConsumedEvent, ConsumerError> {
        loop {
            if let Some(result) = self.consumer.poll(self.poll_timeout) {
                let message = result.inspect_err(as_error!("failed to receive message"))?;
                return Ok(ConsumedEvent::from(&message));
            }
            trace!("no message available, polling again");
            tokio::task::yield_now().await;
        }
    }

    fn commit(&mut self, event: &ConsumedEvent) -> Result<(), ConsumerError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &event.topic,
            event.partition,
            Offset::Offset(event.offset + 1),
        )?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .inspect_err(as_error!("failed to commit offset"))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConsumeSettings {
    /// Stop after this many messages; `None` consumes forever.
    pub limit: Option<u64>,
}

/// Read messages one at a time, write each value on its own line to `out`,
/// then commit its offset.
///
/// A message is committed only once its value was written and flushed. Any
/// read, write or commit error ends the loop. Returns the number of
/// committed messages.
#[instrument(skip_all, fields(limit = ?settings.limit))]
pub async fn consume<S, W>(
    source: &mut S,
    out: &mut W,
    settings: &ConsumeSettings,
) -> Result<u64, ConsumerError>
where
    S: EventSource + ?Sized,
    W: Write,
{
    let mut committed = 0u64;
    while settings.limit.map_or(true, |limit| committed < limit) {
        let event = source.next_event().await?;
        debug!(
            partition = event.partition,
            offset = event.offset,
            timestamp = ?event.timestamp,
            "message received"
        );
        writeln!(out, "{}", event.value())?;
        out.flush()?;
        source.commit(&event)?;
        committed += 1;
        trace!(offset = event.offset, "offset committed");
    }
    info!("consumed {} messages", committed);
    Ok(committed)
}
