use crate::{conf::TopicConfig, kafka::base::KafkaConnection, utils::o11y::logging::as_error};

use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::{
    admin::{AdminClient, AdminOptions, NewTopic, TopicReplication},
    client::DefaultClientContext,
    error::{KafkaError, RDKafkaErrorCode},
};
use tracing::{debug, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("error from rdkafka")]
    Kafka(#[from] KafkaError),
    #[error("failed to create topic {topic}: {code}")]
    CreateTopic {
        topic: String,
        code: RDKafkaErrorCode,
    },
}

/// Topic layout and settings applied when the topic is created.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    pub settings: BTreeMap<String, String>,
}

impl TopicSpec {
    pub fn from_config(config: &TopicConfig) -> Self {
        let settings = BTreeMap::from([
            ("retention.ms".to_string(), config.retention_ms.to_string()),
            (
                "retention.bytes".to_string(),
                config.retention_bytes.to_string(),
            ),
        ]);
        Self {
            name: config.name.clone(),
            partitions: config.partitions,
            replication_factor: config.replication_factor,
            settings,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicStatus {
    Exists,
    Created,
}

/// The administrative operations needed to bootstrap a topic.
#[async_trait::async_trait]
pub trait TopicAdmin {
    async fn topic_exists(&self, name: &str) -> Result<bool, AdminError>;

    /// Create the topic. A topic created concurrently by someone else is
    /// reported as `TopicStatus::Exists`.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicStatus, AdminError>;
}

/// Make sure the topic exists, creating it from `spec` when it doesn't.
/// Existing topics are left untouched, their settings are not reconciled.
#[instrument(skip_all, fields(topic = %spec.name))]
pub async fn ensure_topic<A>(admin: &A, spec: &TopicSpec) -> Result<TopicStatus, AdminError>
where
    A: TopicAdmin + ?Sized,
{
    if admin.topic_exists(&spec.name).await? {
        info!("topic {} already exists", spec.name);
        return Ok(TopicStatus::Exists);
    }
    info!(
        partitions = spec.partitions,
        replication_factor = spec.replication_factor,
        settings = ?spec.settings,
        "creating topic {}",
        spec.name
    );
    let status = admin.create_topic(spec).await?;
    match status {
        TopicStatus::Created => info!("topic {} created", spec.name),
        TopicStatus::Exists => info!("topic {} was created concurrently", spec.name),
    }
    Ok(status)
}

/// [`TopicAdmin`] backed by an rdkafka admin client.
pub struct KafkaTopicAdmin {
    client: AdminClient<DefaultClientContext>,
    timeout: Duration,
}

impl KafkaTopicAdmin {
    pub fn new(connection: &KafkaConnection) -> Result<Self, AdminError> {
        let client: AdminClient<DefaultClientContext> = connection
            .client_config()
            .create()
            .inspect_err(as_error!("failed to create admin client"))?;
        Ok(Self {
            client,
            timeout: connection.operation_timeout(),
        })
    }
}

#[async_trait::async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    // Metadata is fetched for all topics: asking for a single unknown topic
    // can make brokers with auto-creation enabled create it.
    async fn topic_exists(&self, name: &str) -> Result<bool, AdminError> {
        let metadata = self
            .client
            .inner()
            .fetch_metadata(None, self.timeout)
            .inspect_err(as_error!("failed to fetch cluster metadata"))?;
        let exists = metadata
            .topics()
            .iter()
            .any(|topic| topic.name() == name && topic.error().is_none());
        debug!(topic = %name, exists, "topic lookup");
        Ok(exists)
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicStatus, AdminError> {
        let new_topic = spec.settings.iter().fold(
            NewTopic::new(
                &spec.name,
                spec.partitions,
                TopicReplication::Fixed(spec.replication_factor),
            ),
            |new_topic, (key, value)| new_topic.set(key, value),
        );
        let opts = AdminOptions::new().operation_timeout(Some(self.timeout));
        let results = self
            .client
            .create_topics(&[new_topic], &opts)
            .await
            .inspect_err(as_error!("failed to create topic"))?;

        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => return Ok(TopicStatus::Exists),
                Err((topic, code)) => return Err(AdminError::CreateTopic { topic, code }),
            }
        }
        Ok(TopicStatus::Created)
    }
}
