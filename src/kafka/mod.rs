pub mod admin;
pub mod base;
pub mod consumer;
pub mod producer;

pub use admin::{ensure_topic, AdminError, KafkaTopicAdmin, TopicAdmin, TopicSpec, TopicStatus};
pub use base::{Credentials, KafkaConnection};
pub use consumer::{
    consume, ConsumeSettings, ConsumedEvent, ConsumerError, EventSource, KafkaEventSource,
};
pub use producer::{
    produce, run_producer, EventMessage, EventSink, KafkaEventSink, ProduceSettings,
    ProducerError,
};
