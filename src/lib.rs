//! Producer and consumer demo programs exchanging synthetic event batches
//! through a topic over SASL/SCRAM authenticated connections.
pub mod conf;
pub mod events;
pub mod kafka;
pub mod utils;
