use crate::conf::{KafkaConfig, SecurityProtocol};

use std::fmt;
use std::time::Duration;

use rdkafka::config::ClientConfig;

/// SASL credentials for the broker.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to open an authenticated connection to the broker.
///
/// Admin, producer and consumer clients all start from the same
/// [`ClientConfig`] built by [`KafkaConnection::client_config`] and add their
/// own settings on top.
#[derive(Clone, Debug)]
pub struct KafkaConnection {
    broker: String,
    credentials: Credentials,
    security_protocol: SecurityProtocol,
    sasl_mechanism: String,
    ssl_ca_location: Option<String>,
    dial_timeout: Duration,
    operation_timeout: Duration,
    debug: Option<String>,
}

impl KafkaConnection {
    pub fn new(broker: impl Into<String>, credentials: Credentials, config: &KafkaConfig) -> Self {
        Self {
            broker: broker.into(),
            credentials,
            security_protocol: config.security_protocol,
            sasl_mechanism: config.sasl_mechanism.clone(),
            ssl_ca_location: config
                .ssl_ca_location
                .clone()
                .filter(|location| !location.is_empty()),
            dial_timeout: Duration::from_secs(config.dial_timeout_secs),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
            debug: config.debug.clone().filter(|debug| !debug.is_empty()),
        }
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Base client configuration: bootstrap servers, TLS and SASL settings,
    /// and the dial timeout. The dial timeout only bounds connection setup,
    /// reads and writes are not timed out by it.
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.broker)
            .set("security.protocol", self.security_protocol.as_str())
            .set("sasl.mechanisms", &self.sasl_mechanism)
            .set("sasl.username", &self.credentials.username)
            .set("sasl.password", &self.credentials.password)
            .set(
                "socket.connection.setup.timeout.ms",
                self.dial_timeout.as_millis().to_string(),
            );
        if let Some(location) = &self.ssl_ca_location {
            client_config.set("ssl.ca.location", location);
        }
        if let Some(debug) = &self.debug {
            client_config.set("debug", debug);
        }
        client_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(config: &KafkaConfig) -> KafkaConnection {
        KafkaConnection::new(
            "broker-1:9096,broker-2:9096",
            Credentials::new("demo", "s3cret"),
            config,
        )
    }

    #[test]
    fn client_config_uses_tls_and_scram() {
        let client_config = connection(&KafkaConfig::default()).client_config();
        assert_eq!(
            client_config.get("bootstrap.servers"),
            Some("broker-1:9096,broker-2:9096")
        );
        assert_eq!(client_config.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client_config.get("sasl.mechanisms"), Some("SCRAM-SHA-512"));
        assert_eq!(client_config.get("sasl.username"), Some("demo"));
        assert_eq!(client_config.get("sasl.password"), Some("s3cret"));
        assert_eq!(
            client_config.get("socket.connection.setup.timeout.ms"),
            Some("10000")
        );
        assert_eq!(client_config.get("ssl.ca.location"), None);
        assert_eq!(client_config.get("debug"), None);
    }

    #[test]
    fn client_config_optional_settings() {
        let config = KafkaConfig {
            security_protocol: SecurityProtocol::SaslPlaintext,
            ssl_ca_location: Some("/etc/ssl/ca.pem".to_string()),
            debug: Some("broker,topic".to_string()),
            dial_timeout_secs: 3,
            ..KafkaConfig::default()
        };
        let client_config = connection(&config).client_config();
        assert_eq!(client_config.get("security.protocol"), Some("SASL_PLAINTEXT"));
        assert_eq!(client_config.get("ssl.ca.location"), Some("/etc/ssl/ca.pem"));
        assert_eq!(client_config.get("debug"), Some("broker,topic"));
        assert_eq!(
            client_config.get("socket.connection.setup.timeout.ms"),
            Some("3000")
        );
    }

    #[test]
    fn empty_optional_settings_are_ignored() {
        let config = KafkaConfig {
            ssl_ca_location: Some(String::new()),
            debug: Some(String::new()),
            ..KafkaConfig::default()
        };
        let client_config = connection(&config).client_config();
        assert_eq!(client_config.get("ssl.ca.location"), None);
        assert_eq!(client_config.get("debug"), None);
    }

    #[test]
    fn password_is_redacted_from_debug_output() {
        let rendered = format!("{:?}", connection(&KafkaConfig::default()));
        assert!(rendered.contains("demo"));
        assert!(!rendered.contains("s3cret"));
    }
}
