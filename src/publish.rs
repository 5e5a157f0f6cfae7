//! Envelope publishers.
//!
//! Acquisition hands every envelope to a [`Publisher`]. Two are provided:
//! [`JsonLinesPublisher`] writes one JSON document per line (stdout by
//! default), [`HttpPublisher`] POSTs each envelope to a backend endpoint.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};

use crate::aggregator::SensorDataEnvelope;
use crate::config::ConnectorConfig;
use crate::error::{Error, Result};

/// Trait for envelope sinks.
pub trait Publisher: Send {
    /// Publishes one envelope.
    fn publish<'a>(
        &'a mut self,
        envelope: &'a SensorDataEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Writes envelopes as newline-delimited JSON.
#[derive(Debug)]
pub struct JsonLinesPublisher<W> {
    writer: W,
}

impl JsonLinesPublisher<Stdout> {
    /// Publisher writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesPublisher<W> {
    /// Creates a publisher over the given writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> Publisher for JsonLinesPublisher<W> {
    fn publish<'a>(
        &'a mut self,
        envelope: &'a SensorDataEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut line = envelope.to_json()?;
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await?;
            Ok(())
        })
    }
}

/// POSTs envelopes as JSON to a backend endpoint.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    http: Client,
    url: String,
}

impl HttpPublisher {
    /// Creates a publisher for the given endpoint.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Target endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Publisher for HttpPublisher {
    fn publish<'a>(
        &'a mut self,
        envelope: &'a SensorDataEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let response = self.http.post(&self.url).json(envelope).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Publish {
                    status: status.as_u16(),
                });
            }
            tracing::debug!("backend accepted envelope with status {}", status);
            Ok(())
        })
    }
}

/// Publisher selected by the configuration.
pub enum ConfiguredPublisher {
    /// Newline-delimited JSON on stdout.
    Stdout(JsonLinesPublisher<Stdout>),
    /// HTTP backend.
    Http(HttpPublisher),
}

impl ConfiguredPublisher {
    /// HTTP when `publish_url` is set, stdout otherwise.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        match &config.publish_url {
            Some(url) => {
                tracing::info!("publishing envelopes to {}", url);
                Ok(Self::Http(HttpPublisher::new(
                    url.clone(),
                    config.publish_timeout(),
                )?))
            }
            None => Ok(Self::Stdout(JsonLinesPublisher::stdout())),
        }
    }
}

impl Publisher for ConfiguredPublisher {
    fn publish<'a>(
        &'a mut self,
        envelope: &'a SensorDataEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        match self {
            Self::Stdout(publisher) => publisher.publish(envelope),
            Self::Http(publisher) => publisher.publish(envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{NodeRecord, RecordValue};
    use crate::types::Scalar;

    fn envelope(temperature: f64) -> SensorDataEnvelope {
        let mut record = NodeRecord::new();
        record.insert("Temperature".into(), RecordValue::Scalar(Scalar::Float(temperature)));
        record.insert("mac_id".into(), RecordValue::Text("00:86:00:02:00:64".into()));
        SensorDataEnvelope {
            sensor_data: record,
        }
    }

    #[tokio::test]
    async fn test_json_lines() {
        let mut publisher = JsonLinesPublisher::new(Vec::new());
        publisher.publish(&envelope(21.5)).await.unwrap();
        publisher.publish(&envelope(22.0)).await.unwrap();

        let output = String::from_utf8(publisher.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"sensor_data":{"Temperature":21.5,"mac_id":"00:86:00:02:00:64"}}"#
        );
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["sensor_data"]["Temperature"], 22.0);
    }

    #[test]
    fn test_configured_publisher_selection() {
        let config = ConnectorConfig::new("/dev/ttyACM0");
        assert!(matches!(
            ConfiguredPublisher::from_config(&config),
            Ok(ConfiguredPublisher::Stdout(_))
        ));

        let mut config = config;
        config.publish_url = Some("http://localhost:8000/api/sensor".into());
        match ConfiguredPublisher::from_config(&config) {
            Ok(ConfiguredPublisher::Http(http)) => {
                assert_eq!(http.url(), "http://localhost:8000/api/sensor");
            }
            _ => panic!("expected HTTP publisher"),
        }
    }

    #[tokio::test]
    async fn test_http_publish_unreachable_backend() {
        let mut publisher =
            HttpPublisher::new("http://127.0.0.1:9/sensor", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            publisher.publish(&envelope(20.0)).await,
            Err(Error::Http(_))
        ));
    }
}
