//! Health aggregation over the broker, the OCR engine and the database.
//!
//! Checks never fail: anything that goes wrong inside one is reported as an
//! `Error` entry for that service. Only the database round trip can take the
//! whole report down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::Settings;
use crate::models::{HealthReport, HealthStatus};
use crate::ocr::TextExtractor;
use crate::repository::DocumentStore;

/// A single external dependency check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Check the service. Failures are folded into the returned status.
    async fn check(&self) -> HealthStatus;
}

/// Checks that the message broker accepts connections.
pub struct BrokerCheck {
    url: String,
    timeout: Duration,
}

impl BrokerCheck {
    pub const SERVICE: &'static str = "Message Broker";

    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    fn address(&self) -> Result<(String, u16), String> {
        let parsed = Url::parse(&self.url).map_err(|e| format!("invalid broker URL: {}", e))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| "broker URL has no host".to_string())?
            .to_string();
        let port = parsed.port().unwrap_or(match parsed.scheme() {
            "amqps" => 5671,
            _ => 5672,
        });
        Ok((host, port))
    }

    #[cfg(not(feature = "amqp-broker"))]
    async fn connect(&self) -> Result<(), String> {
        let (host, port) = self.address()?;
        tokio::net::TcpStream::connect((host.as_str(), port))
            .await
            .map(drop)
            .map_err(|e| e.to_string())
    }

    #[cfg(feature = "amqp-broker")]
    async fn connect(&self) -> Result<(), String> {
        use lapin::{Connection, ConnectionProperties};

        self.address()?;
        let conn = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| e.to_string())?;
        conn.close(200, "health check")
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl HealthCheck for BrokerCheck {
    async fn check(&self) -> HealthStatus {
        let result = match tokio::time::timeout(self.timeout, self.connect()).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        };

        match result {
            Ok(()) => HealthStatus::ok(Self::SERVICE, "Broker connection is active"),
            Err(e) => {
                tracing::warn!("Broker check failed: {}", e);
                HealthStatus::error(Self::SERVICE, format!("Broker connection failed: {}", e))
            }
        }
    }
}

/// Checks that the OCR engine can report its version.
pub struct OcrEngineCheck {
    extractor: Arc<dyn TextExtractor>,
    timeout: Duration,
}

impl OcrEngineCheck {
    pub const SERVICE: &'static str = "OCR Engine";

    pub fn new(extractor: Arc<dyn TextExtractor>, timeout: Duration) -> Self {
        Self { extractor, timeout }
    }
}

#[async_trait]
impl HealthCheck for OcrEngineCheck {
    async fn check(&self) -> HealthStatus {
        let extractor = self.extractor.clone();
        let task = tokio::task::spawn_blocking(move || extractor.version());

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(version))) => Ok(version),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(join)) => Err(join.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        };

        match result {
            Ok(version) => {
                HealthStatus::ok(Self::SERVICE, format!("Tesseract {} is available", version))
            }
            Err(e) => {
                tracing::warn!("OCR engine check failed: {}", e);
                HealthStatus::error(Self::SERVICE, format!("Tesseract check failed: {}", e))
            }
        }
    }
}

/// Folds the API, external checks and the database into one report.
pub struct HealthAggregator {
    checks: Vec<Arc<dyn HealthCheck>>,
    store: Arc<dyn DocumentStore>,
}

impl HealthAggregator {
    pub fn new(checks: Vec<Arc<dyn HealthCheck>>, store: Arc<dyn DocumentStore>) -> Self {
        Self { checks, store }
    }

    /// Broker and OCR checks configured from `settings`.
    pub fn from_settings(
        settings: &Settings,
        extractor: Arc<dyn TextExtractor>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(BrokerCheck::new(
                settings.broker_url.clone(),
                settings.check_timeout(),
            )),
            Arc::new(OcrEngineCheck::new(extractor, settings.check_timeout())),
        ];
        Self::new(checks, store)
    }

    pub async fn get_overall_status(&self) -> HealthReport {
        let mut services = vec![HealthStatus::ok("API", "Service is running")];

        for check in &self.checks {
            services.push(check.check().await);
        }

        if let Err(e) = self.store.ping().await {
            tracing::warn!("Database health check failed: {}", e);
            return HealthReport::database_failure(format!("Database connection failed: {}", e));
        }
        services.push(HealthStatus::ok("Database", "Database connection is active"));

        HealthReport::from_statuses(services)
    }
}
