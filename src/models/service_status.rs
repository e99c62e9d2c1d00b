//! Health status models reported by the health endpoint.

use serde::{Deserialize, Serialize};

/// Status of a single checked service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "Error",
        }
    }
}

/// Aggregate status across all checked services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    /// Every service reported OK.
    #[serde(rename = "OK")]
    Ok,
    /// At least one service reported an error.
    Degraded,
    /// The database round trip itself failed.
    Error,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Degraded => "Degraded",
            Self::Error => "Error",
        }
    }
}

/// Result of probing one service. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub service: String,
    pub status: ServiceState,
    pub details: String,
}

impl HealthStatus {
    pub fn ok(service: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: ServiceState::Ok,
            details: details.into(),
        }
    }

    pub fn error(service: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: ServiceState::Error,
            details: details.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ServiceState::Ok
    }
}

/// Folded health of every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub services: Vec<HealthStatus>,
}

impl HealthReport {
    /// Fold individual statuses: OK only when every service is OK.
    pub fn from_statuses(services: Vec<HealthStatus>) -> Self {
        let status = if services.iter().all(HealthStatus::is_ok) {
            OverallStatus::Ok
        } else {
            OverallStatus::Degraded
        };
        Self { status, services }
    }

    /// Report for a failed database round trip. Carries only that entry.
    pub fn database_failure(details: impl Into<String>) -> Self {
        Self {
            status: OverallStatus::Error,
            services: vec![HealthStatus::error("Database", details)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_all_ok() {
        let report = HealthReport::from_statuses(vec![
            HealthStatus::ok("API", "Service is running"),
            HealthStatus::ok("Database", "up"),
        ]);
        assert_eq!(report.status, OverallStatus::Ok);
    }

    #[test]
    fn test_fold_one_error_is_degraded() {
        let report = HealthReport::from_statuses(vec![
            HealthStatus::ok("API", "Service is running"),
            HealthStatus::error("Message Broker", "refused"),
        ]);
        assert_eq!(report.status, OverallStatus::Degraded);
        assert_eq!(report.services.len(), 2);
    }

    #[test]
    fn test_serialized_shape() {
        let report = HealthReport::database_failure("connection refused");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "Error");
        assert_eq!(json["services"][0]["service"], "Database");
        assert_eq!(json["services"][0]["status"], "Error");
        assert_eq!(json["services"][0]["details"], "connection refused");

        let ok = serde_json::to_value(HealthStatus::ok("API", "Service is running")).unwrap();
        assert_eq!(ok["status"], "OK");
    }
}
