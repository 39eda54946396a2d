//! Service error types.

use statechart_core::CoreError;
use thiserror::Error;

/// Errors at the service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("chart not found: {chart}")]
    ChartNotFound { chart: String },

    #[error("instance not found: {instance}")]
    InstanceNotFound { instance: String },

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl ServiceError {
    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::ChartNotFound { .. } => "CHART_NOT_FOUND",
            ServiceError::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
            ServiceError::Core(error) => error.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let not_found = ServiceError::ChartNotFound {
            chart: "Order".to_string(),
        };
        assert_eq!(not_found.error_code(), "CHART_NOT_FOUND");

        let wrapped = ServiceError::from(CoreError::StabilizationOverflow { limit: 32 });
        assert_eq!(wrapped.error_code(), "STABILIZATION_OVERFLOW");
    }
}
