use super::sdk_errors::{extract_error_code, truncate_message, ErrorCategory};
use serde::Serialize;
use thiserror::Error;

/// A failed facade call: network, auth, throttling or an unreadable response
#[derive(Debug, Clone, Error, Serialize)]
#[error("{service} {operation} failed ({category}): {message}")]
pub struct ProviderError {
    pub service: String,
    pub operation: String,
    pub category: ErrorCategory,
    /// AWS error code such as `AccessDeniedException`, when one could be found
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        service: &str,
        operation: &str,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.to_string(),
            operation: operation.to_string(),
            category,
            code: None,
            message: message.into(),
        }
    }

    /// Wrap an SDK-level error, categorizing it from its rendering
    pub fn from_sdk(service: &str, operation: &str, error: &anyhow::Error) -> Self {
        let root = error.root_cause();
        Self {
            code: extract_error_code(&format!("{:?}", root))
                .or_else(|| extract_error_code(&root.to_string())),
            ..Self::new(
                service,
                operation,
                ErrorCategory::from_error(error),
                truncate_message(&format!("{:#}", error), 300),
            )
        }
    }

    /// The provider answered, but with something that could not be decoded
    pub fn malformed(service: &str, operation: &str, message: impl Into<String>) -> Self {
        Self::new(service, operation, ErrorCategory::Malformed, message)
    }
}

/// The enrichment step a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStep {
    ExecutionRole,
    AccessPolicy,
    EnvironmentVariables,
}

impl std::fmt::Display for EnrichmentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EnrichmentStep::ExecutionRole => "execution role",
            EnrichmentStep::AccessPolicy => "access policy",
            EnrichmentStep::EnvironmentVariables => "environment variables",
        })
    }
}

/// Non-fatal problem with a single function; the record is kept with defaults
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentError {
    #[error("function {function}: role reference {role_arn:?} has no usable role name")]
    MalformedRoleReference { function: String, role_arn: String },

    #[error("function {function}: {step} enrichment failed: {source}")]
    StepFailed {
        function: String,
        step: EnrichmentStep,
        #[source]
        source: ProviderError,
    },

    #[error("raw record #{index} skipped: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

impl EnrichmentError {
    pub fn function(&self) -> Option<&str> {
        match self {
            EnrichmentError::MalformedRoleReference { function, .. }
            | EnrichmentError::StepFailed { function, .. } => Some(function),
            EnrichmentError::InvalidRecord { .. } => None,
        }
    }

    /// True when a retry could fill the degraded field
    pub fn is_transient(&self) -> bool {
        match self {
            EnrichmentError::StepFailed { source, .. } => source.category.is_transient(),
            EnrichmentError::MalformedRoleReference { .. }
            | EnrichmentError::InvalidRecord { .. } => false,
        }
    }

    pub fn step(&self) -> Option<EnrichmentStep> {
        match self {
            EnrichmentError::MalformedRoleReference { .. } => Some(EnrichmentStep::ExecutionRole),
            EnrichmentError::StepFailed { step, .. } => Some(*step),
            EnrichmentError::InvalidRecord { .. } => None,
        }
    }
}

/// Failure of a whole `fetch_all` call; nothing is returned for the region
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("cannot list functions: {0}")]
    Provider(#[from] ProviderError),

    #[error("invalid region {0:?}")]
    InvalidRegion(String),

    #[error("collection for region {region} was cancelled")]
    Cancelled { region: String },
}
