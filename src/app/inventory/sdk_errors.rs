//! Classification of AWS SDK failures.
//!
//! The SDK retries transient failures on its own. By the time an error reaches
//! the facade it is final, so the category only feeds diagnostics: it tells the
//! operator whether a region was throttled, unreachable or simply not permitted.

use serde::Serialize;

const THROTTLING_MARKERS: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "RateExceeded",
];

const TIMEOUT_MARKERS: &[&str] = &["TimeoutError", "timeout", "timed out", "deadline exceeded"];

const NETWORK_MARKERS: &[&str] = &[
    "DispatchFailure",
    "connection",
    "Connection",
    "network",
    "DNS",
    "socket",
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "ServiceUnavailable",
    "ServiceException",
    "InternalServerError",
    "InternalFailure",
    "Service Unavailable",
];

const PERMISSION_MARKERS: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthFailure",
    "InvalidClientTokenId",
    "ExpiredToken",
    "SignatureDoesNotMatch",
];

/// Coarse category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Throttled,
    Timeout,
    Network,
    ServiceUnavailable,
    PermissionDenied,
    Malformed,
    Other,
}

impl ErrorCategory {
    /// Categorize an error from its rendered message
    pub fn from_message(message: &str) -> Self {
        let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

        if contains_any(THROTTLING_MARKERS) {
            ErrorCategory::Throttled
        } else if contains_any(PERMISSION_MARKERS) {
            ErrorCategory::PermissionDenied
        } else if contains_any(TIMEOUT_MARKERS) {
            ErrorCategory::Timeout
        } else if contains_any(NETWORK_MARKERS) {
            ErrorCategory::Network
        } else if contains_any(UNAVAILABLE_MARKERS) {
            ErrorCategory::ServiceUnavailable
        } else {
            ErrorCategory::Other
        }
    }

    /// Categorize an `anyhow` error chain, using the debug rendering for SDK service errors
    pub fn from_error(error: &anyhow::Error) -> Self {
        let rendered = format!("{:#}", error);
        if rendered.contains("service error") {
            Self::from_message(&format!("{:?}", error))
        } else {
            Self::from_message(&rendered)
        }
    }

    /// Whether the SDK would have treated this as transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Throttled
                | ErrorCategory::Timeout
                | ErrorCategory::Network
                | ErrorCategory::ServiceUnavailable
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Throttled => "throttled",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::ServiceUnavailable => "unavailable",
            ErrorCategory::PermissionDenied => "access denied",
            ErrorCategory::Malformed => "malformed response",
            ErrorCategory::Other => "error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Extract the AWS error code from messages such as `AccessDeniedException: ...`
/// or debug output containing `code: Some("ValidationException")`
pub fn extract_error_code(message: &str) -> Option<String> {
    if let Some(start) = message.find("code: Some(\"") {
        let rest = &message[start + "code: Some(\"".len()..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string()).filter(|code| !code.is_empty());
        }
    }

    let prefix = message.split(':').next()?.trim();
    let code = prefix.rsplit("::").next().unwrap_or(prefix);
    let looks_like_code = code.len() < 50
        && !code.contains(' ')
        && code.chars().next().is_some_and(|c| c.is_ascii_uppercase());

    looks_like_code.then(|| code.to_string())
}

/// Cap a message at `max_len` bytes on a char boundary
pub fn truncate_message(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}
