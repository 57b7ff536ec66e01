//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// AWS error categories driving the engine's failure taxonomy
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// Resource was not found (nothing to act on)
    #[error("Resource not found: {resource_type} '{resource_id}'")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Resource is still referenced by another resource
    #[error("Resource in use: {message}")]
    InUse { message: String },

    /// Optimistic-concurrency token (ETag) no longer matches
    #[error("Concurrency token is stale: {message}")]
    ConcurrencyConflict { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Caller lacks permission for the operation
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(self, AwsError::Throttled)
    }

    /// Check if this is a stale concurrency token
    pub fn is_conflict(&self) -> bool {
        matches!(self, AwsError::ConcurrencyConflict { .. })
    }

    /// Check if the resource is still in use
    pub fn is_in_use(&self) -> bool {
        matches!(self, AwsError::InUse { .. })
    }

    /// Short label for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            AwsError::NotFound { .. } => "not_found",
            AwsError::InUse { .. } => "in_use",
            AwsError::ConcurrencyConflict { .. } => "conflict",
            AwsError::Throttled => "throttled",
            AwsError::AccessDenied { .. } => "access_denied",
            AwsError::Sdk { .. } => "sdk",
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "NotFoundException",
    "NoSuchDistribution",
    "NoSuchCloudFrontOriginAccessIdentity",
    "NoSuchHostedZone",
    "NoSuchBucket",
    "NotFound",
];

/// Known AWS error codes for resources that are still referenced
const IN_USE_CODES: &[&str] = &[
    "ResourceInUseException",
    "DistributionNotDisabled",
    "CloudFrontOriginAccessIdentityInUse",
];

/// Known AWS error codes for stale ETags
const CONFLICT_CODES: &[&str] = &["PreconditionFailed", "InvalidIfMatchVersion"];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "PriorRequestNotComplete",
];

/// Known AWS error codes for missing permissions
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedException",
    "UnauthorizedOperation",
    "NotAuthorizedException",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            resource_type: "resource",
            resource_id: message,
        },
        // CloudFormation reports a missing stack as a validation error
        Some("ValidationError") if message.contains("does not exist") => AwsError::NotFound {
            resource_type: "stack",
            resource_id: message,
        },
        // Route 53 rejects deleting a record that is already gone
        Some("InvalidChangeBatch") if message.contains("not found") => AwsError::NotFound {
            resource_type: "record",
            resource_id: message,
        },
        Some(c) if IN_USE_CODES.contains(&c) => AwsError::InUse { message },
        Some(c) if CONFLICT_CODES.contains(&c) => AwsError::ConcurrencyConflict { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Convert any SDK error into a classified `anyhow::Error`.
///
/// Errors without service metadata (timeouts, dispatch failures) keep their
/// full display chain as the message.
pub fn sdk_error<E>(err: E) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = match err.message() {
        Some(m) => m.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    anyhow::Error::new(classify_aws_error(err.code(), Some(&message)))
}

/// Classify an error from an anyhow::Error.
///
/// Walks the error chain for an `AwsError` produced by [`sdk_error`]. Falls
/// back to extracting a known code from the Debug representation.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<AwsError>() {
            return e.clone();
        }
    }

    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&debug_str));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Turn a "not found" error into `Ok(None)`.
pub fn ignore_not_found<T>(result: anyhow::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if classify_anyhow_error(&e).is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Run an AWS call, retrying with exponential backoff while it is throttled.
pub async fn retry_throttled<T, F, Fut>(operation: &str, call: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    call.retry(
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(20))
            .with_max_times(4),
    )
    .when(|e| classify_anyhow_error(e).is_retryable())
    .notify(|e, dur| {
        warn!(
            operation,
            delay = ?dur,
            error = %e,
            "AWS call throttled, retrying..."
        );
    })
    .await
}

/// All known AWS error codes for extraction from debug strings (flat list)
const ALL_KNOWN_CODES: &[&str] = &[
    // Not found
    "ResourceNotFoundException",
    "NotFoundException",
    "NoSuchDistribution",
    "NoSuchCloudFrontOriginAccessIdentity",
    "NoSuchHostedZone",
    "NoSuchBucket",
    // In use
    "ResourceInUseException",
    "DistributionNotDisabled",
    "CloudFrontOriginAccessIdentityInUse",
    // Conflict
    "PreconditionFailed",
    "InvalidIfMatchVersion",
    // Throttling
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "PriorRequestNotComplete",
    "Throttling",
    // Access
    "AccessDeniedException",
    "UnauthorizedOperation",
    "NotAuthorizedException",
    "AccessDenied",
];

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    for code in ALL_KNOWN_CODES {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn missing_stack_is_not_found() {
        let err = classify_aws_error(
            Some("ValidationError"),
            Some("Stack with id kernelworx-ue1-dev does not exist"),
        );
        assert!(err.is_not_found());

        let other = classify_aws_error(Some("ValidationError"), Some("Template format error"));
        assert!(matches!(other, AwsError::Sdk { .. }));
    }

    #[test]
    fn missing_record_is_not_found() {
        let err = classify_aws_error(
            Some("InvalidChangeBatch"),
            Some("Tried to delete resource record set but it was not found"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn conflict_and_in_use_codes() {
        for code in CONFLICT_CODES {
            assert!(classify_aws_error(Some(code), None).is_conflict());
        }
        for code in IN_USE_CODES {
            assert!(classify_aws_error(Some(code), None).is_in_use());
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
        }
        assert!(!classify_aws_error(Some("AccessDenied"), None).is_retryable());
    }

    #[test]
    fn access_denied_codes() {
        for code in ACCESS_DENIED_CODES {
            let err = classify_aws_error(Some(code), Some("no"));
            assert!(matches!(err, AwsError::AccessDenied { .. }));
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn classifies_through_context() {
        let err = anyhow::Error::new(AwsError::Throttled).context("Failed to list certificates");
        assert!(classify_anyhow_error(&err).is_retryable());
    }

    #[test]
    fn classifies_from_debug_string() {
        let err = anyhow::anyhow!("service error: NoSuchDistribution");
        assert!(classify_anyhow_error(&err).is_not_found());
    }

    #[test]
    fn extract_code_from_code_field() {
        let debug_str = r#"SdkError { code: Some("SomeRandomCode"), message: "fail" }"#;
        assert_eq!(
            extract_error_code(debug_str).as_deref(),
            Some("SomeRandomCode")
        );
    }

    #[test]
    fn extract_none_from_unrelated_string() {
        assert!(extract_error_code("connection refused").is_none());
    }

    #[test]
    fn ignore_not_found_maps_to_none() {
        let missing: anyhow::Result<u8> = Err(anyhow::Error::new(AwsError::NotFound {
            resource_type: "table",
            resource_id: "t".to_string(),
        }));
        assert!(matches!(ignore_not_found(missing), Ok(None)));

        let denied: anyhow::Result<u8> = Err(anyhow::Error::new(AwsError::AccessDenied {
            message: "no".to_string(),
        }));
        assert!(ignore_not_found(denied).is_err());
    }

    #[tokio::test]
    async fn retry_throttled_gives_up_on_other_errors() {
        let mut calls = 0;
        let result: anyhow::Result<()> = retry_throttled("test", || {
            calls += 1;
            async { Err(anyhow::Error::new(AwsError::InUse { message: "busy".to_string() })) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
