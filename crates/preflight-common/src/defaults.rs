//! Default configuration values shared by the engine and its CLI

/// Default application prefix for resource names
pub const DEFAULT_APP_NAME: &str = "kernelworx";

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Region where CloudFront-attached certificates must live
pub const CERTIFICATE_REGION: &str = "us-east-1";

/// Default location of the generated import manifest
pub const DEFAULT_MANIFEST_PATH: &str = "cdk.out/import-existing-resources.json";

/// Environment whose site is served from the bare base domain
pub const PRODUCTION_ENVIRONMENT: &str = "prod";

/// Default overall timeout in seconds for a distribution teardown
pub const DEFAULT_TEARDOWN_TIMEOUT_SECS: u64 = 1800;

/// Attempts per distribution write: the first try plus one retry after a
/// stale ETag
pub const DEFAULT_TEARDOWN_ATTEMPTS: u32 = 2;

/// Marker present in every ACM DNS validation record value
pub const VALIDATION_RECORD_MARKER: &str = "acm-validations.aws";
