//! ACM certificate operations

use super::context::{AwsContext, FromAwsContext};
use super::error::{ignore_not_found, retry_throttled, sdk_error};
use super::models::{CertificateDetail, CertificateSummary};
use super::tags::extract_tags;
use anyhow::{Context, Result};
use aws_sdk_acm::Client;
use aws_sdk_acm::types::{Filters, KeyAlgorithm};
use chrono::DateTime;
use std::collections::HashMap;
use std::future::Future;
use tracing::debug;

/// Certificate operations the engine needs.
pub trait CertificateOperations: Send + Sync {
    /// List every certificate in the certificate region
    fn list_certificates(&self) -> impl Future<Output = Result<Vec<CertificateSummary>>> + Send;

    /// Describe one certificate, `None` if it no longer exists
    fn describe_certificate(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<Option<CertificateDetail>>> + Send;

    fn certificate_tags(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send;

    /// Delete a certificate (succeeds if it is already gone)
    fn delete_certificate(&self, arn: &str) -> impl Future<Output = Result<()>> + Send;
}

/// ACM client for certificate discovery and deletion
pub struct AcmClient {
    client: Client,
}

impl FromAwsContext for AcmClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.acm_client(),
        }
    }
}

/// ACM only lists RSA-2048 certificates unless asked for other key types
fn listed_key_types() -> Vec<KeyAlgorithm> {
    vec![
        KeyAlgorithm::Rsa2048,
        KeyAlgorithm::Rsa3072,
        KeyAlgorithm::Rsa4096,
        KeyAlgorithm::EcPrime256v1,
        KeyAlgorithm::EcSecp384r1,
    ]
}

impl CertificateOperations for AcmClient {
    async fn list_certificates(&self) -> Result<Vec<CertificateSummary>> {
        let mut certificates = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_certificates()
                .includes(
                    Filters::builder()
                        .set_key_types(Some(listed_key_types()))
                        .build(),
                )
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
                .context("Failed to list certificates")?;

            for summary in response.certificate_summary_list() {
                if let (Some(arn), Some(domain_name)) =
                    (summary.certificate_arn(), summary.domain_name())
                {
                    certificates.push(CertificateSummary {
                        arn: arn.to_string(),
                        domain_name: domain_name.to_string(),
                    });
                }
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(count = certificates.len(), "Listed certificates");
        Ok(certificates)
    }

    async fn describe_certificate(&self, arn: &str) -> Result<Option<CertificateDetail>> {
        let result = retry_throttled("acm:DescribeCertificate", || async move {
            self.client
                .describe_certificate()
                .certificate_arn(arn)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        let Some(response) = ignore_not_found(result).context("Failed to describe certificate")?
        else {
            return Ok(None);
        };
        let Some(detail) = response.certificate() else {
            return Ok(None);
        };

        Ok(Some(CertificateDetail {
            arn: detail.certificate_arn().unwrap_or(arn).to_string(),
            domain_name: detail.domain_name().unwrap_or_default().to_string(),
            subject_alternative_names: detail.subject_alternative_names().to_vec(),
            in_use_by: detail.in_use_by().to_vec(),
            validation_records: detail
                .domain_validation_options()
                .iter()
                .filter_map(|option| option.resource_record())
                .map(|record| record.name().to_string())
                .collect(),
            created_at: detail
                .created_at()
                .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
        }))
    }

    async fn certificate_tags(&self, arn: &str) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .list_tags_for_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(sdk_error)
            .context("Failed to list certificate tags")?;

        Ok(extract_tags(response.tags(), |t| Some(t.key()), |t| t.value()))
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        let result = retry_throttled("acm:DeleteCertificate", || async move {
            self.client
                .delete_certificate()
                .certificate_arn(arn)
                .send()
                .await
                .map_err(sdk_error)
        })
        .await;

        match ignore_not_found(result).context("Failed to delete certificate")? {
            Some(_) => debug!(certificate = %arn, "Certificate deleted"),
            None => debug!(certificate = %arn, "Certificate already deleted"),
        }
        Ok(())
    }
}
