//! S3 bucket lookups

use super::context::{AwsContext, FromAwsContext};
use super::error::{AwsError, classify_anyhow_error, sdk_error};
use super::tags::extract_tags;
use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use std::collections::HashMap;
use std::future::Future;

pub trait BucketOperations: Send + Sync {
    fn bucket_exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;

    fn bucket_tags(&self, name: &str)
    -> impl Future<Output = Result<HashMap<String, String>>> + Send;
}

pub struct S3Client {
    client: Client,
}

impl FromAwsContext for S3Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
        }
    }
}

impl BucketOperations for S3Client {
    async fn bucket_exists(&self, name: &str) -> Result<bool> {
        match self
            .client
            .head_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(sdk_error)
        {
            Ok(_) => Ok(true),
            Err(e) if classify_anyhow_error(&e).is_not_found() => Ok(false),
            Err(e) => Err(e.context(format!("Failed to check bucket {name}"))),
        }
    }

    async fn bucket_tags(&self, name: &str) -> Result<HashMap<String, String>> {
        match self
            .client
            .get_bucket_tagging()
            .bucket(name)
            .send()
            .await
            .map_err(sdk_error)
        {
            Ok(response) => Ok(extract_tags(
                response.tag_set(),
                |t| Some(t.key()),
                |t| Some(t.value()),
            )),
            // Untagged buckets answer with an error instead of an empty set
            Err(e)
                if matches!(
                    classify_anyhow_error(&e),
                    AwsError::Sdk { code: Some(ref c), .. } if c == "NoSuchTagSet"
                ) =>
            {
                Ok(HashMap::new())
            }
            Err(e) => Err(e).context("Failed to get bucket tags"),
        }
    }
}
