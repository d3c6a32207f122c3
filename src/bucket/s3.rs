//! S3-compatible bucket (MinIO, AWS S3, ...)
//!
//! The SDK is async; [`S3Bucket`] owns a tokio runtime and blocks on each
//! request so it can implement the synchronous [`Bucket`] trait. Do not call
//! it from inside another tokio runtime.

use super::{copy_with_cancel, Bucket, Stats};
use crate::config::{S3Config, DEFAULT_REGION};
use crate::content_type::{detect_content_type, from_extension, OCTET_STREAM, SVG_SCAN_LEN};
use crate::context::{CancellationReason, CancellationToken};
use crate::{Error, Result};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::io::{Cursor, Read};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument};

/// A bucket backed by an S3-compatible object store
pub struct S3Bucket {
    client: Client,
    bucket_name: String,
    runtime: Runtime,
}

/// Map an SDK error, folding every "missing" flavour into [`Error::NotFound`]
fn remote_error<E>(err: SdkError<E, HttpResponse>, name: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status_404 = err
        .raw_response()
        .map(|resp| resp.status().as_u16() == 404)
        .unwrap_or(false);
    let code = err.as_service_error().and_then(|e| e.code());

    if status_404 || matches!(code, Some("NoSuchKey" | "NotFound")) {
        return Error::NotFound(name.to_string());
    }
    Error::Remote(DisplayErrorContext(&err).to_string())
}

/// Location constraint for bucket creation; `us-east-1` must not send one
fn bucket_configuration(region: &str) -> Option<CreateBucketConfiguration> {
    if region.is_empty() || region == DEFAULT_REGION {
        return None;
    }
    Some(
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build(),
    )
}

fn to_utc(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

impl S3Bucket {
    /// Connect to the service and create the bucket if it does not exist
    pub fn open(config: &S3Config) -> Result<Self> {
        let runtime =
            Runtime::new().map_err(|e| Error::Remote(format!("Failed to create runtime: {}", e)))?;

        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "bucketstore",
            ))
            .force_path_style(true)
            .build();

        let bucket = S3Bucket {
            client: Client::from_conf(sdk_config),
            bucket_name: config.bucket_name.clone(),
            runtime,
        };
        bucket.ensure_bucket(&config.region)?;
        Ok(bucket)
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    fn ensure_bucket(&self, region: &str) -> Result<()> {
        self.runtime.block_on(async {
            let head = self
                .client
                .head_bucket()
                .bucket(&self.bucket_name)
                .send()
                .await;

            match head {
                Ok(_) => Ok(()),
                Err(err) => match remote_error(err, &self.bucket_name) {
                    Error::NotFound(_) => {
                        info!(bucket = %self.bucket_name, region, "creating bucket");
                        self.client
                            .create_bucket()
                            .bucket(&self.bucket_name)
                            .set_create_bucket_configuration(bucket_configuration(region))
                            .send()
                            .await
                            .map_err(|e| remote_error(e, &self.bucket_name))?;
                        Ok(())
                    }
                    other => Err(other),
                },
            }
        })
    }

    /// Block on `fut`, giving up when the token's deadline passes
    fn run<T>(
        &self,
        token: &CancellationToken,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        token.check()?;
        match token.deadline() {
            Some(deadline) => self.runtime.block_on(async {
                tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), fut)
                    .await
                    .map_err(|_| Error::Cancelled(CancellationReason::DeadlineExceeded))?
            }),
            None => self.runtime.block_on(fut),
        }
    }
}

impl Bucket for S3Bucket {
    /// Buffers the whole object, then uploads it with a sniffed content type
    #[instrument(skip(self, token, reader), level = "debug")]
    fn put_object(
        &self,
        token: &CancellationToken,
        name: &str,
        reader: &mut dyn Read,
    ) -> Result<()> {
        let mut data = Vec::new();
        copy_with_cancel(token, reader, &mut data)?;
        let content_type = detect_content_type(name, &data[..data.len().min(SVG_SCAN_LEN)]);
        let size = data.len();

        self.run(token, async {
            self.client
                .put_object()
                .bucket(&self.bucket_name)
                .key(name)
                .content_type(content_type)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| remote_error(e, name))
        })?;

        debug!(name, bytes = size, "object uploaded");
        Ok(())
    }

    /// Downloads the whole object before returning
    #[instrument(skip(self, token), level = "debug")]
    fn get_object(&self, token: &CancellationToken, name: &str) -> Result<Box<dyn Read + Send>> {
        let body: Bytes = self.run(token, async {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket_name)
                .key(name)
                .send()
                .await
                .map_err(|e| remote_error(e, name))?;

            let collected = output
                .body
                .collect()
                .await
                .map_err(|e| Error::Remote(format!("Failed to read {}: {}", name, e)))?;
            Ok(collected.into_bytes())
        })?;

        Ok(Box::new(Cursor::new(body)))
    }

    #[instrument(skip(self, token), level = "debug")]
    fn stats(&self, token: &CancellationToken, name: &str) -> Result<Stats> {
        let head = self.run(token, async {
            self.client
                .head_object()
                .bucket(&self.bucket_name)
                .key(name)
                .send()
                .await
                .map_err(|e| remote_error(e, name))
        })?;

        let content_type = head
            .content_type()
            .filter(|ct| !ct.is_empty())
            .map(str::to_string)
            .or_else(|| from_extension(name))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let last_modified = head
            .last_modified()
            .and_then(to_utc)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(Stats {
            size: head.content_length().unwrap_or(0).max(0) as u64,
            content_type,
            last_modified,
        })
    }
}
