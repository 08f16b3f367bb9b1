//! S3 implementation of [`ObjectClient`].

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::io::Error as IoError;
use std::time::Duration;

use super::client::{ClientResult, ListPage, ObjectClient, ObjectData, ObjectMeta};

/// Object client for one S3 bucket.
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Wrap an existing SDK client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the environment's AWS configuration.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config), bucket)
    }
}

/// Bytes escaped in `x-amz-copy-source`: everything but unreserved
/// characters and the `/` between key segments.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE))
}

/// `DeleteObjects` answers 200 even when individual keys fail; those are
/// listed in `Errors`.
fn delete_failures(output: &DeleteObjectsOutput) -> ClientResult<()> {
    let failed: Vec<String> = output
        .errors()
        .iter()
        .map(|err| {
            format!(
                "{} ({})",
                err.key().unwrap_or("<unknown key>"),
                err.code().unwrap_or("UnknownError")
            )
        })
        .collect();
    if failed.is_empty() {
        return Ok(());
    }
    Err(IoError::other(format!(
        "failed to delete {} object(s): {}",
        failed.len(),
        failed.join(", ")
    ))
    .into())
}

fn to_chrono(value: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn head(&self, key: &str) -> ClientResult<Option<ObjectMeta>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match result {
            Ok(output) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                content_type: output.content_type().map(str::to_string),
                last_modified: to_chrono(output.last_modified()),
            })),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn get(&self, key: &str) -> ClientResult<Option<ObjectData>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(err.into());
            }
        };
        let meta = ObjectMeta {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            last_modified: to_chrono(output.last_modified()),
        };
        let body = output.body.collect().await?.into_bytes().to_vec();
        Ok(Some(ObjectData { meta, body }))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> ClientResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str) -> ClientResult<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(&self.bucket, source))
            .bucket(&self.bucket)
            .key(destination)
            .send()
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> ClientResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> ClientResult<()> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()?;
        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await?;
        delete_failures(&output)
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        max_keys: Option<usize>,
    ) -> ClientResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .set_max_keys(max_keys.map(|max| max.min(i32::MAX as usize) as i32))
            .send()
            .await?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectMeta {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    content_type: None,
                    last_modified: to_chrono(object.last_modified()),
                })
            })
            .collect();

        Ok(ListPage {
            objects,
            next_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> ClientResult<String> {
        let config = PresigningConfig::expires_in(expires_in)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::Error as S3Error;

    #[test]
    fn test_copy_source_escapes_key_segments() {
        assert_eq!(copy_source("bucket", "a/b.txt"), "bucket/a/b.txt");
        assert_eq!(
            copy_source("bucket", "reports/q1 summary+%#\u{e9}.pdf"),
            "bucket/reports/q1%20summary%2B%25%23%C3%A9.pdf"
        );
    }

    #[test]
    fn test_delete_failures_are_reported() {
        let clean = DeleteObjectsOutput::builder().build();
        assert!(delete_failures(&clean).is_ok());

        let output = DeleteObjectsOutput::builder()
            .errors(
                S3Error::builder()
                    .key("big/0001")
                    .code("AccessDenied")
                    .build(),
            )
            .errors(S3Error::builder().key("big/0002").code("InternalError").build())
            .build();
        let err = delete_failures(&output).unwrap_err().to_string();
        assert!(err.contains("2 object(s)"), "{err}");
        assert!(err.contains("big/0001 (AccessDenied)"), "{err}");
        assert!(err.contains("big/0002 (InternalError)"), "{err}");
    }
}
