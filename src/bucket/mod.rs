//! Object buckets: put, get and stat named byte blobs
//!
//! [`FileBucket`] stores objects as files under a base directory. With the
//! `s3` feature, [`S3Bucket`] provides the same contract over an
//! S3-compatible service.

mod file_bucket;
mod locks;
mod path;

#[cfg(feature = "s3")]
mod s3;

pub use file_bucket::FileBucket;

#[cfg(feature = "s3")]
pub use s3::S3Bucket;

use crate::config::BucketConfig;
use crate::context::CancellationToken;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Size of the chunks copied between cancellation checks
const COPY_CHUNK: usize = 64 * 1024;

/// Metadata for a stored object, recomputed on every call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Size in bytes
    pub size: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

/// Trait for object storage backends
///
/// All methods block. Callers on an async runtime should run them on a
/// blocking thread.
pub trait Bucket: Send + Sync {
    /// Store the full contents of `reader` under `name`, replacing any
    /// existing object
    fn put_object(
        &self,
        token: &CancellationToken,
        name: &str,
        reader: &mut dyn Read,
    ) -> Result<()>;

    /// Open an object for reading; the caller owns the returned stream
    fn get_object(&self, token: &CancellationToken, name: &str) -> Result<Box<dyn Read + Send>>;

    /// Size, content type and modification time of an object
    fn stats(&self, token: &CancellationToken, name: &str) -> Result<Stats>;

    /// Store a byte slice
    fn put_bytes(&self, token: &CancellationToken, name: &str, data: &[u8]) -> Result<()> {
        let mut reader = data;
        self.put_object(token, name, &mut reader)
    }

    /// Read a whole object into memory
    fn get_bytes(&self, token: &CancellationToken, name: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.get_object(token, name)?.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Open the backend described by `config`
pub fn open_bucket(config: &BucketConfig) -> Result<Box<dyn Bucket>> {
    match config {
        BucketConfig::File(file) => Ok(Box::new(FileBucket::open(&file.base_path)?)),
        #[cfg(feature = "s3")]
        BucketConfig::S3(s3) => Ok(Box::new(S3Bucket::open(s3)?)),
        #[cfg(not(feature = "s3"))]
        BucketConfig::S3(_) => Err(Error::Config(
            "S3 backend not enabled. Compile with --features s3".into(),
        )),
    }
}

/// Copy `reader` into `writer`, checking `token` before every chunk
pub(crate) fn copy_with_cancel(
    token: &CancellationToken,
    reader: &mut dyn Read,
    writer: &mut dyn Write,
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;

    loop {
        token.check()?;
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    Ok(total)
}
