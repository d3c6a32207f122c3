//! # bucketstore
//!
//! Put, get and stat named byte blobs in a bucket.
//!
//! The filesystem backend maps object names onto files under a base
//! directory. Writes are atomic and durable, names can never reach outside
//! the base, and content types are inferred from the name and the leading
//! bytes. An S3-compatible backend with the same contract is available
//! behind the `s3` feature.
//!
//! ## Core Concepts
//!
//! - **Buckets**: Backends implementing [`Bucket`] (put, get, stats)
//! - **Names**: Slash-separated relative paths, validated on every call
//! - **Stats**: Size, content type and modification time, never cached
//! - **Tokens**: [`CancellationToken`]s checked before and during work
//!
//! ## Example
//!
//! ```no_run
//! use bucketstore::{Bucket, CancellationToken, FileBucket};
//!
//! let bucket = FileBucket::open("/srv/objects")?;
//! let token = CancellationToken::none();
//! bucket.put_bytes(&token, "avatars/42.png", b"\x89PNG\r\n\x1a\n")?;
//! let stats = bucket.stats(&token, "avatars/42.png")?;
//! assert_eq!(stats.content_type, "image/png");
//! # Ok::<(), bucketstore::Error>(())
//! ```

pub mod bucket;
pub mod config;
pub mod content_type;
pub mod context;

mod error;

pub use bucket::{open_bucket, Bucket, FileBucket, Stats};
#[cfg(feature = "s3")]
pub use bucket::S3Bucket;
pub use config::{BucketConfig, FileBucketConfig, S3Config};
pub use content_type::detect_content_type;
pub use context::{CancellationReason, CancellationSource, CancellationToken};
pub use error::{Error, Result};
