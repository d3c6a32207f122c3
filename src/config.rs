//! Backend configuration
//!
//! A [`BucketConfig`] selects and describes one backend. It can be read from
//! a JSON file or from environment variables:
//!
//! - `BUCKET_KIND`: `file` (default) or `s3`
//! - `BUCKET_BASE_PATH`: base directory for the file backend
//! - `S3_ENDPOINT`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`, `S3_BUCKET`: required for `s3`
//! - `S3_REGION`: defaults to `us-east-1`
//! - `S3_USE_SSL`: defaults to `true`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default region for S3-compatible stores
pub const DEFAULT_REGION: &str = "us-east-1";

/// Which backend to open, and how
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BucketConfig {
    /// Objects stored as files under a base directory
    File(FileBucketConfig),
    /// Objects stored in an S3-compatible service
    S3(S3Config),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBucketConfig {
    /// Root directory for all objects; created if missing
    pub base_path: PathBuf,
}

impl Default for FileBucketConfig {
    /// `<data dir>/bucketstore`, or `.bucketstore` when there is no data dir
    fn default() -> Self {
        let base_path = dirs::data_dir()
            .map(|dir| dir.join("bucketstore"))
            .unwrap_or_else(|| PathBuf::from(".bucketstore"));
        FileBucketConfig { base_path }
    }
}

/// Connection settings for an S3-compatible service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Host (and optional port), or a full URL
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_use_ssl() -> bool {
    true
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

impl S3Config {
    /// Endpoint as a URL, adding the scheme implied by `use_ssl` if missing
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.use_ssl { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint)
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        BucketConfig::File(FileBucketConfig::default())
    }
}

impl BucketConfig {
    /// Load a config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build a config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (the environment, a map, ...)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = lookup("BUCKET_KIND").unwrap_or_else(|| "file".to_string());

        match kind.to_ascii_lowercase().as_str() {
            "file" => {
                let config = match lookup("BUCKET_BASE_PATH") {
                    Some(path) => FileBucketConfig {
                        base_path: PathBuf::from(path),
                    },
                    None => FileBucketConfig::default(),
                };
                Ok(BucketConfig::File(config))
            }
            "s3" => {
                let required = |key: &str| {
                    lookup(key)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| Error::Config(format!("{} is not set", key)))
                };
                let use_ssl = match lookup("S3_USE_SSL") {
                    Some(value) => parse_bool(&value).ok_or_else(|| {
                        Error::Config(format!("S3_USE_SSL is not a boolean: {}", value))
                    })?,
                    None => true,
                };
                Ok(BucketConfig::S3(S3Config {
                    endpoint: required("S3_ENDPOINT")?,
                    access_key: required("S3_ACCESS_KEY")?,
                    secret_key: required("S3_SECRET_KEY")?,
                    bucket_name: required("S3_BUCKET")?,
                    region: lookup("S3_REGION").unwrap_or_else(default_region),
                    use_ssl,
                }))
            }
            other => Err(Error::Config(format!("Unknown bucket kind: {}", other))),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_file_config() {
        let config: BucketConfig =
            serde_json::from_str(r#"{"kind": "file", "base_path": "/srv/objects"}"#).unwrap();
        assert_eq!(
            config,
            BucketConfig::File(FileBucketConfig {
                base_path: PathBuf::from("/srv/objects")
            })
        );
    }

    #[test]
    fn test_parse_s3_config_defaults() {
        let config: BucketConfig = serde_json::from_str(
            r#"{
                "kind": "s3",
                "endpoint": "minio.local:9000",
                "access_key": "ak",
                "secret_key": "sk",
                "bucket_name": "media"
            }"#,
        )
        .unwrap();

        let BucketConfig::S3(s3) = config else {
            panic!("expected s3 config");
        };
        assert_eq!(s3.region, DEFAULT_REGION);
        assert!(s3.use_ssl);
        assert_eq!(s3.endpoint_url(), "https://minio.local:9000");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bucket.json");
        let config = BucketConfig::File(FileBucketConfig {
            base_path: dir.path().join("objects"),
        });

        config.save(&path).unwrap();
        assert_eq!(BucketConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_from_lookup_file() {
        let config =
            BucketConfig::from_lookup(lookup_from(&[("BUCKET_BASE_PATH", "/tmp/b")])).unwrap();
        assert_eq!(
            config,
            BucketConfig::File(FileBucketConfig {
                base_path: PathBuf::from("/tmp/b")
            })
        );
    }

    #[test]
    fn test_from_lookup_s3() {
        let config = BucketConfig::from_lookup(lookup_from(&[
            ("BUCKET_KIND", "S3"),
            ("S3_ENDPOINT", "localhost:9000"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
            ("S3_BUCKET", "media"),
            ("S3_USE_SSL", "false"),
        ]))
        .unwrap();

        let BucketConfig::S3(s3) = config else {
            panic!("expected s3 config");
        };
        assert_eq!(s3.endpoint_url(), "http://localhost:9000");
        assert_eq!(s3.region, DEFAULT_REGION);
    }

    #[test]
    fn test_from_lookup_s3_missing_key() {
        let err = BucketConfig::from_lookup(lookup_from(&[
            ("BUCKET_KIND", "s3"),
            ("S3_ENDPOINT", "localhost:9000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("S3_ACCESS_KEY")));
    }

    #[test]
    fn test_unknown_kind() {
        let err = BucketConfig::from_lookup(lookup_from(&[("BUCKET_KIND", "ftp")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let s3 = S3Config {
            endpoint: "e".into(),
            access_key: "ak".into(),
            secret_key: "super-secret".into(),
            bucket_name: "b".into(),
            region: default_region(),
            use_ssl: true,
        };
        assert!(!format!("{:?}", s3).contains("super-secret"));
    }
}
