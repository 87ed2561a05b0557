//! Configuration manager for accounta.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listening port, defaults to 8080.
    pub port: Option<u16>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to the Cloudinary object store.
    #[serde(skip_serializing)]
    pub cloudinary: Option<Cloudinary>,
    /// Profile image upload policy.
    #[serde(default)]
    pub upload: Upload,
    /// Reward wallet settings.
    #[serde(default)]
    pub wallet: Wallet,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    /// HMAC secret used to sign access tokens.
    pub secret: String,
    /// Update token audience.
    pub audience: Option<String>,
}

/// Cloudinary credentials and upload destination.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cloudinary {
    /// Cloudinary cloud name.
    pub cloud_name: String,
    /// Cloudinary API key.
    pub key: String,
    /// Cloudinary API secret.
    /// Should never be shared!
    pub secret: String,
    /// Remote folder receiving profile images.
    pub folder: Option<String>,
}

/// Profile image upload policy.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Upload {
    /// Accepted MIME types.
    pub allowed_types: Vec<String>,
    /// Maximum accepted payload, in bytes.
    pub max_size_bytes: usize,
    /// Spool directory for local temp files.
    pub temp_dir: Option<PathBuf>,
    /// Bound on every local or remote I/O call, in seconds.
    pub timeout_secs: u64,
}

impl Default for Upload {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                "image/jpeg".to_owned(),
                "image/png".to_owned(),
                "image/webp".to_owned(),
            ],
            max_size_bytes: 5 * 1024 * 1024,
            temp_dir: None,
            timeout_secs: 30,
        }
    }
}

/// Reward wallet settings.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Amount credited on the first successful image upload.
    pub reward: i64,
    /// Fixed currency label.
    pub currency: String,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            reward: 3,
            currency: "coins".to_owned(),
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                // normalize URLs.
                config.url = self.normalize_url(&config.url)?;

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
