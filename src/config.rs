//! Server configuration.
//!
//! The configuration file is read once at startup into immutable tables that
//! the event loop owns for the rest of the process. Two formats are accepted:
//!
//! ```text
//! # web.conf
//! host default /var/www
//! host example.com /var/www/example
//! media html text/html
//! parameter timeout 5
//! ```
//!
//! or, for files ending in `.yaml`/`.yml`:
//!
//! ```yaml
//! hosts:
//!   default: /var/www
//! media:
//!   html: text/html
//! parameters:
//!   timeout: 5
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_READ_BUFFER: usize = 10024;
pub const DEFAULT_MAX_HEADER: usize = 64 * 1024;

/// Name of the mandatory fallback entry in the host table.
pub const DEFAULT_HOST: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing `host default <path>` entry")]
    MissingDefaultHost,
    #[error("missing `parameter timeout <seconds>` entry")]
    MissingTimeout,
    #[error("parameter {name} has invalid value {value:?}")]
    InvalidParameter { name: String, value: String },
}

/// Host name to document root, with a guaranteed `default` entry.
#[derive(Debug, Clone)]
pub struct HostTable {
    roots: HashMap<String, PathBuf>,
    default_root: PathBuf,
}

impl HostTable {
    pub fn new(entries: HashMap<String, PathBuf>) -> Result<Self, ConfigError> {
        let mut roots: HashMap<String, PathBuf> = entries
            .into_iter()
            .map(|(host, root)| (host.to_ascii_lowercase(), root))
            .collect();
        let default_root = roots
            .remove(DEFAULT_HOST)
            .ok_or(ConfigError::MissingDefaultHost)?;
        Ok(Self { roots, default_root })
    }

    /// Document root for `host`, falling back to the default entry.
    pub fn resolve(&self, host: Option<&str>) -> &Path {
        host.and_then(|h| self.roots.get(&h.to_ascii_lowercase()))
            .unwrap_or(&self.default_root)
    }
}

/// File extension to MIME type.
#[derive(Debug, Clone, Default)]
pub struct MediaTable {
    types: HashMap<String, String>,
}

impl MediaTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let types = entries
            .into_iter()
            .map(|(ext, mime)| (ext.trim_start_matches('.').to_ascii_lowercase(), mime))
            .collect();
        Self { types }
    }

    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.types
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// MIME type for the extension of `path`, if it is mapped.
    pub fn for_path(&self, path: &Path) -> Option<&str> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.lookup(ext))
    }
}

/// Everything the response builder needs to resolve a request to a file.
#[derive(Debug, Clone)]
pub struct Site {
    pub hosts: HostTable,
    pub media: MediaTable,
}

/// Tunables of the event loop.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Idle time after which a connection is evicted; also the poll bound.
    pub timeout: Duration,
    /// Size of each read from a client socket.
    pub read_buffer_size: usize,
    /// Largest header block accepted before answering 400.
    pub max_header_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub site: Site,
    pub server: ServerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    hosts: HashMap<String, PathBuf>,
    media: HashMap<String, String>,
    parameters: Parameters,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Parameters {
    timeout: Option<u64>,
    buffer: Option<usize>,
    max_header: Option<usize>,
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Self::parse(&text),
        }
    }

    /// Parses the line-oriented `host` / `media` / `parameter` format.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut raw = RawConfig::default();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (kind, name, value) = split_directive(line).ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: format!("expected `<kind> <name> <value>`, got {line:?}"),
            })?;

            match kind {
                "host" => {
                    raw.hosts.insert(name.to_string(), PathBuf::from(value));
                }
                "media" => {
                    raw.media.insert(name.to_string(), value.to_string());
                }
                "parameter" => raw.parameters.set(name, value)?,
                other => {
                    return Err(ConfigError::Syntax {
                        line: line_no,
                        message: format!("unknown directive {other:?}"),
                    });
                }
            }
        }

        raw.validate()
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        raw.validate()
    }
}

impl Parameters {
    fn set(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        };

        match name {
            "timeout" => self.timeout = Some(value.parse().map_err(|_| invalid())?),
            "buffer" => self.buffer = Some(value.parse().map_err(|_| invalid())?),
            "max_header" => self.max_header = Some(value.parse().map_err(|_| invalid())?),
            _ => tracing::warn!(parameter = name, "ignoring unknown parameter"),
        }
        Ok(())
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let hosts = HostTable::new(self.hosts)?;
        let timeout = self.parameters.timeout.ok_or(ConfigError::MissingTimeout)?;

        if timeout == 0 {
            return Err(positive("timeout", timeout));
        }
        let read_buffer_size = self.parameters.buffer.unwrap_or(DEFAULT_READ_BUFFER);
        if read_buffer_size == 0 {
            return Err(positive("buffer", read_buffer_size));
        }
        let max_header_bytes = self.parameters.max_header.unwrap_or(DEFAULT_MAX_HEADER);
        if max_header_bytes == 0 {
            return Err(positive("max_header", max_header_bytes));
        }

        Ok(Config {
            site: Site {
                hosts,
                media: MediaTable::new(self.media),
            },
            server: ServerConfig {
                port: DEFAULT_PORT,
                timeout: Duration::from_secs(timeout),
                read_buffer_size,
                max_header_bytes,
            },
        })
    }
}

fn positive(name: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Splits `kind name value`, where the value runs to the end of the line.
fn split_directive(line: &str) -> Option<(&str, &str, &str)> {
    let (kind, rest) = line.split_once(char::is_whitespace)?;
    let (name, value) = rest.trim_start().split_once(char::is_whitespace)?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((kind, name, value))
}
