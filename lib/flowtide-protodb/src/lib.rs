//! Service name lookup by transport protocol and port.
//!
//! A [`ProtoDb`] maps `(protocol, port)` pairs, such as `("tcp", 443)`, to the name of the service registered for them,
//! such as `https`. The data comes from a file in `services(5)` format: either a snapshot embedded in this crate, or the
//! system services file when `TELEGRAF_SFLOW_USE_ETC_SERVICES` is set to a non-empty value.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use figment::{providers::Env, value::Value, Figment, Provider};
use flowtide_common::collections::FastHashMap;
use flowtide_error::{ErrorContext as _, GenericError};
use serde::Deserialize;
use snafu::{OptionExt as _, Snafu};
use tracing::{debug, info, warn};

/// Environment variable selecting the system services file over the embedded snapshot.
pub const USE_ETC_SERVICES_ENV: &str = "TELEGRAF_SFLOW_USE_ETC_SERVICES";

const DEFAULT_SERVICES_PATH: &str = "/etc/services";
const EMBEDDED_SERVICES: &str = include_str!("../data/services");

static GLOBAL: OnceLock<Arc<ProtoDb>> = OnceLock::new();

#[derive(Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    telegraf_sflow_use_etc_services: Option<Value>,
}

/// Source selection for a [`ProtoDb`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProtoDbConfiguration {
    services_path: Option<PathBuf>,
}

impl ProtoDbConfiguration {
    /// Creates a configuration using the embedded snapshot.
    pub fn embedded() -> Self {
        Self { services_path: None }
    }

    /// Creates a configuration reading the given services file.
    pub fn services_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            services_path: Some(path.into()),
        }
    }

    /// Creates a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// If the environment cannot be read as configuration, an error is returned.
    pub fn from_environment() -> Result<Self, GenericError> {
        Self::from_provider(Env::raw().only(&[USE_ETC_SERVICES_ENV]))
    }

    /// Creates a configuration from the given provider.
    ///
    /// The system services file is selected when the provider holds a non-empty value for
    /// `telegraf_sflow_use_etc_services`.
    ///
    /// # Errors
    ///
    /// If the provider's data cannot be extracted, an error is returned.
    pub fn from_provider<P: Provider>(provider: P) -> Result<Self, GenericError> {
        let raw = Figment::from(provider)
            .extract::<RawConfiguration>()
            .error_context("Failed to extract protodb configuration.")?;

        let use_etc_services = match raw.telegraf_sflow_use_etc_services {
            None => false,
            Some(Value::String(_, s)) => !s.is_empty(),
            Some(_) => true,
        };

        if use_etc_services {
            Ok(Self::services_file(DEFAULT_SERVICES_PATH))
        } else {
            Ok(Self::embedded())
        }
    }

    /// Returns the services file to read, or `None` if the embedded snapshot is used.
    pub fn services_path(&self) -> Option<&Path> {
        self.services_path.as_deref()
    }
}

#[derive(Debug, Eq, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
enum LineError {
    #[snafu(display("missing port/protocol"))]
    MissingPortProtocol,

    #[snafu(display("malformed port/protocol '{}'", value))]
    MalformedPortProtocol { value: String },

    #[snafu(display("invalid port '{}'", value))]
    InvalidPort { value: String },
}

/// A service name database.
#[derive(Clone, Debug, Default)]
pub struct ProtoDb {
    services: FastHashMap<String, FastHashMap<u16, String>>,
}

impl ProtoDb {
    /// Returns the process-wide database.
    ///
    /// The database is loaded on first use, from the source selected by the process environment.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let config = ProtoDbConfiguration::from_environment().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read protodb configuration. Using embedded services.");
                ProtoDbConfiguration::embedded()
            });
            Arc::new(Self::load(&config))
        }))
    }

    /// Loads a database from the source selected by `config`.
    ///
    /// If the services file cannot be read, the embedded snapshot is used instead.
    pub fn load(config: &ProtoDbConfiguration) -> Self {
        let Some(path) = config.services_path() else {
            return Self::embedded();
        };

        match Self::from_services_file(path) {
            Ok(db) => {
                info!(path = %path.display(), services = db.len(), "Loaded services file.");
                db
            }
            Err(e) => {
                warn!(error = %e, "Failed to load services file. Using embedded services.");
                Self::embedded()
            }
        }
    }

    /// Creates a database from the embedded snapshot.
    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_SERVICES)
    }

    /// Creates a database from a services file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, an error is returned.
    pub fn from_services_file<P: AsRef<Path>>(path: P) -> Result<Self, GenericError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_error_context(|| format!("Failed to read services file '{}'.", path.display()))?;
        Ok(Self::parse(&data))
    }

    /// Creates a database from data in `services(5)` format.
    ///
    /// Lines that cannot be parsed are skipped. When several lines register the same protocol and port, the first one
    /// wins.
    pub fn parse(data: &str) -> Self {
        let mut services = FastHashMap::<String, FastHashMap<u16, String>>::default();

        for (index, line) in data.lines().enumerate() {
            match parse_line(line) {
                Ok(Some((name, port, protocol))) => {
                    services
                        .entry(protocol.to_ascii_lowercase())
                        .or_default()
                        .entry(port)
                        .or_insert_with(|| name.to_string());
                }
                Ok(None) => {}
                Err(e) => debug!(line = index + 1, error = %e, "Skipping malformed services line."),
            }
        }

        Self { services }
    }

    /// Gets the name of the service registered for `port` over `protocol`.
    ///
    /// Protocols are matched case-insensitively.
    pub fn lookup(&self, protocol: &str, port: u16) -> Option<&str> {
        let by_port = match self.services.get(protocol) {
            Some(by_port) => by_port,
            None => self.services.get(&protocol.to_ascii_lowercase())?,
        };
        by_port.get(&port).map(String::as_str)
    }

    /// Returns the number of registered `(protocol, port)` pairs.
    pub fn len(&self) -> usize {
        self.services.values().map(FastHashMap::len).sum()
    }

    /// Returns `true` if no services are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_line(line: &str) -> Result<Option<(&str, u16, &str)>, LineError> {
    let line = line.split('#').next().unwrap_or_default();
    let mut parts = line.split_whitespace();

    let Some(name) = parts.next() else {
        return Ok(None);
    };
    let port_protocol = parts.next().context(MissingPortProtocol)?;

    let (port, protocol) = port_protocol
        .split_once('/')
        .filter(|(port, protocol)| !port.is_empty() && !protocol.is_empty())
        .context(MalformedPortProtocol { value: port_protocol })?;
    let port = port.parse::<u16>().ok().context(InvalidPort { value: port })?;

    Ok(Some((name, port, protocol)))
}
