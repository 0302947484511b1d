use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::{AttributeMap, DEFAULT_ATTRIBUTE_MAPPING};
use crate::connection::LdapUrl;
use crate::error::CoreError;

/// Environment variables with this prefix override file settings,
/// e.g. `ROSTER_USER_BASE_DN` or `ROSTER_LDAP__URL`.
pub const ENV_PREFIX: &str = "ROSTER";

/// Settings for reaching the directory server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapSettings {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Accept any server certificate on `ldaps://` connections.
    #[serde(default)]
    pub ignore_certificate: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

fn default_url() -> String {
    "ldap://localhost:389".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_page_size() -> i32 {
    500
}
fn default_attributes() -> String {
    DEFAULT_ATTRIBUTE_MAPPING.to_string()
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            bind_dn: None,
            password: None,
            ignore_certificate: false,
            timeout_secs: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl fmt::Debug for LdapSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapSettings")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ignore_certificate", &self.ignore_certificate)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Top-level configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Whitespace-separated `field:attribute` pairs.
    #[serde(default = "default_attributes")]
    pub attributes: String,
    pub user_base_dn: String,
    pub group_base_dn: String,
    #[serde(default)]
    pub ldap: LdapSettings,
}

impl RosterConfig {
    /// Default config file location: `<config_dir>/roster/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("roster").join("config.toml"))
    }

    /// Load configuration from a TOML file layered under `ROSTER_*`
    /// environment variables, then `overrides` (dotted keys such as
    /// `ldap.url`). An explicitly given file must exist; the default one is
    /// optional.
    pub fn load(path: Option<&Path>, overrides: &[(&str, &str)]) -> Result<Self, CoreError> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    debug!("looking for config at {}", path.display());
                    builder = builder.add_source(
                        File::from(path).format(FileFormat::Toml).required(false),
                    );
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let config: RosterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        let config: RosterConfig =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked without contacting the server.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.attribute_map()?;
        if self.user_base_dn.trim().is_empty() {
            return Err(CoreError::Config("user_base_dn must be set".to_string()));
        }
        if self.group_base_dn.trim().is_empty() {
            return Err(CoreError::Config("group_base_dn must be set".to_string()));
        }
        if self.ldap.page_size <= 0 {
            return Err(CoreError::Config("ldap.page_size must be positive".to_string()));
        }
        LdapUrl::parse(&self.ldap.url)?;
        Ok(())
    }

    pub fn attribute_map(&self) -> Result<AttributeMap, CoreError> {
        self.attributes.parse()
    }
}
