use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope};
use tracing::{debug, info, warn};

use crate::config::LdapSettings;
use crate::directory::{Directory, DirectorySession, ModifyOutcome};
use crate::entry::DirectoryEntry;
use crate::error::CoreError;
use crate::filter::{validate_filter, Filter};

/// Transport selected by the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ldap,
    Ldaps,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Ldap => "ldap",
            Protocol::Ldaps => "ldaps",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Ldap => 389,
            Protocol::Ldaps => 636,
        }
    }
}

/// A parsed and pre-flight checked `ldap://` or `ldaps://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapUrl {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl LdapUrl {
    /// Parse a server URL and reject a protocol/port combination that can
    /// only be a mistake: LDAPS on 389 or plain LDAP on 636.
    pub fn parse(url: &str) -> Result<Self, CoreError> {
        let url = url.trim();
        let (protocol, rest) = if let Some(rest) = url.strip_prefix("ldaps://") {
            (Protocol::Ldaps, rest)
        } else if let Some(rest) = url.strip_prefix("ldap://") {
            (Protocol::Ldap, rest)
        } else {
            return Err(CoreError::Config(format!(
                "LDAP URL must start with ldap:// or ldaps://, got {:?}",
                url
            )));
        };

        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port) = split_host_port(authority)
            .map_err(|reason| CoreError::Config(format!("invalid LDAP URL {:?}: {}", url, reason)))?;
        let port = port.unwrap_or(protocol.default_port());

        if host.is_empty() {
            return Err(CoreError::Config(format!("LDAP URL {:?} has no host", url)));
        }
        match (protocol, port) {
            (Protocol::Ldaps, 389) => {
                return Err(CoreError::Config(
                    "LDAPS (SSL) requested on the standard LDAP port 389; use port 636 for LDAPS"
                        .to_string(),
                ))
            }
            (Protocol::Ldap, 636) => {
                return Err(CoreError::Config(
                    "plain LDAP requested on the LDAPS port 636; use port 389 or an ldaps:// URL"
                        .to_string(),
                ))
            }
            _ => {}
        }

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for LdapUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>), String> {
    // [v6addr]:port
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 address".to_string())?;
        return match tail.strip_prefix(':') {
            Some(port) => parse_port(port).map(|p| (authority_v6(authority, host), Some(p))),
            None if tail.is_empty() => Ok((authority_v6(authority, host), None)),
            None => Err(format!("unexpected {:?} after IPv6 address", tail)),
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => parse_port(port).map(|p| (host, Some(p))),
        None => Ok((authority, None)),
    }
}

/// Keep the brackets around an IPv6 host so the URL can be rebuilt.
fn authority_v6<'a>(authority: &'a str, host: &str) -> &'a str {
    &authority[..host.len() + 2]
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("invalid port {:?}", port))
}

/// An open LDAP connection.
pub struct LdapConnection {
    pub ldap: Ldap,
    pub url: LdapUrl,
    pub page_size: i32,
}

impl LdapConnection {
    /// Open a connection to the server named in `settings`.
    pub async fn connect(settings: &LdapSettings) -> Result<Self, CoreError> {
        let url = LdapUrl::parse(&settings.url)?;
        let mut conn_settings =
            LdapConnSettings::new().set_conn_timeout(Duration::from_secs(settings.timeout_secs));
        if settings.ignore_certificate && url.protocol == Protocol::Ldaps {
            warn!("TLS certificate verification disabled for {}", url);
            conn_settings = conn_settings.set_no_tls_verify(true);
        }

        let (conn, ldap) = LdapConnAsync::with_settings(conn_settings, &url.to_string())
            .await
            .map_err(|e| CoreError::ConnectionFailed(format!("{}: {e}", url)))?;
        ldap3::drive!(conn);
        debug!("connected to {}", url);

        Ok(Self {
            ldap,
            url,
            page_size: settings.page_size,
        })
    }

    /// Unbind and close the connection.
    pub async fn disconnect(&mut self) -> Result<(), CoreError> {
        self.ldap.unbind().await.map_err(CoreError::Ldap)
    }
}

/// The live directory: one bound connection per logical operation.
#[derive(Clone)]
pub struct LdapDirectory {
    settings: LdapSettings,
    bind_dn: String,
    password: String,
}

impl LdapDirectory {
    pub fn new(settings: LdapSettings) -> Result<Self, CoreError> {
        LdapUrl::parse(&settings.url)?;
        let bind_dn = settings
            .bind_dn
            .clone()
            .filter(|dn| !dn.is_empty())
            .ok_or_else(|| CoreError::Config("LDAP bind DN must be set".to_string()))?;
        let password = settings
            .password
            .clone()
            .filter(|pw| !pw.is_empty())
            .ok_or_else(|| CoreError::Config("LDAP bind password must be set".to_string()))?;
        Ok(Self {
            settings,
            bind_dn,
            password,
        })
    }
}

impl fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("url", &self.settings.url)
            .field("bind_dn", &self.bind_dn)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    type Session = LdapConnection;

    async fn connect(&self) -> Result<LdapConnection, CoreError> {
        let mut conn = LdapConnection::connect(&self.settings).await?;
        if let Err(e) = conn.simple_bind(&self.bind_dn, &self.password).await {
            if let Err(close_err) = conn.disconnect().await {
                debug!("closing after failed bind: {}", close_err);
            }
            return Err(e);
        }
        Ok(conn)
    }
}

#[async_trait]
impl DirectorySession for LdapConnection {
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &Filter,
        scope: Scope,
        attrs: &[String],
    ) -> Result<Vec<DirectoryEntry>, CoreError> {
        let filter = filter.to_string();
        validate_filter(&filter).map_err(|reason| CoreError::InvalidFilterInput {
            token: filter.clone(),
            reason,
        })?;
        self.search_entries(base_dn, scope, &filter, attrs.to_vec())
            .await
    }

    async fn modify(
        &mut self,
        dn: &str,
        mods: Vec<Mod<String>>,
    ) -> Result<ModifyOutcome, CoreError> {
        self.modify_entry(dn, mods).await
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        self.disconnect().await?;
        info!("closed connection to {}", self.url);
        Ok(())
    }
}
