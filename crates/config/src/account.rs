//! Account settings assembled from configuration entries.

use std::{io::BufRead, path::Path};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tracing::{debug, trace, warn},
};

use crate::{
    error::ConfigError,
    ini::{ConfigEntry, ConfigSource},
};

/// Port used when the configuration does not set one.
pub const DEFAULT_PORT: u16 = 5222;

/// Resource used when the configuration does not set one.
pub const DEFAULT_RESOURCE: &str = "acc";

/// Everything needed to open one client connection.
#[derive(Clone, Serialize)]
pub struct AccountConfig {
    /// Account JID (e.g. "alice@example.com").
    pub user: String,

    /// Account password. Serialized as `[REDACTED]`.
    #[serde(serialize_with = "serialize_redacted")]
    pub pass: Secret<String>,

    /// XMPP resource bound for this session.
    pub resource: String,

    /// Display name shown for our own messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// TCP port. Only used together with `server`.
    pub port: u16,

    /// Host to connect to instead of resolving the JID domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// HTTP upload service JID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fileproxy: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("user", &self.user)
            .field("pass", &"[REDACTED]")
            .field("resource", &self.resource)
            .field("server", &self.server)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn serialize_redacted<S: serde::Serializer>(
    _secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("[REDACTED]")
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            pass: Secret::new(String::new()),
            resource: DEFAULT_RESOURCE.into(),
            alias: None,
            port: DEFAULT_PORT,
            server: None,
            fileproxy: None,
        }
    }
}

impl AccountConfig {
    /// Read the account from the INI file at `path`.
    ///
    /// A missing file gives the defaults; see [`AccountConfig::from_source`]
    /// for how `profile` selects sections.
    pub fn load(path: impl AsRef<Path>, profile: Option<&str>) -> Self {
        Self::from_source(ConfigSource::open(path), profile)
    }

    /// Build the account from every entry in `source`.
    ///
    /// Without a profile every entry applies whatever its section. With one,
    /// only entries outside any section and entries in the section named
    /// after the profile apply. Later keys override earlier ones; unknown
    /// keys are ignored.
    pub fn from_source<R: BufRead>(mut source: ConfigSource<R>, profile: Option<&str>) -> Self {
        let mut config = Self::default();
        while let Some(entry) = source.next_entry() {
            if let Some(profile) = profile
                && !entry.section.is_empty()
                && entry.section != profile
            {
                trace!(
                    section = entry.section,
                    key = entry.key,
                    "skipping entry for other profile"
                );
                continue;
            }
            config.apply(&entry);
        }
        config
    }

    fn apply(&mut self, entry: &ConfigEntry<'_>) {
        let value = entry.value;
        match entry.key {
            "user" => self.user = value.to_string(),
            "pass" => self.pass = Secret::new(value.to_string()),
            "resource" => self.resource = value.to_string(),
            "alias" => self.alias = non_empty(value),
            "port" => match u16::try_from(parse_unsigned(value)) {
                Ok(port) => self.port = port,
                Err(_) => warn!(
                    value,
                    port = self.port,
                    "port out of range, keeping previous value"
                ),
            },
            "server" => self.server = non_empty(value),
            "fileproxy" => self.fileproxy = non_empty(value),
            other => debug!(
                key = other,
                section = entry.section,
                "ignoring unknown config key"
            ),
        }
    }

    /// Check that the account can be used to log in.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.is_empty() {
            return Err(ConfigError::MissingUser);
        }
        if self.pass.expose_secret().is_empty() {
            return Err(ConfigError::MissingPassword);
        }
        match self.bare_jid().split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {},
            _ => return Err(ConfigError::InvalidJid(self.user.clone())),
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(())
    }

    /// `user` without any resource part.
    pub fn bare_jid(&self) -> &str {
        self.user.split('/').next().unwrap_or(&self.user)
    }

    /// Domain part of the account JID.
    pub fn domain(&self) -> &str {
        let bare = self.bare_jid();
        bare.split_once('@').map_or(bare, |(_, domain)| domain)
    }

    /// `user/resource`, or `user` as-is when it already carries a resource
    /// or no resource is configured.
    pub fn full_jid(&self) -> String {
        if self.user.contains('/') || self.resource.is_empty() {
            self.user.clone()
        } else {
            format!("{}/{}", self.user, self.resource)
        }
    }

    /// Name to show for our own messages.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.bare_jid())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse an unsigned integer the way C's `strtoul(s, NULL, 0)` does.
///
/// A `0x`/`0X` prefix selects hex and a leading `0` selects octal. Parsing
/// stops at the first invalid digit; no digits at all gives 0.
pub fn parse_unsigned(value: &str) -> u64 {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let (radix, digits) = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        (16, hex)
    } else if value.len() > 1
        && let Some(octal) = value.strip_prefix('0')
    {
        (8, octal)
    } else {
        (10, value)
    };

    digits
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(u64::from(radix))
                .saturating_add(u64::from(d))
        })
}
