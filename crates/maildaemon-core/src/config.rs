//! Configuration document.
//!
//! The document is JSON with two objects, `connections` and `filters`,
//! keyed by name. Entries are kept as raw values in file order and parsed
//! one by one, so every error names the entry it comes from.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::connection::{
    ConnectionGroup, ConnectionSettings, CredentialProvider, Protocol, TokenProvider,
};
use crate::filter::MessageFilter;
use crate::{Error, Result};

/// The whole configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Connection entries by name.
    #[serde(default)]
    pub connections: Map<String, Value>,
    /// Filter entries by name.
    #[serde(default)]
    pub filters: Map<String, Value>,
}

impl Config {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object of the expected
    /// shape.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            connections = config.connections.len(),
            filters = config.filters.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Builds the connection group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] for an entry missing a required field.
    pub fn connection_group(
        &self,
        provider: Arc<dyn CredentialProvider>,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Result<ConnectionGroup> {
        ConnectionGroup::from_config(&self.connections, provider, tokens)
    }

    /// Builds every filter, in file order, against `group`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] for the first invalid filter.
    pub fn message_filters(&self, group: &ConnectionGroup) -> Result<Vec<MessageFilter>> {
        self.filters
            .iter()
            .map(|(name, value)| MessageFilter::from_config(name, value, group))
            .collect()
    }
}

/// One entry of the `connections` object.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// `IMAP`, `POP` or `SMTP`.
    pub protocol: Option<String>,
    /// Server hostname.
    pub domain: Option<String>,
    /// Explicit port.
    pub port: Option<u16>,
    /// Implicit TLS, on unless disabled.
    #[serde(default = "enabled")]
    pub ssl: bool,
    /// Bearer token authentication.
    #[serde(default)]
    pub oauth: bool,
    /// Opaque data for the token provider.
    #[serde(default, rename = "oauth-data", alias = "oauth_data")]
    pub oauth_data: Option<Value>,
    /// Login; asked for when absent.
    pub login: Option<String>,
    /// Password; asked for when absent.
    pub password: Option<String>,
}

const fn enabled() -> bool {
    true
}

impl ConnectionConfig {
    /// Parses the entry `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if a field has the wrong type or
    /// `protocol` or `domain` is missing.
    pub fn parse(name: &str, value: &Value) -> Result<Self> {
        let section = format!("connection: {name}");
        let config = Self::deserialize(value).map_err(|e| Error::construction(&section, e))?;
        if config.protocol.is_none() {
            return Err(Error::construction(&section, "missing required field `protocol`"));
        }
        if config.domain.is_none() {
            return Err(Error::construction(&section, "missing required field `domain`"));
        }
        Ok(config)
    }

    /// Builds the settings, or `None` if the protocol is not recognized.
    #[must_use]
    pub fn settings(&self, name: &str) -> Option<ConnectionSettings> {
        let protocol = Protocol::from_name(self.protocol.as_deref()?)?;
        let mut settings = ConnectionSettings::new(name, protocol, self.domain.clone()?)
            .with_ssl(self.ssl);
        settings.port = self.port;
        settings.oauth = self.oauth;
        settings.oauth_data.clone_from(&self.oauth_data);
        Some(settings)
    }
}

/// One entry of the `filters` object.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Names of the connections the filter watches.
    #[serde(default)]
    pub connections: Vec<String>,
    /// Match condition.
    #[serde(default)]
    pub condition: ConditionConfig,
    /// `operation:args` strings, required.
    pub actions: Option<Vec<String>>,
}

/// A condition as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConditionConfig {
    /// Clauses joined by ` or ` and ` and `.
    Text(String),
    /// Disjunction of conjunctions of `attribute:OPargument` strings.
    Clauses(Vec<Vec<String>>),
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self::Clauses(Vec::new())
    }
}
