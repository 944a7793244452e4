//! Named collection of connections.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{
    Connection, CredentialProvider, Credentials, ImapConnection, PopConnection, Protocol,
    SmtpConnection, TokenProvider,
};
use crate::Result;
use crate::config::ConnectionConfig;

/// Connections by name, in insertion order.
///
/// Bulk operations are best-effort: a failing connection is logged and its
/// siblings are still processed.
#[derive(Default)]
pub struct ConnectionGroup {
    connections: Vec<Box<dyn Connection>>,
}

impl ConnectionGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a group from the `connections` section.
    ///
    /// Entries with an unrecognized protocol are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Construction`] for an entry missing
    /// `protocol` or `domain` or holding a field of the wrong type.
    pub fn from_config(
        section: &Map<String, Value>,
        provider: Arc<dyn CredentialProvider>,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self> {
        let mut group = Self::new();

        for (name, value) in section {
            let config = ConnectionConfig::parse(name, value)?;
            let Some(settings) = config.settings(name) else {
                tracing::warn!(
                    connection = %name,
                    protocol = config.protocol.as_deref().unwrap_or_default(),
                    "Unrecognized protocol, skipping"
                );
                continue;
            };

            let mut credentials =
                Credentials::new(config.login, config.password).with_provider(provider.clone());
            if let Some(tokens) = &tokens {
                credentials = credentials.with_token_provider(tokens.clone());
            }

            tracing::debug!(%settings, "Connection configured");
            let connection: Box<dyn Connection> = match settings.protocol {
                Protocol::Imap => Box::new(ImapConnection::new(settings, credentials)),
                Protocol::Pop => Box::new(PopConnection::new(settings, credentials)),
                Protocol::Smtp => Box::new(SmtpConnection::new(settings, credentials)),
            };
            group.insert(connection);
        }

        Ok(group)
    }

    /// Adds a connection, replacing one with the same name.
    pub fn insert(&mut self, connection: Box<dyn Connection>) {
        if let Some(existing) = self
            .connections
            .iter_mut()
            .find(|existing| existing.name() == connection.name())
        {
            tracing::warn!(
                connection = %connection.name(),
                "Replacing connection with the same name"
            );
            *existing = connection;
        } else {
            self.connections.push(connection);
        }
    }

    /// Looks up a connection by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Connection + 'static)> {
        self.connections
            .iter_mut()
            .find(|connection| connection.name() == name)
            .map(Box::as_mut)
    }

    /// Returns true if a connection with this name is in the group.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.connections.iter().any(|connection| connection.name() == name)
    }

    /// Connection names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|connection| connection.name().to_string())
            .collect()
    }

    /// Number of connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connection is left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connects every connection; failures are logged.
    ///
    /// Returns the number of connections that are connected afterwards.
    pub async fn connect_all(&mut self) -> usize {
        let mut connected = 0;
        for connection in &mut self.connections {
            match connection.connect().await {
                Ok(()) => {
                    tracing::info!(connection = %connection.name(), "Connected");
                    connected += 1;
                }
                Err(e) => {
                    tracing::error!(connection = %connection.name(), error = %e, "Connect failed");
                }
            }
        }
        connected
    }

    /// Checks every connection and removes the ones that are not alive.
    ///
    /// Survivors keep their relative order. Returns the removed names.
    pub async fn purge_dead(&mut self) -> Vec<String> {
        let mut alive = Vec::with_capacity(self.connections.len());
        let mut dead = Vec::new();

        for mut connection in std::mem::take(&mut self.connections) {
            if connection.is_alive().await {
                alive.push(connection);
            } else {
                tracing::warn!(connection = %connection.name(), "Connection is dead, removing it");
                dead.push(connection.name().to_string());
            }
        }

        self.connections = alive;
        dead
    }

    /// Disconnects every connected connection; failures are logged.
    pub async fn disconnect_all(&mut self) {
        for connection in &mut self.connections {
            if !connection.is_connected() {
                continue;
            }
            match connection.disconnect().await {
                Ok(()) => tracing::info!(connection = %connection.name(), "Disconnected"),
                Err(e) => tracing::error!(
                    connection = %connection.name(),
                    error = %e,
                    "Disconnect failed"
                ),
            }
        }
    }
}

impl std::fmt::Debug for ConnectionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.connections.iter().map(|connection| connection.name()))
            .finish()
    }
}
