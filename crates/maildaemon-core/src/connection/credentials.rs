//! Login, password and bearer token resolution.
//!
//! Values from the configuration are used as given. Missing values are
//! asked from an injected [`CredentialProvider`], at most once per
//! connection until [`Credentials::reset`] is called, so a provider that
//! prompts on a terminal prompts only once.

use std::sync::Arc;

use super::ConnectionSettings;
use crate::{Error, Result};

/// Supplies logins and passwords that the configuration leaves out.
pub trait CredentialProvider: Send + Sync {
    /// Returns the login for a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if no login can be obtained.
    fn login(&self, settings: &ConnectionSettings) -> Result<String>;

    /// Returns the password for a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if no password can be obtained.
    fn password(&self, settings: &ConnectionSettings) -> Result<String>;
}

/// Supplies OAuth2 bearer tokens.
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid token for a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available.
    fn bearer_token(&self, settings: &ConnectionSettings) -> Result<String>;
}

/// Provider for configurations that carry every credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCredentials;

impl CredentialProvider for StaticCredentials {
    fn login(&self, settings: &ConnectionSettings) -> Result<String> {
        Err(Error::Credential(format!(
            "{}: no login configured",
            settings.name
        )))
    }

    fn password(&self, settings: &ConnectionSettings) -> Result<String> {
        Err(Error::Credential(format!(
            "{}: no password configured",
            settings.name
        )))
    }
}

/// Credentials of one connection.
pub struct Credentials {
    configured_login: Option<String>,
    configured_password: Option<String>,
    login: Option<String>,
    password: Option<String>,
    provider: Arc<dyn CredentialProvider>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl Credentials {
    /// Creates credentials from configured values, backed by
    /// [`StaticCredentials`].
    #[must_use]
    pub fn new(login: Option<String>, password: Option<String>) -> Self {
        Self {
            login: login.clone(),
            password: password.clone(),
            configured_login: login,
            configured_password: password,
            provider: Arc::new(StaticCredentials),
            tokens: None,
        }
    }

    /// Asks `provider` for values the configuration lacks.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Uses `tokens` for OAuth2 connections.
    #[must_use]
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Returns the login, asking the provider the first time.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot supply one.
    pub fn login(&mut self, settings: &ConnectionSettings) -> Result<String> {
        if let Some(login) = &self.login {
            return Ok(login.clone());
        }
        let login = self.provider.login(settings)?;
        self.login = Some(login.clone());
        Ok(login)
    }

    /// Returns the password, asking the provider the first time.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot supply one.
    pub fn password(&mut self, settings: &ConnectionSettings) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let password = self.provider.password(settings)?;
        self.password = Some(password.clone());
        Ok(password)
    }

    /// Resolves login and password together.
    ///
    /// # Errors
    ///
    /// Returns an error if either cannot be obtained.
    pub fn resolve(&mut self, settings: &ConnectionSettings) -> Result<(String, String)> {
        Ok((self.login(settings)?, self.password(settings)?))
    }

    /// Fetches a bearer token. Tokens expire, so they are never cached here.
    ///
    /// # Errors
    ///
    /// Returns an error if no token provider is set or it fails.
    pub fn bearer_token(&self, settings: &ConnectionSettings) -> Result<String> {
        self.tokens
            .as_ref()
            .ok_or_else(|| {
                Error::Credential(format!("{}: no token provider for OAuth", settings.name))
            })?
            .bearer_token(settings)
    }

    /// Forgets resolved values; the next access asks the provider again.
    pub fn reset(&mut self) {
        self.login.clone_from(&self.configured_login);
        self.password.clone_from(&self.configured_password);
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("oauth", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}
