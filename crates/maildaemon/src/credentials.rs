//! Terminal credential prompting and configured bearer tokens.

use std::io::{self, BufRead, Write};

use maildaemon_core::{ConnectionSettings, CredentialProvider, Error, Result, TokenProvider};
use serde_json::Value;

/// Asks for missing logins and passwords on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptCredentials;

impl CredentialProvider for PromptCredentials {
    fn login(&self, settings: &ConnectionSettings) -> Result<String> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "Login for {} ({}): ", settings.name, settings.domain)?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let login = line.trim().to_string();
        if login.is_empty() {
            return Err(Error::Credential(format!("{}: empty login", settings.name)));
        }
        Ok(login)
    }

    fn password(&self, settings: &ConnectionSettings) -> Result<String> {
        let password = rpassword::prompt_password(format!(
            "Password for {} ({}): ",
            settings.name, settings.domain
        ))?;
        if password.is_empty() {
            return Err(Error::Credential(format!("{}: empty password", settings.name)));
        }
        Ok(password)
    }
}

/// Reads bearer tokens from `oauth-data`.
///
/// `access_token` holds the token itself, `access_token_env` names an
/// environment variable holding it. Acquiring or refreshing tokens is left
/// to whatever writes them there.
#[derive(Debug, Clone, Copy, Default)]
pub struct OAuthDataTokens;

impl TokenProvider for OAuthDataTokens {
    fn bearer_token(&self, settings: &ConnectionSettings) -> Result<String> {
        let data = settings
            .oauth_data
            .as_ref()
            .ok_or_else(|| {
                Error::Credential(format!("{}: no oauth-data configured", settings.name))
            })?;

        if let Some(token) = data.get("access_token").and_then(Value::as_str) {
            return Ok(token.to_string());
        }
        if let Some(var) = data.get("access_token_env").and_then(Value::as_str) {
            return std::env::var(var).map_err(|e| {
                Error::Credential(format!("{}: ${var}: {e}", settings.name))
            });
        }
        Err(Error::Credential(format!(
            "{}: oauth-data has neither access_token nor access_token_env",
            settings.name
        )))
    }
}
