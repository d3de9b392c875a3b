//! Credential resolution and request authorization.
//!
//! A credential is either an API key (sent as the `key` query parameter) or
//! an OAuth access token (sent as `Authorization: Bearer`). Which one a raw
//! string is gets decided by its prefix, so every request derived from the
//! same string uses the same transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

use crate::config::Settings;
use crate::sanitize::mask_secret;
use crate::secrets::{resolve_secret_optional, SecretError};

/// Google OAuth access tokens start with this prefix.
pub const BEARER_TOKEN_PREFIX: &str = "ya29.";

#[derive(Debug, Clone)]
pub enum Credential {
    ApiKey(SecretString),
    BearerToken(SecretString),
}

impl Credential {
    /// Classifies a raw key or token. Blank input yields `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let secret = SecretString::from(raw.to_string());
        if raw.starts_with(BEARER_TOKEN_PREFIX) {
            Some(Credential::BearerToken(secret))
        } else {
            Some(Credential::ApiKey(secret))
        }
    }

    pub fn is_bearer(&self) -> bool {
        matches!(self, Credential::BearerToken(_))
    }

    /// Attaches this credential to a request.
    pub fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::ApiKey(key) => builder.query(&[("key", key.expose_secret())]),
            Credential::BearerToken(token) => builder.bearer_auth(token.expose_secret()),
        }
    }

    /// Masked form safe for logs.
    pub fn masked(&self) -> String {
        match self {
            Credential::ApiKey(key) => format!("key {}", mask_secret(key.expose_secret())),
            Credential::BearerToken(token) => {
                format!("token {}", mask_secret(token.expose_secret()))
            }
        }
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ManualKey,
    StoredToken,
    Session,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionKeyError {
    #[error("Key selection environment not detected.")]
    NotAvailable,

    #[error("Could not open API key selection dialog: {0}")]
    SelectionFailed(String),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Host-provided key selection, e.g. an embedding environment that owns the
/// user's API key.
#[async_trait]
pub trait SessionKeyProvider: Send + Sync {
    /// Whether a key has been selected in the host environment.
    async fn has_selected_key(&self) -> Result<bool, SessionKeyError>;

    /// Prompts the user to select a key.
    async fn open_select_key(&self) -> Result<(), SessionKeyError>;

    /// The selected key, if any.
    fn session_key(&self) -> Option<SecretString>;
}

/// Session provider backed by a key file or an environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    env_var: String,
    key_file: Option<String>,
}

impl EnvKeyProvider {
    pub fn new(env_var: impl Into<String>, key_file: Option<String>) -> Self {
        Self {
            env_var: env_var.into(),
            key_file,
        }
    }

    fn read(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(None, self.key_file.as_deref(), Some(&self.env_var))
    }
}

#[async_trait]
impl SessionKeyProvider for EnvKeyProvider {
    async fn has_selected_key(&self) -> Result<bool, SessionKeyError> {
        Ok(self.read()?.is_some())
    }

    async fn open_select_key(&self) -> Result<(), SessionKeyError> {
        match self.read()? {
            Some(_) => Ok(()),
            None => Err(SessionKeyError::SelectionFailed(format!(
                "set the {} environment variable",
                self.env_var
            ))),
        }
    }

    fn session_key(&self) -> Option<SecretString> {
        match self.read() {
            Ok(key) => key,
            Err(e) => {
                log::warn!("Failed to read session key: {}", e);
                None
            }
        }
    }
}

/// Picks the credential for the next request.
///
/// Precedence: manual key, then the first non-blank stored token, then the
/// session key when the host reports one as selected.
#[derive(Clone, Default)]
pub struct CredentialResolver {
    session: Option<Arc<dyn SessionKeyProvider>>,
}

impl CredentialResolver {
    pub fn new(session: Option<Arc<dyn SessionKeyProvider>>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> Option<&Arc<dyn SessionKeyProvider>> {
        self.session.as_ref()
    }

    pub fn resolve(&self, settings: &Settings, session_selected: bool) -> Option<Credential> {
        self.resolve_with_source(settings, session_selected)
            .map(|(credential, _)| credential)
    }

    pub fn resolve_with_source(
        &self,
        settings: &Settings,
        session_selected: bool,
    ) -> Option<(Credential, CredentialSource)> {
        if let Some(credential) = settings.manual_api_key.as_deref().and_then(Credential::from_raw)
        {
            return Some((credential, CredentialSource::ManualKey));
        }

        if let Some(credential) = settings.api_tokens.iter().find_map(|t| Credential::from_raw(t))
        {
            return Some((credential, CredentialSource::StoredToken));
        }

        if !session_selected {
            return None;
        }

        let key = self.session.as_ref()?.session_key()?;
        Credential::from_raw(key.expose_secret()).map(|c| (c, CredentialSource::Session))
    }
}
