use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::forwarding::ForwardingClient;
use crate::settings::{
    SecretStore, SettingsError, SettingsStore, EMAIL_KEY, PASSWORD_KEY, SEALED_PASSWORD_KEY,
};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No Otter email configured")]
    MissingEmail,
    #[error("No Otter password configured")]
    MissingPassword,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Failed to seal password: {0}")]
    Sealing(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Plain(String),
    /// Ciphertext produced by the forwarding service's `ENCRYPT_PASSWORD`.
    Sealed(String),
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Password::Plain(_) => f.write_str("Plain(<redacted>)"),
            Password::Sealed(_) => f.write_str("Sealed(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCredentials {
    pub email: String,
    pub password: Password,
}

/// Where the importer reads its Otter credentials from. The variant is fixed
/// when the source is built.
#[derive(Clone)]
pub enum CredentialSource {
    /// Legacy layout: email and password both in the settings.
    PlaintextSettings { settings: Arc<dyn SettingsStore> },
    /// Email in the settings, sealed password in the local secret store.
    SealedToken {
        settings: Arc<dyn SettingsStore>,
        secrets: Arc<dyn SecretStore>,
    },
}

impl CredentialSource {
    /// Prefers the sealed token. Falls back to a plaintext password left in the
    /// settings, warning that it should be sealed.
    pub async fn detect(
        settings: Arc<dyn SettingsStore>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self, CredentialError> {
        if secrets.get_secret(SEALED_PASSWORD_KEY).await?.is_some() {
            return Ok(CredentialSource::SealedToken { settings, secrets });
        }

        let has_plaintext = settings
            .get_string(PASSWORD_KEY)
            .await?
            .is_some_and(|p| !p.is_empty());
        if has_plaintext {
            warn!(
                "Otter password is stored in plain text in the settings. \
                 Run `otter-importer seal-password` to store it sealed on this device instead"
            );
            return Ok(CredentialSource::PlaintextSettings { settings });
        }

        Ok(CredentialSource::SealedToken { settings, secrets })
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, CredentialSource::SealedToken { .. })
    }

    pub async fn credentials(&self) -> Result<ImportCredentials, CredentialError> {
        let (settings, password) = match self {
            CredentialSource::PlaintextSettings { settings } => {
                let password = settings.get_string(PASSWORD_KEY).await?;
                (settings, password.map(Password::Plain))
            }
            CredentialSource::SealedToken { settings, secrets } => {
                let sealed = secrets.get_secret(SEALED_PASSWORD_KEY).await?;
                (settings, sealed.map(Password::Sealed))
            }
        };

        let email = settings
            .get_string(EMAIL_KEY)
            .await?
            .filter(|e| !e.trim().is_empty())
            .ok_or(CredentialError::MissingEmail)?;

        let password = password
            .filter(|p| match p {
                Password::Plain(s) | Password::Sealed(s) => !s.is_empty(),
            })
            .ok_or(CredentialError::MissingPassword)?;

        Ok(ImportCredentials { email, password })
    }
}

/// Seals the plaintext password through the forwarding service, stores the
/// result in the secret store and removes the plaintext from the settings.
pub async fn seal_plaintext_password(
    forwarding: &ForwardingClient,
    settings: Arc<dyn SettingsStore>,
    secrets: Arc<dyn SecretStore>,
) -> Result<CredentialSource, CredentialError> {
    let email = settings
        .get_string(EMAIL_KEY)
        .await?
        .filter(|e| !e.trim().is_empty())
        .ok_or(CredentialError::MissingEmail)?;
    let password = settings
        .get_string(PASSWORD_KEY)
        .await?
        .filter(|p| !p.is_empty())
        .ok_or(CredentialError::MissingPassword)?;

    let sealed = forwarding
        .encrypt_password(&email, &password)
        .await
        .map_err(|e| CredentialError::Sealing(e.message))?;

    secrets.set_secret(SEALED_PASSWORD_KEY, &sealed.output).await?;
    settings.remove(PASSWORD_KEY).await?;

    info!("Sealed Otter password with key {}", sealed.token);
    Ok(CredentialSource::SealedToken { settings, secrets })
}
