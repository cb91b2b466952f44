//! Credential storage for the session token pair
//!
//! Holds the current access/refresh token pair in memory and, when backed by
//! a file, persists every mutation with an atomic temp-file + rename so the
//! session survives a restart. A tokio Mutex serializes writes coming from
//! login, refresh and session loss.
//!
//! Tokens are opaque: nothing here inspects or validates their contents.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The access/refresh token pair. Absent fields mean "not authenticated".
///
/// Serialized with the same keys the web front end keeps in local storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_token: Some(Secret::new(access.into())),
            refresh_token: Some(Secret::new(refresh.into())),
        }
    }

    pub fn access(&self) -> Option<&str> {
        self.access_token.as_ref().map(|s| s.expose().as_str())
    }

    pub fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|s| s.expose().as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Thread-safe credential holder with optional file persistence.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<CredentialPair>,
}

impl CredentialStore {
    /// Load the credential pair from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` (unauthenticated cold
    /// start) so later writes only ever replace an existing file.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let pair: CredentialPair = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                has_access = pair.access_token.is_some(),
                has_refresh = pair.refresh_token.is_some(),
                "loaded credentials"
            );
            pair
        } else {
            info!(path = %path.display(), "credential file not found, starting unauthenticated");
            let pair = CredentialPair::default();
            write_atomic(&path, &pair).await?;
            pair
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// In-memory store with no backing file.
    pub fn ephemeral() -> Self {
        Self::with_pair(CredentialPair::default())
    }

    /// In-memory store seeded with a pair.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            path: None,
            state: Mutex::new(pair),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current pair.
    pub async fn get(&self) -> CredentialPair {
        self.state.lock().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.access().map(str::to_owned)
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.lock().await.refresh().map(str::to_owned)
    }

    /// Replace the whole pair and persist.
    pub async fn set(&self, pair: CredentialPair) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = pair;
        debug!("replaced credential pair");
        self.persist(&state).await
    }

    /// Replace only the access token.
    pub async fn set_access(&self, access: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = Some(Secret::new(access.into()));
        self.persist(&state).await
    }

    /// Store a refreshed access token; the refresh token only changes when
    /// the endpoint rotated it.
    pub async fn update(&self, access: String, refresh: Option<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = Some(Secret::new(access));
        let rotated = refresh.is_some();
        if let Some(refresh) = refresh {
            state.refresh_token = Some(Secret::new(refresh));
        }
        debug!(rotated, "updated access token");
        self.persist(&state).await
    }

    /// Remove both tokens and persist.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = CredentialPair::default();
        debug!("cleared credentials");
        self.persist(&state).await
    }

    /// Remove only the access token and persist.
    pub async fn clear_access(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.access_token.take().is_none() {
            return Ok(());
        }
        debug!("cleared access token");
        self.persist(&state).await
    }

    async fn persist(&self, pair: &CredentialPair) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, pair).await,
            None => Ok(()),
        }
    }
}

/// Write the pair to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over the
/// target. Sets file permissions to 0600 since the file contains tokens.
async fn write_atomic(path: &Path, pair: &CredentialPair) -> Result<()> {
    let json = serde_json::to_string_pretty(pair)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
