//! Credential loading.
//!
//! Remote backends need either a long-lived access token or a refresh token
//! plus the app key/secret used to mint short-lived access tokens. Where those
//! strings come from is somebody else's business: anything implementing
//! [`CredentialSource`] will do.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fmt;
use std::path::{Path, PathBuf};

/// Secrets used to authenticate against the remote.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    RefreshToken {
        refresh_token: String,
        app_key: String,
        app_secret: String,
    },
}
// Never print secrets, not even at trace level.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("Credentials::AccessToken(<redacted>)"),
            Self::RefreshToken { app_key, .. } => {
                f.debug_struct("Credentials::RefreshToken").field("app_key", app_key).finish_non_exhaustive()
            },
        }
    }
}

/// Anything that can hand out [`Credentials`].
pub trait CredentialSource: Send + Sync {
    /// Returns [`Credentials`](ErrorKind::Credentials) if nothing usable is
    /// available.
    fn credentials(&self) -> Result<Credentials>;
}

impl CredentialSource for Credentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

/// A secret given either inline or as a path to a file containing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Inline(String),
    File(PathBuf),
}
impl Secret {
    fn read(&self) -> Result<Option<String>> {
        let value = match self {
            Self::Inline(value) => value.trim().to_string(),
            Self::File(path) => match std::fs::read_to_string(path) {
                Ok(contents) => contents.trim().to_string(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(e).or_raise(|| ErrorKind::Credentials(format!("unable to read {}", path.display())));
                },
            },
        };
        Ok((!value.is_empty()).then_some(value))
    }
}

/// Credentials assembled from individual secrets.
///
/// A complete refresh-token triple wins over an access token; otherwise the
/// access token is used. Missing files are treated the same as absent secrets.
#[derive(Debug, Clone, Default)]
pub struct SecretSet {
    pub access_token: Option<Secret>,
    pub refresh_token: Option<Secret>,
    pub app_key: Option<Secret>,
    pub app_secret: Option<Secret>,
}
impl SecretSet {
    pub fn access_token_file(path: impl AsRef<Path>) -> Self {
        Self {
            access_token: Some(Secret::File(path.as_ref().to_path_buf())),
            ..Self::default()
        }
    }

    fn read(secret: &Option<Secret>) -> Result<Option<String>> {
        secret.as_ref().map(Secret::read).transpose().map(Option::flatten)
    }
}

impl CredentialSource for SecretSet {
    fn credentials(&self) -> Result<Credentials> {
        let refresh = (
            Self::read(&self.refresh_token)?,
            Self::read(&self.app_key)?,
            Self::read(&self.app_secret)?,
        );
        match refresh {
            (Some(refresh_token), Some(app_key), Some(app_secret)) => {
                return Ok(Credentials::RefreshToken { refresh_token, app_key, app_secret });
            },
            (Some(_), _, _) => {
                tracing::warn!("Refresh token configured without app key/secret; falling back to access token");
            },
            _ => {},
        }
        match Self::read(&self.access_token)? {
            Some(token) => Ok(Credentials::AccessToken(token)),
            None => exn::bail!(ErrorKind::Credentials("no access token or refresh token configured".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_from_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.txt");
        std::fs::write(&path, "  sl.abc123\n").unwrap();
        let creds = SecretSet::access_token_file(&path).credentials().unwrap();
        assert_eq!(creds, Credentials::AccessToken("sl.abc123".to_string()));
    }

    #[test]
    fn test_missing_file_is_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SecretSet::access_token_file(dir.path().join("nope.txt")).credentials().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Credentials(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_refresh_triple_wins() {
        let set = SecretSet {
            access_token: Some(Secret::Inline("short-lived".to_string())),
            refresh_token: Some(Secret::Inline("refresh".to_string())),
            app_key: Some(Secret::Inline("key".to_string())),
            app_secret: Some(Secret::Inline("secret".to_string())),
        };
        assert_eq!(
            set.credentials().unwrap(),
            Credentials::RefreshToken {
                refresh_token: "refresh".to_string(),
                app_key: "key".to_string(),
                app_secret: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_incomplete_refresh_falls_back() {
        let set = SecretSet {
            access_token: Some(Secret::Inline("token".to_string())),
            refresh_token: Some(Secret::Inline("refresh".to_string())),
            ..SecretSet::default()
        };
        assert_eq!(set.credentials().unwrap(), Credentials::AccessToken("token".to_string()));
    }

    #[test]
    fn test_debug_redacts() {
        let debug = format!("{:?}", Credentials::AccessToken("super-secret".to_string()));
        assert!(!debug.contains("super-secret"));
    }
}
