//! Persistent API token storage for dropsnap.
//!
//! The token lives in its own JSON file (`token.json`) rather than in the
//! configuration file so the configuration can be committed without the
//! credential. The file location follows the same discovery order as the
//! configuration and can be pinned with `DROPSNAP_TOKEN_PATH`.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::ConfigDiscovery;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_NAME: &str = "dropsnap";
const TOKEN_ENV_VAR: &str = "DROPSNAP_TOKEN_PATH";
const TOKEN_FILE_NAME: &str = "token.json";
const TOKEN_DOTFILE_NAME: &str = ".dropsnap-token.json";

/// Errors raised while loading or saving the token file.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// Raised when no token file candidates are available.
    #[error("no token file candidates were discovered")]
    NoCandidates,
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when parsing existing token file content fails.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when no token has been stored yet.
    #[error("no API token stored at {path}; run `dropsnap init` first")]
    Missing {
        /// Path that was consulted.
        path: Utf8PathBuf,
    },
    /// Raised when a token value is unusable.
    #[error("malformed API token: {reason}")]
    Malformed {
        /// Why the token was rejected.
        reason: String,
    },
}

/// Abstraction over token persistence for dependency injection.
pub trait TokenSource {
    /// Returns the stored API token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError`] when the token file is missing, cannot
    /// be read, or holds an unusable value.
    fn load(&self) -> Result<String, TokenStoreError>;
}

/// Reads and writes the token file using the standard discovery order.
#[derive(Clone, Debug)]
pub struct TokenStore {
    discovery: ConfigDiscovery,
}

impl TokenStore {
    /// Builds a token store using the standard dropsnap discovery settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            discovery: ConfigDiscovery::builder(APP_NAME)
                .env_var(TOKEN_ENV_VAR)
                .config_file_name(TOKEN_FILE_NAME)
                .dotfile_name(TOKEN_DOTFILE_NAME)
                .project_file_name(TOKEN_FILE_NAME)
                .build(),
        }
    }

    /// Builds a token store using an explicit discovery configuration.
    #[must_use]
    pub const fn with_discovery(discovery: ConfigDiscovery) -> Self {
        Self { discovery }
    }

    fn resolve_target(&self) -> Result<TokenTarget, TokenStoreError> {
        let candidates = self.discovery.utf8_candidates();
        if candidates.is_empty() {
            return Err(TokenStoreError::NoCandidates);
        }

        for candidate in &candidates {
            if path_exists(candidate)? {
                return Ok(TokenTarget {
                    path: candidate.clone(),
                    exists: true,
                });
            }
        }

        let fallback = candidates
            .last()
            .cloned()
            .ok_or(TokenStoreError::NoCandidates)?;
        Ok(TokenTarget {
            path: fallback,
            exists: false,
        })
    }

    /// Validates and persists `token`, returning the path written to.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError::Malformed`] for unusable tokens and
    /// [`TokenStoreError::Io`] when writing fails.
    pub fn save(&self, token: &str) -> Result<Utf8PathBuf, TokenStoreError> {
        let validated = validate_token(token)?;
        let target = self.resolve_target()?;
        let rendered = serde_json::to_string_pretty(&TokenFile {
            token: validated.to_owned(),
        })
        .map_err(|err| TokenStoreError::Parse {
            path: target.path.clone(),
            message: err.to_string(),
        })?;
        write_file(&target.path, &rendered)?;
        Ok(target.path)
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for TokenStore {
    fn load(&self) -> Result<String, TokenStoreError> {
        let target = self.resolve_target()?;
        if !target.exists {
            return Err(TokenStoreError::Missing { path: target.path });
        }

        let contents = read_file(&target.path)?;
        let file: TokenFile =
            serde_json::from_str(&contents).map_err(|err| TokenStoreError::Parse {
                path: target.path.clone(),
                message: err.to_string(),
            })?;
        validate_token(&file.token).map(str::to_owned)
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct TokenFile {
    token: String,
}

#[derive(Clone, Debug)]
struct TokenTarget {
    path: Utf8PathBuf,
    exists: bool,
}

/// Rejects blank tokens and tokens with embedded whitespace.
///
/// Legacy DigitalOcean tokens were 64 hex characters and current ones are
/// prefixed (`dop_v1_…`), so no length check is applied.
fn validate_token(token: &str) -> Result<&str, TokenStoreError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(TokenStoreError::Malformed {
            reason: String::from("token is empty"),
        });
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(TokenStoreError::Malformed {
            reason: String::from("token contains whitespace"),
        });
    }
    Ok(trimmed)
}

fn split_path(path: &Utf8Path) -> Result<(&Utf8Path, &str), TokenStoreError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| TokenStoreError::Io {
        path: path.to_path_buf(),
        message: String::from("token file path is missing a filename"),
    })?;
    Ok((parent, file_name))
}

fn path_exists(path: &Utf8Path) -> Result<bool, TokenStoreError> {
    let (parent, file_name) = split_path(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| TokenStoreError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(TokenStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn read_file(path: &Utf8Path) -> Result<String, TokenStoreError> {
    let (parent, file_name) = split_path(path)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| TokenStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;
    dir.read_to_string(file_name).map_err(|err| TokenStoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<(), TokenStoreError> {
    let (parent, file_name) = split_path(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| TokenStoreError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| TokenStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;
    dir.write(file_name, contents).map_err(|err| TokenStoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn discovery_for_path(path: &Utf8Path) -> ConfigDiscovery {
        let root = path
            .parent()
            .expect("temp path should have a parent directory");
        ConfigDiscovery::builder(APP_NAME)
            .env_var(TOKEN_ENV_VAR)
            .config_file_name(TOKEN_FILE_NAME)
            .dotfile_name(TOKEN_DOTFILE_NAME)
            .project_file_name(TOKEN_FILE_NAME)
            .clear_project_roots()
            .add_project_root(root)
            .build()
    }

    fn temp_token_path(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().join(TOKEN_FILE_NAME))
            .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()))
    }

    #[rstest]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = temp_token_path(&tmp);
        let store = TokenStore::with_discovery(discovery_for_path(&path));

        let written_path = store
            .save("dop_v1_0123456789abcdef")
            .unwrap_or_else(|err| panic!("save token: {err}"));

        assert_eq!(written_path, path);
        let loaded = store.load().unwrap_or_else(|err| panic!("load token: {err}"));
        assert_eq!(loaded, "dop_v1_0123456789abcdef");
    }

    #[rstest]
    fn save_trims_surrounding_whitespace() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = temp_token_path(&tmp);
        let store = TokenStore::with_discovery(discovery_for_path(&path));

        store
            .save("  dop_v1_abc  \n")
            .unwrap_or_else(|err| panic!("save token: {err}"));

        let loaded = store.load().unwrap_or_else(|err| panic!("load token: {err}"));
        assert_eq!(loaded, "dop_v1_abc");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("dop v1 spaced")]
    fn save_rejects_malformed_tokens(#[case] token: &str) {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = temp_token_path(&tmp);
        let store = TokenStore::with_discovery(discovery_for_path(&path));

        let err = store.save(token).expect_err("malformed token should fail");

        assert!(matches!(err, TokenStoreError::Malformed { .. }));
    }

    #[rstest]
    fn load_without_a_stored_token_reports_missing() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let path = temp_token_path(&tmp);
        let store = TokenStore::with_discovery(discovery_for_path(&path));

        let err = store.load().expect_err("missing token should fail");

        assert!(matches!(err, TokenStoreError::Missing { .. }));
    }
}
