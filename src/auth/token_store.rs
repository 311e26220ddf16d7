//! GitHub access token persisted for the CLI and the HTTP server
//!
//! Written by `login`, read when no token is configured, removed by
//! `logout`. The file is created owner-only (0600) and replaced atomically.

use super::AccessToken;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "copilot-completer";
const TOKEN_FILE: &str = "access_token.json";

/// On-disk record. `format` is bumped when the layout changes.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    format: u32,
    #[serde(flatten)]
    token: AccessToken,
    /// Unix seconds at login
    saved_at: i64,
}

pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    const FORMAT: u32 = 1;

    /// Store under `<data_local_dir>/copilot-completer/`
    pub fn new() -> Result<Self> {
        let base = dirs::data_local_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
            .context("No data directory for the token store")?;

        let dir = base.join(APP_DIR);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create token store directory {:?}", dir))?;

        Ok(Self::at(dir.join(TOKEN_FILE)))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<AccessToken> {
        let raw = std::fs::read(&self.path)
            .with_context(|| format!("Cannot read GitHub token from {:?}", self.path))?;
        let record: TokenRecord = serde_json::from_slice(&raw)
            .with_context(|| format!("{:?} is not a valid token file", self.path))?;

        if record.format > Self::FORMAT {
            anyhow::bail!(
                "{:?} uses token file format {}, this build reads up to {}",
                self.path,
                record.format,
                Self::FORMAT
            );
        }
        Ok(record.token)
    }

    /// Write `token` to a private temp file next to the target, then rename
    /// it over the target. The temp file never outlives a failed save.
    pub fn save(&self, token: &AccessToken) -> Result<()> {
        let record = TokenRecord {
            format: Self::FORMAT,
            token: token.clone(),
            saved_at: chrono::Utc::now().timestamp(),
        };
        let body = serde_json::to_vec_pretty(&record)?;

        let staging = self.path.with_extension("json.tmp");
        let outcome = write_private(&staging, &body).and_then(|()| {
            std::fs::rename(&staging, &self.path)
                .with_context(|| format!("Cannot move token file into {:?}", self.path))
        });

        if outcome.is_err() {
            let _ = std::fs::remove_file(&staging);
            return outcome;
        }

        tracing::debug!("GitHub token saved to {:?}", self.path);
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("GitHub token removed from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Cannot remove {:?}", self.path)),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create (or truncate) `path` readable by the owner only and write `body`
fn write_private(path: &Path, body: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Cannot create {:?}", path))?;

    // A stale temp file from an older build keeps its mode through `open`
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(body)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_token() -> AccessToken {
        AccessToken {
            access_token: "gho_saved".into(),
            token_type: "bearer".into(),
            scope: "read:user".into(),
        }
    }

    #[test]
    fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at(dir.path().join(TOKEN_FILE));
        assert!(!store.exists());

        store.save(&github_token()).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), github_token());

        store.delete().unwrap();
        assert!(!store.exists());
        assert!(store.load().is_err());

        // Deleting twice is fine
        store.delete().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at(dir.path().join(TOKEN_FILE));
        store.save(&github_token()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(TOKEN_FILE);
        // A non-empty directory in the way makes the rename fail
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), "x").unwrap();

        let store = TokenStore::at(target.clone());
        assert!(store.save(&github_token()).is_err());

        assert!(!target.with_extension("json.tmp").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_rejects_newer_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        std::fs::write(
            &path,
            r#"{"format": 9, "access_token": "x", "token_type": "", "scope": "", "saved_at": 0}"#,
        )
        .unwrap();

        let err = TokenStore::at(path).load().unwrap_err();
        assert!(err.to_string().contains("format 9"));
    }
}
