//! Token pair persistence
//!
//! The CLI keeps the user's access/refresh pair in a small JSON file between
//! runs. Writes go to a temp file in the same directory which is then
//! renamed over the target, so a crash never leaves a half-written pair.
//! Writes are synchronous because they run inside the rotation callback.

use std::path::{Path, PathBuf};

use mtd_auth::TokenPair;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored pair. A missing file yields an empty pair (no grant yet).
    pub fn load(&self) -> Result<TokenPair> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file, starting without tokens");
                return Ok(TokenPair::default());
            }
            Err(e) => {
                return Err(Error::TokenFile(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&contents)
            .map_err(|e| Error::TokenFile(format!("parsing {}: {e}", self.path.display())))
    }

    /// Atomically replace the stored pair.
    pub fn save(&self, tokens: &TokenPair) -> Result<()> {
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| Error::TokenFile(format!("serializing tokens: {e}")))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let tmp_path = dir.join(format!(".mtd-tokens.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, json.as_bytes())
            .map_err(|e| Error::TokenFile(format!("writing temp token file: {e}")))?;

        // Set 0600 permissions (unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp_path, perms)
                .map_err(|e| Error::TokenFile(format!("setting token file permissions: {e}")))?;
        }

        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| Error::TokenFile(format!("renaming temp token file: {e}")))?;

        debug!(path = %self.path.display(), "persisted tokens");
        Ok(())
    }
}
