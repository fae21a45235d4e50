//! Session-lifetime cache for the exported key.
//!
//! The cache holds at most one entry, the `EncodedKey`, and must live only
//! as long as the user's session: an in-process cache for embedders, or a
//! file under the per-login runtime directory for the CLI.  It is never
//! the same storage as the persisted key.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::crypto::{to_base64url, EncodedKey};
use crate::errors::{Result, VaultError};

/// Ephemeral storage for the session key.
pub trait SessionCache {
    fn store(&self, key: &EncodedKey) -> Result<()>;
    fn load(&self) -> Result<Option<EncodedKey>>;
    fn clear(&self) -> Result<()>;
}

/// In-process session cache.  Clones share the slot.
#[derive(Clone, Default)]
pub struct MemorySessionCache {
    slot: Arc<Mutex<Option<EncodedKey>>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<EncodedKey>) -> T) -> Result<T> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| VaultError::CommandFailed("session cache lock poisoned".into()))?;
        Ok(f(&mut slot))
    }
}

impl SessionCache for MemorySessionCache {
    fn store(&self, key: &EncodedKey) -> Result<()> {
        self.with_slot(|slot| *slot = Some(key.clone()))
    }

    fn load(&self) -> Result<Option<EncodedKey>> {
        self.with_slot(|slot| slot.clone())
    }

    fn clear(&self) -> Result<()> {
        self.with_slot(|slot| *slot = None)
    }
}

/// File-backed session cache in a runtime directory.
///
/// Each user gets one owner-only file named after a hash of the user id.
/// Point it at a directory that the OS clears at logout (such as
/// `$XDG_RUNTIME_DIR`) so the cache dies with the session.
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    pub fn new(dir: &Path, user_id: &str) -> Self {
        let digest = Sha256::digest(user_id.as_bytes());
        let name = format!("{}.session", to_base64url(&digest[..16]));
        Self {
            path: dir.join(name),
        }
    }

    /// Default runtime directory: `$XDG_RUNTIME_DIR/housevault`, else the
    /// OS temp dir.
    pub fn default_dir() -> PathBuf {
        std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join("housevault")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionCache for FileSessionCache {
    fn store(&self, key: &EncodedKey) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent)?;
        }

        // Write to a fresh owner-only temp file, then rename over the cache.
        let tmp = self.path.with_extension("session.tmp");
        let mut file = match create_private(&tmp) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Left over from an interrupted write.  Unlinking removes a
                // symlink itself, never its target.
                fs::remove_file(&tmp)?;
                create_private(&tmp)?
            }
            other => other?,
        };
        file.write_all(key.as_str().as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<EncodedKey>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let key = EncodedKey::new(text.trim().to_string());
                Ok((!key.is_empty()).then_some(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create `path` exclusively with mode 0600.  Fails if anything, including
/// a symlink, already sits at `path`.
fn create_private(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Make sure the cache directory exists, is a real directory, and is
/// owner-only.  A pre-existing directory with group or other bits is
/// tightened to 0700; that fails for a directory owned by someone else.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    match fs::symlink_metadata(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o700);
            }
            builder.create(dir)?;
            #[cfg(unix)]
            restrict_dir(dir)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
        Ok(meta) if !meta.file_type().is_dir() => Err(VaultError::CommandFailed(format!(
            "session directory {} is not a directory",
            dir.display()
        ))),
        Ok(_meta) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if _meta.permissions().mode() & 0o077 != 0 {
                    warn!(dir = %dir.display(), "tightening session directory permissions");
                    restrict_dir(dir)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn restrict_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
        VaultError::CommandFailed(format!(
            "session directory {} is shared and cannot be made private: {e}",
            dir.display()
        ))
    })
}
