//! Administrative credential
//!
//! One administrative account whose argon2 hash lives in a password
//! file under the config directory. The file is created with the
//! default password on first run and rewritten atomically on change.

use std::fs;
use std::path::{Path, PathBuf};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use parking_lot::RwLock;

use crate::error::{AuthError, Result};

/// Password assigned when no credential file exists yet
const DEFAULT_PASSWORD: &str = "admin123";

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 4;

/// Stored admin credential with verify/change operations.
pub struct CredentialStore {
    path: PathBuf,
    hash: RwLock<String>,
}

impl CredentialStore {
    /// Load the credential file, creating it with the default password
    /// if missing.
    pub fn load_or_init(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let hash = match fs::read_to_string(&path) {
            Ok(content) => content.trim().to_string(),
            Err(_) => {
                let hash = hash_password(DEFAULT_PASSWORD)?;
                write_atomic(&path, &hash)?;
                tracing::warn!(
                    "created {} with the default password; change it",
                    path.display()
                );
                hash
            }
        };
        Ok(Self {
            path,
            hash: RwLock::new(hash),
        })
    }

    /// Check a password against the stored hash.
    pub fn verify(&self, password: &str) -> Result<bool> {
        verify_password(password, &self.hash.read())
    }

    /// Replace the password after verifying the current one.
    pub fn change(&self, current: &str, new: &str) -> Result<()> {
        if !self.verify(current)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if new.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort(MIN_PASSWORD_LEN).into());
        }
        let hash = hash_password(new)?;
        write_atomic(&self.path, &hash)?;
        *self.hash.write() = hash;
        tracing::info!("admin password changed");
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()).into())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswordHash(format!("stored hash unreadable: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHash(e.to_string()).into()),
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("cast-control-test-{}.txt", uuid::Uuid::new_v4()))
    }

    #[test]
    fn first_run_accepts_default_password() {
        let store = CredentialStore::load_or_init(temp_path()).unwrap();
        assert!(store.verify(DEFAULT_PASSWORD).unwrap());
        assert!(!store.verify("wrong").unwrap());
    }

    #[test]
    fn change_requires_current_password() {
        let store = CredentialStore::load_or_init(temp_path()).unwrap();
        let err = store.change("wrong", "newpassword").unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        assert!(store.verify(DEFAULT_PASSWORD).unwrap());
    }

    #[test]
    fn change_rejects_short_password() {
        let store = CredentialStore::load_or_init(temp_path()).unwrap();
        let err = store.change(DEFAULT_PASSWORD, "abc").unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::PasswordTooShort(_))));
    }

    #[test]
    fn changed_password_persists() {
        let path = temp_path();
        let store = CredentialStore::load_or_init(&path).unwrap();
        store.change(DEFAULT_PASSWORD, "newpassword").unwrap();
        assert!(store.verify("newpassword").unwrap());
        assert!(!store.verify(DEFAULT_PASSWORD).unwrap());

        let reloaded = CredentialStore::load_or_init(&path).unwrap();
        assert!(reloaded.verify("newpassword").unwrap());
    }
}
