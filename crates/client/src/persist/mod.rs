//! Durable-state gateway.
//!
//! The browser keeps this state in local storage; here it is a directory
//! with two files: a root JSON snapshot of the whitelisted partitions
//! (session token, cart, wishlist, theme) and a standalone credential key
//! the request pipeline reads at startup. Nothing else is ever persisted -
//! product listings and order history are too large and too volatile.
//!
//! Writes are best-effort and atomic (temp file + rename): a failed write
//! logs and degrades to in-memory state, mirroring storage-quota failures
//! in the browser. `restore` runs once, before anything observes a store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::cart::CartCollection;
use crate::store::wishlist::WishlistCollection;
use crate::theme::ThemeState;

/// Snapshot schema version.
///
/// Partition shapes are not migrated: a snapshot written by a different
/// schema is discarded wholesale at restore.
pub const SNAPSHOT_VERSION: u32 = 1;

const ROOT_FILE: &str = "state.json";
const CREDENTIAL_FILE: &str = "credential";

/// Errors from the durable-state gateway.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The session partition of the persisted root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionPartition {
    /// The opaque bearer token, if a session was active.
    pub token: Option<String>,
}

/// The persisted root: exactly the whitelisted partitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedSnapshot {
    /// Schema version; see [`SNAPSHOT_VERSION`].
    pub version: u32,
    #[serde(default)]
    pub session: SessionPartition,
    #[serde(default)]
    pub cart: CartCollection,
    #[serde(default)]
    pub wishlist: WishlistCollection,
    #[serde(default)]
    pub theme: ThemeState,
}

impl Default for PersistedSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            session: SessionPartition::default(),
            cart: CartCollection::default(),
            wishlist: WishlistCollection::default(),
            theme: ThemeState::default(),
        }
    }
}

/// File-backed gateway for the whitelisted partitions.
///
/// Cheap to clone; all clones share the cached root.
#[derive(Clone)]
pub struct PersistenceGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    root_path: PathBuf,
    credential_path: PathBuf,
    state_dir: PathBuf,
    cached: Mutex<PersistedSnapshot>,
}

impl PersistenceGateway {
    /// Open (and create if needed) the state directory.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the directory cannot be created.
    pub fn open(state_dir: &Path) -> Result<Self, PersistError> {
        std::fs::create_dir_all(state_dir)?;
        Ok(Self {
            inner: Arc::new(GatewayInner {
                root_path: state_dir.join(ROOT_FILE),
                credential_path: state_dir.join(CREDENTIAL_FILE),
                state_dir: state_dir.to_path_buf(),
                cached: Mutex::new(PersistedSnapshot::default()),
            }),
        })
    }

    /// Read the persisted root. Called exactly once during bootstrap,
    /// before the application becomes interactive.
    ///
    /// A missing, unreadable, or version-mismatched snapshot degrades to
    /// the empty one.
    #[must_use]
    pub fn restore(&self) -> PersistedSnapshot {
        let snapshot = match std::fs::read(&self.inner.root_path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedSnapshot>(&bytes) {
                Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => snapshot,
                Ok(snapshot) => {
                    warn!(
                        found = snapshot.version,
                        expected = SNAPSHOT_VERSION,
                        "discarding persisted snapshot with mismatched version"
                    );
                    PersistedSnapshot::default()
                }
                Err(err) => {
                    warn!(error = %err, "discarding unreadable persisted snapshot");
                    PersistedSnapshot::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no persisted snapshot; starting empty");
                PersistedSnapshot::default()
            }
            Err(err) => {
                warn!(error = %err, "failed to read persisted snapshot; starting empty");
                PersistedSnapshot::default()
            }
        };

        *self.lock() = snapshot.clone();
        snapshot
    }

    // =========================================================================
    // Partition writers (best-effort)
    // =========================================================================

    /// Persist the cart partition.
    pub fn save_cart(&self, cart: &CartCollection) {
        self.update(|root| root.cart = cart.clone());
    }

    /// Persist the wishlist partition.
    pub fn save_wishlist(&self, wishlist: &WishlistCollection) {
        self.update(|root| root.wishlist = wishlist.clone());
    }

    /// Persist the theme partition.
    pub fn save_theme(&self, theme: &ThemeState) {
        self.update(|root| root.theme = *theme);
    }

    /// Persist the session-token partition and the standalone credential
    /// key together. `None` clears both.
    pub fn save_session_token(&self, token: Option<&SecretString>) {
        self.update(|root| {
            root.session.token = token.map(|t| t.expose_secret().to_string());
        });
        let result = match token {
            Some(token) => self.write_credential(token),
            None => self.remove_credential(),
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to persist credential key");
        }
    }

    /// Read the standalone credential key.
    #[must_use]
    pub fn read_token(&self) -> Option<SecretString> {
        match std::fs::read_to_string(&self.inner.credential_path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| SecretString::from(trimmed.to_string()))
            }
            Err(_) => None,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn update(&self, mutate: impl FnOnce(&mut PersistedSnapshot)) {
        let root = {
            let mut cached = self.lock();
            mutate(&mut cached);
            cached.clone()
        };
        if let Err(err) = self.write_root(&root) {
            warn!(error = %err, "failed to persist snapshot; continuing in memory");
        }
    }

    fn write_root(&self, root: &PersistedSnapshot) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(root)?;
        self.write_atomic(&self.inner.root_path, &bytes)
    }

    fn write_credential(&self, token: &SecretString) -> Result<(), PersistError> {
        self.write_atomic(
            &self.inner.credential_path,
            token.expose_secret().as_bytes(),
        )
    }

    fn remove_credential(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.inner.credential_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Write via temp file + rename so readers never observe a torn file.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        let mut tmp = NamedTempFile::new_in(&self.inner.state_dir)?;
        std::io::Write::write_all(&mut tmp, bytes)?;
        tmp.persist(path).map_err(|err| PersistError::Io(err.error))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistedSnapshot> {
        self.inner
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("root", &self.inner.root_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::Collection;
    use crate::store::cart::CartMutation;
    use copperleaf_core::{Money, ProductId, ProductSummary, ThemePreference};

    fn sample_cart() -> CartCollection {
        let mut cart = CartCollection::default();
        cart.apply(&CartMutation::Add {
            product: ProductSummary {
                id: ProductId::new("p-1"),
                name: "Mug".into(),
                price: Money::from_cents(1250),
                images: vec![],
                stock: 5,
                is_active: true,
            },
            quantity: 2,
        });
        cart
    }

    #[test]
    fn test_round_trip_reproduces_whitelisted_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::open(dir.path()).unwrap();

        let cart = sample_cart();
        gateway.save_cart(&cart);
        gateway.save_theme(&ThemeState {
            preference: ThemePreference::Dark,
            ..ThemeState::default()
        });
        gateway.save_session_token(Some(&SecretString::from("tok-1")));

        // A second gateway simulates the next process start.
        let reopened = PersistenceGateway::open(dir.path()).unwrap();
        let restored = reopened.restore();
        assert_eq!(restored.cart, cart);
        assert_eq!(restored.theme.preference, ThemePreference::Dark);
        assert_eq!(restored.session.token.as_deref(), Some("tok-1"));
        assert_eq!(restored.wishlist, WishlistCollection::default());
    }

    #[test]
    fn test_restore_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::open(dir.path()).unwrap();
        assert_eq!(gateway.restore(), PersistedSnapshot::default());
    }

    #[test]
    fn test_restore_discards_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::open(dir.path()).unwrap();
        gateway.save_cart(&sample_cart());

        // Tamper with the version field on disk.
        let path = dir.path().join(ROOT_FILE);
        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        value["version"] = serde_json::json!(99);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let reopened = PersistenceGateway::open(dir.path()).unwrap();
        assert_eq!(reopened.restore(), PersistedSnapshot::default());
    }

    #[test]
    fn test_restore_discards_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ROOT_FILE), b"{ not json").unwrap();
        let gateway = PersistenceGateway::open(dir.path()).unwrap();
        assert_eq!(gateway.restore(), PersistedSnapshot::default());
    }

    #[test]
    fn test_credential_key_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::open(dir.path()).unwrap();
        assert!(gateway.read_token().is_none());

        gateway.save_session_token(Some(&SecretString::from("tok-9")));
        assert_eq!(
            gateway.read_token().map(|t| t.expose_secret().to_string()),
            Some("tok-9".to_string())
        );

        gateway.save_session_token(None);
        assert!(gateway.read_token().is_none());
    }
}
