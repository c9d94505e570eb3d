//! Theme state.
//!
//! The preference is a whitelisted persisted partition; the effective scheme
//! is derived and never stored.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use copperleaf_core::{ColorScheme, ThemePreference};

use crate::persist::PersistenceGateway;

/// The persisted theme partition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ThemeState {
    /// The shopper's stored choice.
    pub preference: ThemePreference,
    /// Last observed host scheme, used to resolve `System`.
    pub system: ColorScheme,
}

impl ThemeState {
    /// The concrete scheme to render.
    #[must_use]
    pub const fn effective(self) -> ColorScheme {
        self.preference.resolve(self.system)
    }
}

/// Theme manager: holds the current state and persists preference changes.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ThemeManager {
    inner: Arc<ThemeManagerInner>,
}

struct ThemeManagerInner {
    state: Mutex<ThemeState>,
    persistence: PersistenceGateway,
}

impl ThemeManager {
    /// Create a manager starting from the given (usually restored) state.
    #[must_use]
    pub fn new(persistence: PersistenceGateway, initial: ThemeState) -> Self {
        Self {
            inner: Arc::new(ThemeManagerInner {
                state: Mutex::new(initial),
                persistence,
            }),
        }
    }

    /// Current theme state.
    #[must_use]
    pub fn state(&self) -> ThemeState {
        *self.lock()
    }

    /// The concrete scheme to render.
    #[must_use]
    pub fn effective(&self) -> ColorScheme {
        self.state().effective()
    }

    /// Store an explicit preference and persist the partition.
    pub fn set_preference(&self, preference: ThemePreference) {
        let state = {
            let mut state = self.lock();
            state.preference = preference;
            *state
        };
        self.inner.persistence.save_theme(&state);
    }

    /// Record the host system's scheme. Persisted so a `System` preference
    /// resolves correctly before the host reports again next start.
    pub fn set_system_scheme(&self, system: ColorScheme) {
        let state = {
            let mut state = self.lock();
            state.system = system;
            *state
        };
        self.inner.persistence.save_theme(&state);
    }

    /// Cycle the preference: light, dark, system.
    pub fn toggle(&self) {
        let next = self.state().preference.toggled();
        self.set_preference(next);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThemeState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ThemeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
