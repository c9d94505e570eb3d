//! Optimistic collection stores.
//!
//! One pattern, two instantiations ([`cart::CartStore`] and
//! [`wishlist::WishlistStore`]). A store holds an authoritative snapshot of
//! a server-owned collection, applies user mutations locally and
//! synchronously so the UI reflects them with zero latency, then reconciles
//! against the server response: on success the whole snapshot is replaced
//! with the server's representation, on failure the error is recorded and
//! the optimistic change stands until the caller re-fetches.
//!
//! Reconciliation is ordered by monotonic write tickets. Every local write
//! stamps a fresh ticket; a server snapshot is applied only if its ticket is
//! at least the last applied one, so a slow early response can never
//! overwrite state produced by a later operation.

pub mod cart;
pub mod wishlist;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A server-owned collection with compiler-checked mutation kinds.
///
/// Implementors define the full mutation vocabulary as an enum and apply it
/// with an exhaustive match, so adding a mutation kind without a policy is a
/// compile error.
pub trait Collection:
    Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + 'static
{
    /// The domain's mutation vocabulary.
    type Mutation: Send + Sync;

    /// Apply one mutation locally, recomputing any derived aggregates before
    /// returning. Must be total: unknown targets are no-ops, never errors.
    fn apply(&mut self, mutation: &Self::Mutation);
}

/// The observable state of a store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreSnapshot<C> {
    /// The collection as last written (optimistic or server-confirmed).
    pub collection: C,
    /// A full fetch is in flight.
    pub is_loading: bool,
    /// At least one mutation is awaiting reconciliation.
    pub is_updating: bool,
    /// Message of the most recent failed operation, cleared by the next
    /// successful one.
    pub last_error: Option<String>,
}

struct StoreState<C> {
    collection: C,
    pending_fetches: u32,
    pending_updates: u32,
    last_error: Option<String>,
    applied_ticket: u64,
}

impl<C: Collection> Default for StoreState<C> {
    fn default() -> Self {
        Self {
            collection: C::default(),
            pending_fetches: 0,
            pending_updates: 0,
            last_error: None,
            applied_ticket: 0,
        }
    }
}

/// Generic optimistic store core.
///
/// Owns the snapshot and the ticket counter; the domain wrappers own the
/// network calls and persistence.
pub struct OptimisticStore<C: Collection> {
    state: Mutex<StoreState<C>>,
    next_ticket: AtomicU64,
}

impl<C: Collection> OptimisticStore<C> {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Current observable state.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot<C> {
        let state = self.lock();
        StoreSnapshot {
            collection: state.collection.clone(),
            is_loading: state.pending_fetches > 0,
            is_updating: state.pending_updates > 0,
            last_error: state.last_error.clone(),
        }
    }

    /// Replace the collection without touching tickets or flags.
    ///
    /// Used for rehydration before the application becomes interactive.
    pub fn hydrate(&self, collection: C) {
        self.lock().collection = collection;
    }

    /// Begin a full fetch: raises `is_loading`, clears the recorded error,
    /// and returns the ticket the eventual server snapshot must present.
    pub fn begin_fetch(&self) -> u64 {
        let mut state = self.lock();
        let ticket = self.issue_ticket();
        state.pending_fetches += 1;
        state.last_error = None;
        ticket
    }

    /// Apply a mutation optimistically and synchronously.
    ///
    /// Raises `is_updating`, stamps the write ticket, and returns the ticket
    /// together with the post-mutation collection for persistence.
    pub fn apply_local(&self, mutation: &C::Mutation) -> (u64, C) {
        let mut state = self.lock();
        let ticket = self.issue_ticket();
        state.collection.apply(mutation);
        state.pending_updates += 1;
        state.last_error = None;
        state.applied_ticket = ticket;
        (ticket, state.collection.clone())
    }

    /// Reconcile a fetch or mutation response: server state wins outright.
    ///
    /// Returns the applied collection, or `None` when the response is stale
    /// (an operation with a later ticket already wrote) and was dropped.
    pub fn commit(&self, ticket: u64, server: C, kind: WriteKind) -> Option<C> {
        let mut state = self.lock();
        Self::settle(&mut state, kind);
        if ticket < state.applied_ticket {
            tracing::debug!(ticket, applied = state.applied_ticket, "stale response dropped");
            return None;
        }
        state.collection = server;
        state.applied_ticket = ticket;
        state.last_error = None;
        Some(state.collection.clone())
    }

    /// Acknowledge an operation whose response carries no collection body.
    ///
    /// The optimistic state already reflects the mutation; this only lowers
    /// the in-flight flag and clears the error.
    pub fn confirm(&self, kind: WriteKind) -> C {
        let mut state = self.lock();
        Self::settle(&mut state, kind);
        state.last_error = None;
        state.collection.clone()
    }

    /// Record a failed operation.
    ///
    /// The optimistic change is deliberately not rolled back; the
    /// pre-mutation snapshot only returns via a subsequent full fetch.
    pub fn fail(&self, message: String, kind: WriteKind) {
        let mut state = self.lock();
        Self::settle(&mut state, kind);
        state.last_error = Some(message);
    }

    /// Reset to the empty collection (logout, invalidation).
    ///
    /// Stamps a fresh ticket so responses from operations issued before the
    /// reset can no longer write.
    pub fn reset(&self) -> C {
        let mut state = self.lock();
        let ticket = self.issue_ticket();
        state.collection = C::default();
        state.last_error = None;
        state.applied_ticket = ticket;
        state.collection.clone()
    }

    fn settle(state: &mut StoreState<C>, kind: WriteKind) {
        match kind {
            WriteKind::Fetch => state.pending_fetches = state.pending_fetches.saturating_sub(1),
            WriteKind::Mutation => state.pending_updates = state.pending_updates.saturating_sub(1),
        }
    }

    /// Callers hold the state lock, so ticket order matches write order and
    /// `applied_ticket` never regresses.
    fn issue_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Collection> Default for OptimisticStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Which in-flight counter an operation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Fetch,
    Mutation,
}

/// Shared handle alias used by the domain wrappers.
pub(crate) type SharedStore<C> = Arc<OptimisticStore<C>>;
