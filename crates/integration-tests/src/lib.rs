//! Integration test harness for the Copperleaf client.
//!
//! Each test gets a [`TestHarness`]: a `wiremock` server standing in for
//! the storefront service, a temporary state directory, and a fully wired
//! [`AppContext`] pointing at both. The harness notifier records every
//! notice and navigation so tests can assert on side effects.
//!
//! # Test Categories
//!
//! - `session_flow` - login, bootstrap, and invalidation
//! - `pipeline_errors` - error classification and notification dispatch
//! - `cart_sync` - optimistic mutations and server reconciliation
//! - `persistence` - state survival across simulated process restarts

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::TempDir;
use wiremock::MockServer;

use copperleaf_client::events::{Notice, Notifier, Surface};
use copperleaf_client::persist::PersistenceGateway;
use copperleaf_client::{AppContext, ClientConfig};

// =============================================================================
// Recording notifier
// =============================================================================

/// Notifier that records everything and lets tests move the shopper between
/// surfaces.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    navigations: Mutex<Vec<Surface>>,
    surface: Mutex<Option<Surface>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices shown so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All navigation requests so far.
    #[must_use]
    pub fn navigations(&self) -> Vec<Surface> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Simulate the shopper being on a given surface.
    pub fn set_surface(&self, surface: Surface) {
        *self.surface.lock().unwrap_or_else(PoisonError::into_inner) = Some(surface);
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }

    fn navigate(&self, surface: Surface) {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(surface);
        self.set_surface(surface);
    }

    fn current_surface(&self) -> Surface {
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(Surface::Storefront)
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A mock service, a scratch state directory, and a wired client.
pub struct TestHarness {
    pub server: MockServer,
    pub context: AppContext,
    pub notifier: Arc<RecordingNotifier>,
    state_dir: TempDir,
}

impl TestHarness {
    /// Start with an empty state directory.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start after seeding persisted state, e.g. a stored session token.
    pub async fn start_with(seed: impl FnOnce(&PersistenceGateway)) -> Self {
        init_tracing();
        let server = MockServer::start().await;
        let state_dir = tempfile::tempdir().expect("create state dir");
        {
            let gateway =
                PersistenceGateway::open(state_dir.path()).expect("open seed gateway");
            seed(&gateway);
        }
        let (context, notifier) = build_context(&server, state_dir.path());
        Self {
            server,
            context,
            notifier,
            state_dir,
        }
    }

    /// Start with a tweaked configuration, e.g. a short request timeout.
    pub async fn start_configured(adjust: impl FnOnce(&mut ClientConfig)) -> Self {
        init_tracing();
        let server = MockServer::start().await;
        let state_dir = tempfile::tempdir().expect("create state dir");
        let mut config = ClientConfig::with_base(&format!("{}/api", server.uri()), state_dir.path())
            .expect("valid test config");
        adjust(&mut config);
        let notifier = Arc::new(RecordingNotifier::new());
        let context = AppContext::init_with(config, notifier.clone()).expect("context init");
        Self {
            server,
            context,
            notifier,
            state_dir,
        }
    }

    /// Simulate a process restart: drop the context and rebuild it over the
    /// same state directory and mock server. The notifier starts fresh.
    #[must_use]
    pub fn restart(self) -> Self {
        let Self {
            server, state_dir, ..
        } = self;
        let (context, notifier) = build_context(&server, state_dir.path());
        Self {
            server,
            context,
            notifier,
            state_dir,
        }
    }

    /// A gateway over the harness state directory, for asserting on what
    /// actually hit disk.
    #[must_use]
    pub fn gateway(&self) -> PersistenceGateway {
        PersistenceGateway::open(self.state_dir.path()).expect("open gateway")
    }
}

/// Route logs through the test harness; `RUST_LOG` controls verbosity.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn build_context(server: &MockServer, state_dir: &Path) -> (AppContext, Arc<RecordingNotifier>) {
    let config = ClientConfig::with_base(&format!("{}/api", server.uri()), state_dir)
        .expect("valid test config");
    let notifier = Arc::new(RecordingNotifier::new());
    let context = AppContext::init_with(config, notifier.clone()).expect("context init");
    (context, notifier)
}

// =============================================================================
// Response builders
// =============================================================================

/// Wrap a payload in the service's success envelope.
#[must_use]
pub fn ok_envelope(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "success": true, "data": data })
}

/// The service's error body.
#[must_use]
pub fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({ "success": false, "message": message })
}

/// A minimal full product record.
#[must_use]
pub fn product_json(id: &str, name: &str, price: f64) -> serde_json::Value {
    serde_json::json!({
        "_id": id,
        "name": name,
        "price": price,
        "stock": 10,
        "isActive": true
    })
}

/// A cart body with one line.
#[must_use]
pub fn cart_json(id: &str, name: &str, price: f64, quantity: u32) -> serde_json::Value {
    serde_json::json!({
        "items": [
            { "product": product_json(id, name, price), "quantity": quantity, "price": price }
        ],
        "totalItems": quantity,
        "totalPrice": price * f64::from(quantity)
    })
}

/// An identity record.
#[must_use]
pub fn identity_json(id: &str, name: &str, email: &str) -> serde_json::Value {
    serde_json::json!({ "_id": id, "name": name, "email": email })
}
