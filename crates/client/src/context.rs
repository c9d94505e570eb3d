//! Application context: constructs and wires every component in order.
//!
//! Construction order matters. The persistence gateway opens first so its
//! snapshot can seed the token cell and both stores before any request can
//! leave the process; the pipeline's unauthorized handler is installed last,
//! once the session manager exists to receive it.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::catalog::CatalogClient;
use crate::config::ClientConfig;
use crate::error::InitError;
use crate::events::{SharedNotifier, TracingNotifier};
use crate::http::{InvalidationGuard, RequestPipeline, TokenCell};
use crate::orders::OrdersClient;
use crate::persist::PersistenceGateway;
use crate::session::SessionManager;
use crate::store::cart::CartStore;
use crate::store::wishlist::WishlistStore;
use crate::theme::ThemeManager;

/// The fully wired client.
///
/// Cheap to clone; all clones share the same components.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: ClientConfig,
    persistence: PersistenceGateway,
    pipeline: RequestPipeline,
    session: SessionManager,
    cart: CartStore,
    wishlist: WishlistStore,
    catalog: CatalogClient,
    orders: OrdersClient,
    theme: ThemeManager,
}

impl AppContext {
    /// Build a context from environment configuration with the default
    /// logging notifier.
    ///
    /// # Errors
    ///
    /// Returns an [`InitError`] if configuration, the state directory, or
    /// the HTTP client cannot be set up.
    pub fn init() -> Result<Self, InitError> {
        Self::init_with(ClientConfig::from_env()?, Arc::new(TracingNotifier))
    }

    /// Build a context from explicit configuration and notifier.
    ///
    /// Restores persisted state, seeds the token cell and both collection
    /// stores from the snapshot, and leaves the session `Authenticating`
    /// when a credential was restored. Callers follow up with
    /// [`SessionManager::bootstrap`] to validate it.
    ///
    /// # Errors
    ///
    /// Returns an [`InitError`] if the state directory or HTTP client
    /// cannot be set up.
    #[instrument(skip_all, fields(api_base = %config.api_base))]
    pub fn init_with(config: ClientConfig, notifier: SharedNotifier) -> Result<Self, InitError> {
        let persistence = PersistenceGateway::open(&config.state_dir)?;
        let snapshot = persistence.restore();

        let token = TokenCell::new();
        if let Some(restored) = persistence.read_token() {
            token.set(restored);
        }

        let guard = Arc::new(InvalidationGuard::new());
        let pipeline = RequestPipeline::new(&config, token.clone(), guard, notifier)?;

        let cart = CartStore::new(pipeline.clone(), persistence.clone());
        cart.hydrate(snapshot.cart);
        let wishlist = WishlistStore::new(pipeline.clone(), persistence.clone());
        wishlist.hydrate(snapshot.wishlist);

        let theme = ThemeManager::new(persistence.clone(), snapshot.theme);
        let catalog = CatalogClient::new(pipeline.clone());
        let orders = OrdersClient::new(pipeline.clone());

        let session = SessionManager::new(
            pipeline.clone(),
            persistence.clone(),
            token,
            cart.clone(),
            wishlist.clone(),
        );
        pipeline.set_unauthorized_handler(session.invalidation_handler());

        info!(
            status = ?session.status(),
            "application context initialized"
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                persistence,
                pipeline,
                session,
                cart,
                wishlist,
                catalog,
                orders,
                theme,
            }),
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The session manager.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// The cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// The wishlist store.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    /// The product catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// The orders client.
    #[must_use]
    pub fn orders(&self) -> &OrdersClient {
        &self.inner.orders
    }

    /// The theme manager.
    #[must_use]
    pub fn theme(&self) -> &ThemeManager {
        &self.inner.theme
    }

    /// The durable-state gateway.
    #[must_use]
    pub fn persistence(&self) -> &PersistenceGateway {
        &self.inner.persistence
    }

    /// The request pipeline. Exposed for callers that need raw endpoint
    /// access beyond the typed clients.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    /// Return the whole context to the anonymous empty state: session,
    /// credential, cart, and wishlist. Theme preference is kept; it is not
    /// tied to an account.
    pub fn reset(&self) {
        self.inner.session.logout();
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("api_base", &self.inner.config.api_base.as_str())
            .finish_non_exhaustive()
    }
}
