//! UI-facing side-effect channel.
//!
//! The core never touches a window or a router. Notifications and navigation
//! requests go through a [`Notifier`] supplied by the embedding UI; the
//! default implementation only logs. The notifier also reports which surface
//! the shopper is currently on, which the pipeline uses to avoid redirecting
//! to the login surface from the login surface.

use std::sync::Arc;

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    /// An error notice.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// An informational notice.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

/// A navigable surface of the storefront UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Login,
    Storefront,
    Cart,
    Checkout,
    Account,
}

/// Sink for side effects the core cannot perform itself.
///
/// Implementations must be cheap and non-blocking; they are called from the
/// pipeline's side-effect stage.
pub trait Notifier: Send + Sync {
    /// Show a transient notification.
    fn notify(&self, notice: Notice);

    /// Request navigation to a surface.
    fn navigate(&self, surface: Surface);

    /// The surface the shopper is currently on.
    fn current_surface(&self) -> Surface;
}

/// Shared notifier handle.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Default notifier: logs through `tracing`, performs no navigation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(message = %notice.message, "notice");
            }
        }
    }

    fn navigate(&self, surface: Surface) {
        tracing::info!(?surface, "navigation requested");
    }

    fn current_surface(&self) -> Surface {
        Surface::Storefront
    }
}
