//! Session middleware configuration.
//!
//! Sets up in-memory sessions using tower-sessions. A session only carries
//! the id of its cart; the cart itself lives in the cart registry.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "zenith_session";

/// Session keys.
pub mod keys {
    /// Key for storing the session's cart id.
    pub const CART_ID: &str = "cart_id";
}

/// Create the session layer with an in-memory store.
///
/// Sessions expire after the configured idle time, matching cart expiry.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    let idle_secs = i64::try_from(config.session_ttl.as_secs()).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(idle_secs),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
