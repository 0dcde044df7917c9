//! Session cookie storage for the client role.

use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Url;

/// The only cookie operation the client core performs itself.
pub trait SessionStore: Send + Sync {
    fn clear(&self);
}

/// Internally synchronized cookie jar that can be emptied in place.
///
/// The transport keeps one `Arc` to it for its whole lifetime; clearing
/// swaps the jar contents rather than the store itself.
#[derive(Default)]
pub struct SessionCookies {
    jar: RwLock<Jar>,
}

impl SessionCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie, e.g. a session restored by the application.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        self.jar.read().add_cookie_str(cookie, url);
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.jar.read().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.read().cookies(url)
    }
}

impl SessionStore for SessionCookies {
    fn clear(&self) {
        *self.jar.write() = Jar::default();
        tracing::debug!("session cookies cleared");
    }
}
