//! Authenticated session abstraction.
//!
//! The engine only sees `SessionProvider`: fetch a URL's bytes, refresh when
//! the session expires. `CurlSession` is the shipped implementation backed by a
//! Netscape cookie file written by the external login flow.

mod gate;
mod http;
mod provider;

pub use gate::RefreshGate;
pub use http::CurlSession;
pub use provider::{RawDocument, SessionError, SessionProvider};
