//! Twitter API integration surface exposed to the web layer.
//!
//! - [`oauth`]: HMAC-SHA1 request signing
//! - [`client`]: app-level calls (bearer token) and the token handshake
//! - [`lists`]: user-context list creation and member batching
//! - [`mirror`]: the end-to-end "copy a timeline into a list" flow
pub mod client;
pub mod lists;
pub mod mirror;
pub mod oauth;
pub mod types;

pub use client::{TwitterApi, TwitterCredentials};
pub use lists::UserClient;
pub use mirror::{ListSettings, MirrorReport, mirror_timeline};
