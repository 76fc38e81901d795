//! Social network clients used by tlmirror.
//!
//! Only the Twitter API is implemented: the OAuth 1.0a three-legged handshake, the
//! app-authenticated lookups (users, friend IDs) and the user-authenticated list
//! management that together replicate one account's home timeline as a list.
pub mod twitter;
