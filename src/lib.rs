//! # Tessera (Email OTP Authentication)
//!
//! `tessera` authenticates users by emailing a short-lived one-time passcode
//! (OTP) and exchanging a verified passcode for a rotating bearer token.
//!
//! ## Challenge lifecycle
//!
//! An account is created lazily on the first OTP request, keyed by the
//! lower-cased email address. A challenge stays open for eight minutes and
//! allows four failed verification attempts; the fourth failure invalidates
//! the challenge and locks the account out of verification for an hour.
//!
//! ## Token rotation
//!
//! A verified OTP mints an opaque bearer token of the form
//! `<email>::<64-hex-secret>`. Every authenticated request atomically swaps
//! the presented token for a fresh one, so each token value authenticates at
//! most one request. The swap is a single conditional `UPDATE ... RETURNING`
//! against the accounts table; concurrent presenters of the same token race on
//! that statement and only one of them observes a match.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
