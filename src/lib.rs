//! Best-effort position acquisition.
//!
//! A [`Resolver`](location::Resolver) answers from a single cached record when
//! it is fresh enough, and otherwise asks its providers, either one after the
//! other or all at once.

pub mod config;
pub mod global;
pub mod location;
