//! Social Sign-In Core - Shared identity types.
//!
//! This crate provides the types that flow through a social sign-in:
//! - [`IdentityClaim`] - what a single provider sign-in asserts about a user
//! - [`UserProfile`] - the durable, merged record keyed by the backend uid
//! - [`CredentialState`] - provider-reported validity of a stored credential
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. Normalization, reconciliation and the sign-in pipeline live in the
//! `social-signin` crate and consume these types.
//!
//! # Modules
//!
//! - [`types`] - Providers, type-safe ids, emails, claims and profiles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
