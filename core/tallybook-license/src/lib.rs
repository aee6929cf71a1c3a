//! Licensing and entitlement for Tallybook.
//!
//! This crate handles:
//! - Signing and verifying license tokens (Ed25519)
//! - Activating tokens, with at most one active license record at a time
//! - Answering "is this installation entitled right now?" on every read
//! - Minting trial tokens
//!
//! # Design Principles
//!
//! - **Signature, not expiry, in the codec**: the codec accepts expired tokens
//!   so the service can say *why* a license is inactive
//! - **Lazy expiry**: validity is recomputed against the clock on each status
//!   read; nothing runs in the background
//! - **Fail closed on reads, fail hard on writes**: a storage outage reports
//!   "unlicensed" for status, but propagates for activation
//!
//! # Token Format
//!
//! Tokens are formatted as: `base64url(payload).base64url(signature)`
//! The payload is the claim serialized as compact JSON with a fixed field
//! order; the signature covers the base64url payload text.
//!
//! Rotating the signing key invalidates every token issued under the old key.
//! A stored record whose token no longer verifies is reported with reason
//! `invalid_token`.

mod claim;
mod codec;
mod config;
mod error;
mod record;
mod service;
mod store;

pub use claim::{days_remaining, LicenseClaim, LicenseClass, SECONDS_PER_DAY};
pub use codec::LicenseCodec;
pub use config::LicenseConfig;
pub use error::{DecodeError, LicenseError, LicenseResult};
pub use record::{LicenseRecord, RecordStatus};
pub use service::{ActivationResult, EntitlementService, InactiveReason, LicenseStatusReport};
pub use store::{LicenseStore, MemoryLicenseStore};
