//! Core state machine for referral tracking.
//!
//! This crate implements a single-administrator registry in which entities
//! apply to become affiliates, the administrator verifies or disables them,
//! and end users are attributed exactly once, either to a verified affiliate
//! or as organic:
//!
//! * [`address`] — opaque caller identities with a reserved zero sentinel.
//! * [`affiliate`] — the affiliate record and the index-0 genesis sentinel.
//! * [`registry`] — lifecycle and attribution operations plus read queries.
//! * [`snapshot`] — total serializable state with a deterministic digest,
//!   the seam handed to the host environment's durable storage.
//!
//! The crate does no authentication and no I/O of its own. The host
//! establishes who the caller is and passes the address in explicitly; every
//! operation runs synchronously and either commits in full or rejects with a
//! [`RegistryError`] leaving the registry untouched.

pub mod address;
pub mod affiliate;
pub mod registry;
pub mod snapshot;

mod error;

pub use address::{Address, ADDRESS_LEN};
pub use affiliate::{Affiliate, AffiliateIndex, NO_AFFILIATE};
pub use error::RegistryError;
pub use registry::{ReferralRegistry, RegistryEvent};
pub use snapshot::RegistrySnapshot;
