use thiserror::Error;

use crate::address::Address;

/// Canonical rejection type for every registry operation.
///
/// A rejected operation has no side effects: the registry is left exactly as
/// it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An administrator-only operation was invoked by some other caller.
    #[error("caller {caller} is not the administrator")]
    NotAuthorized { caller: Address },

    /// The caller already owns an affiliate record.
    #[error("address {addr} already applied")]
    AlreadyApplied { addr: Address },

    /// The requested affiliate id is taken, or permanently retired by a
    /// withdrawal.
    #[error("affiliate id {id} already exists")]
    DuplicateAffiliateId { id: String },

    /// The supplied id or caller does not resolve to an affiliate record.
    #[error("not a valid affiliate")]
    InvalidAffiliate,

    /// The affiliate exists but is not currently verified.
    #[error("affiliate {id} is not active")]
    AffiliateNotActive { id: String },

    /// Withdrawal attempted while the affiliate is still enabled.
    #[error("affiliate {id} is already enabled")]
    AlreadyEnabled { id: String },

    /// The user is attributed to an affiliate and attribution is permanent.
    #[error("user {addr} is already registered to an affiliate")]
    AlreadyReferred { addr: Address },

    /// The user is flagged organic and attribution is permanent.
    #[error("user {addr} is already registered organically")]
    AlreadyOrganic { addr: Address },

    /// The zero address is reserved as the "no affiliate" sentinel and is
    /// rejected wherever a real address is required.
    #[error("address cannot be the zero address")]
    ZeroAddressNotAllowed,

    /// Input could not be decoded into an address.
    #[error("malformed address: {reason}")]
    MalformedAddress { reason: String },

    /// A snapshot offered for restore is internally inconsistent.
    #[error("corrupt snapshot: {reason}")]
    CorruptSnapshot { reason: String },
}
