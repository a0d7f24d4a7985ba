//! Affiliate records and the genesis sentinel.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Position of an affiliate record in the registry's append-only table.
pub type AffiliateIndex = usize;

/// Index 0 is the genesis sentinel, so a mapping that reads as 0 means
/// "no affiliate".
pub const NO_AFFILIATE: AffiliateIndex = 0;

/// One affiliate record.
///
/// `name` and `id` are fixed at application time. `enabled` is toggled only
/// by the administrator, `addr` may be rotated by the owner, and `total_ref`
/// counts the users attributed to this record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Affiliate {
    pub name: String,
    pub id: String,
    pub enabled: bool,
    pub total_ref: u64,
    pub addr: Address,
}

impl Affiliate {
    /// The sentinel installed at index 0 when a registry is created. It is
    /// permanently disabled and never reachable by id or owner lookups.
    pub fn genesis() -> Self {
        Affiliate {
            name: "Genesis".to_string(),
            id: "genesis".to_string(),
            enabled: false,
            total_ref: 0,
            addr: Address::ZERO,
        }
    }
}
