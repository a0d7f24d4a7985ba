//! Total serialized registry state.
//!
//! A [`RegistrySnapshot`] is the seam between the core and the host
//! environment's durable storage: everything a registry holds, in plain
//! serde-friendly fields, plus a deterministic digest over the keyed tables.
//! The digest is a merkle fold over domain-tagged SHA-256 leaves, so two
//! snapshots with equal tables carry equal digests regardless of how they
//! were produced. The event log is advisory history and is not covered.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::affiliate::{Affiliate, AffiliateIndex};
use crate::registry::RegistryEvent;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub revision: u64,
    pub admin: Address,
    pub affiliates: Vec<Affiliate>,
    pub id_to_index: BTreeMap<String, AffiliateIndex>,
    pub owner_to_index: BTreeMap<Address, AffiliateIndex>,
    pub user_to_affiliate: BTreeMap<Address, AffiliateIndex>,
    pub organic_users: BTreeSet<Address>,
    pub retired_ids: BTreeSet<String>,
    pub events: Vec<RegistryEvent>,
    pub state_digest: [u8; 32],
}

impl RegistrySnapshot {
    /// Recompute the digest over the current field values. Covers the admin,
    /// the affiliate table, and every lookup table; excludes the event log,
    /// the revision counter, and the stored digest itself.
    pub fn compute_digest(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();

        let mut hasher = Sha256::new();
        hasher.update(b"admin");
        hasher.update(self.admin.as_bytes());
        leaves.push(hasher.finalize().into());

        for (index, affiliate) in self.affiliates.iter().enumerate() {
            leaves.push(affiliate_leaf(index, affiliate));
        }
        for (id, &index) in &self.id_to_index {
            leaves.push(mapping_leaf(b"id-map", id.as_bytes(), index));
        }
        for (owner, &index) in &self.owner_to_index {
            leaves.push(mapping_leaf(b"owner-map", owner.as_bytes(), index));
        }
        for (user, &index) in &self.user_to_affiliate {
            leaves.push(mapping_leaf(b"user-map", user.as_bytes(), index));
        }
        for user in &self.organic_users {
            let mut hasher = Sha256::new();
            hasher.update(b"organic");
            hasher.update(user.as_bytes());
            leaves.push(hasher.finalize().into());
        }
        for id in &self.retired_ids {
            let mut hasher = Sha256::new();
            hasher.update(b"retired");
            hasher.update((id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
            leaves.push(hasher.finalize().into());
        }
        fold_leaves(leaves)
    }

    /// True when the stored digest matches the recomputed one.
    pub fn verify_digest(&self) -> bool {
        self.compute_digest() == self.state_digest
    }
}

fn affiliate_leaf(index: usize, affiliate: &Affiliate) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"affiliate");
    hasher.update((index as u64).to_le_bytes());
    hasher.update((affiliate.name.len() as u64).to_le_bytes());
    hasher.update(affiliate.name.as_bytes());
    hasher.update((affiliate.id.len() as u64).to_le_bytes());
    hasher.update(affiliate.id.as_bytes());
    hasher.update([affiliate.enabled as u8]);
    hasher.update(affiliate.total_ref.to_le_bytes());
    hasher.update(affiliate.addr.as_bytes());
    hasher.finalize().into()
}

fn mapping_leaf(tag: &[u8], key: &[u8], index: AffiliateIndex) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update((key.len() as u64).to_le_bytes());
    hasher.update(key);
    hasher.update((index as u64).to_le_bytes());
    hasher.finalize().into()
}

fn fold_leaves(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"referral-registry-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(&chunk[0]);
            if chunk.len() == 2 {
                hasher.update(&chunk[1]);
            } else {
                hasher.update(&chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
