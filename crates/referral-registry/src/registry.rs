//! The referral registry state machine.
//!
//! One registry tracks two populations:
//!
//! * affiliates, who apply with a unique id and move through a lifecycle of
//!   applied → verified → disabled/withdrawn under administrator control;
//! * end users, each attributed at most once, either to an affiliate or as
//!   organic.
//!
//! Every state-changing operation takes the authenticated caller as an
//! explicit argument, validates against the current state, and either commits
//! atomically or returns a [`RegistryError`] having changed nothing. There is
//! no partial application: all checks run before the first write.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::affiliate::{Affiliate, AffiliateIndex, NO_AFFILIATE};
use crate::error::RegistryError;
use crate::snapshot::RegistrySnapshot;

/// Audit record appended for every committed transition.
///
/// Idempotent calls that change nothing (re-verifying an enabled affiliate,
/// re-disabling a disabled one) emit no event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    AffiliateApplied {
        index: AffiliateIndex,
        id: String,
        name: String,
        addr: Address,
    },
    AffiliateVerified {
        index: AffiliateIndex,
        id: String,
    },
    AffiliateDisabled {
        index: AffiliateIndex,
        id: String,
    },
    AffiliateAddressChanged {
        index: AffiliateIndex,
        previous: Address,
        updated: Address,
    },
    AffiliateWithdrawn {
        index: AffiliateIndex,
        id: String,
    },
    UserReferred {
        user: Address,
        index: AffiliateIndex,
    },
    UserRegisteredOrganic {
        user: Address,
    },
}

/// Affiliate lifecycle and user attribution state.
///
/// The affiliate table is append-only: records are never removed or reused,
/// withdrawal only unlinks the id and owner lookups. Index 0 always holds the
/// genesis sentinel, which lets every mapping use 0 as "no affiliate".
#[derive(Debug)]
pub struct ReferralRegistry {
    admin: Address,
    affiliates: Vec<Affiliate>,
    id_to_index: BTreeMap<String, AffiliateIndex>,
    owner_to_index: BTreeMap<Address, AffiliateIndex>,
    user_to_affiliate: BTreeMap<Address, AffiliateIndex>,
    organic_users: BTreeSet<Address>,
    retired_ids: BTreeSet<String>,
    events: Vec<RegistryEvent>,
    revision: u64,
}

impl ReferralRegistry {
    /// Create an empty registry administered by `admin`, with the genesis
    /// sentinel installed at index 0.
    pub fn new(admin: Address) -> Self {
        ReferralRegistry {
            admin,
            affiliates: vec![Affiliate::genesis()],
            id_to_index: BTreeMap::new(),
            owner_to_index: BTreeMap::new(),
            user_to_affiliate: BTreeMap::new(),
            organic_users: BTreeSet::new(),
            retired_ids: BTreeSet::new(),
            events: Vec::new(),
            revision: 0,
        }
    }

    // --- affiliate lifecycle -------------------------------------------------

    /// Register `caller` as a pending affiliate under `id` and return the
    /// assigned index.
    ///
    /// The record starts disabled; only [`verify_affiliate`] activates it.
    /// An address owns at most one record, and ids are unique for the life of
    /// the registry, including ids retired by withdrawal.
    ///
    /// [`verify_affiliate`]: ReferralRegistry::verify_affiliate
    pub fn apply_for_affiliate(
        &mut self,
        caller: Address,
        name: &str,
        id: &str,
    ) -> Result<AffiliateIndex, RegistryError> {
        if self.owner_to_index.contains_key(&caller) {
            return Err(RegistryError::AlreadyApplied { addr: caller });
        }
        if self.id_to_index.contains_key(id) || self.retired_ids.contains(id) {
            return Err(RegistryError::DuplicateAffiliateId { id: id.to_string() });
        }
        let index = self.affiliates.len();
        self.affiliates.push(Affiliate {
            name: name.to_string(),
            id: id.to_string(),
            enabled: false,
            total_ref: 0,
            addr: caller,
        });
        self.id_to_index.insert(id.to_string(), index);
        self.owner_to_index.insert(caller, index);
        self.commit(RegistryEvent::AffiliateApplied {
            index,
            id: id.to_string(),
            name: name.to_string(),
            addr: caller,
        });
        Ok(index)
    }

    /// Activate the affiliate registered under `id`. Administrator only.
    ///
    /// Verifying an already enabled affiliate is a no-op.
    pub fn verify_affiliate(&mut self, caller: Address, id: &str) -> Result<(), RegistryError> {
        let index = self.resolve_for_admin(caller, id)?;
        if self.affiliates[index].enabled {
            return Ok(());
        }
        self.affiliates[index].enabled = true;
        self.commit(RegistryEvent::AffiliateVerified {
            index,
            id: id.to_string(),
        });
        Ok(())
    }

    /// Deactivate the affiliate registered under `id`. Administrator only.
    ///
    /// Attribution records of already-referred users are kept; only address
    /// lookups are suppressed while the affiliate stays disabled. Disabling
    /// an already disabled affiliate is a no-op.
    pub fn disable_affiliate(&mut self, caller: Address, id: &str) -> Result<(), RegistryError> {
        let index = self.resolve_for_admin(caller, id)?;
        if !self.affiliates[index].enabled {
            return Ok(());
        }
        self.affiliates[index].enabled = false;
        self.commit(RegistryEvent::AffiliateDisabled {
            index,
            id: id.to_string(),
        });
        Ok(())
    }

    /// Rotate the control address of the caller's affiliate record.
    ///
    /// Ownership moves with the address: subsequent caller-scoped operations
    /// must authenticate as `new_addr`. Re-submitting the current address is
    /// a no-op.
    pub fn change_affiliate_address(
        &mut self,
        caller: Address,
        new_addr: Address,
    ) -> Result<(), RegistryError> {
        let index = match self.owner_to_index.get(&caller) {
            Some(&index) => index,
            None => return Err(RegistryError::InvalidAffiliate),
        };
        if new_addr.is_zero() {
            return Err(RegistryError::ZeroAddressNotAllowed);
        }
        if new_addr == caller {
            return Ok(());
        }
        if self.owner_to_index.contains_key(&new_addr) {
            return Err(RegistryError::AlreadyApplied { addr: new_addr });
        }
        self.owner_to_index.remove(&caller);
        self.owner_to_index.insert(new_addr, index);
        self.affiliates[index].addr = new_addr;
        self.commit(RegistryEvent::AffiliateAddressChanged {
            index,
            previous: caller,
            updated: new_addr,
        });
        Ok(())
    }

    /// Retire the caller's affiliate record. Permitted only while the record
    /// is disabled (never verified, or verified and then disabled).
    ///
    /// The slot itself is kept so user attributions stay intact, but the id
    /// and owner lookups are unlinked and the id is retired for good.
    pub fn withdraw_affiliate(&mut self, caller: Address) -> Result<(), RegistryError> {
        let index = match self.owner_to_index.get(&caller) {
            Some(&index) => index,
            None => return Err(RegistryError::InvalidAffiliate),
        };
        if self.affiliates[index].enabled {
            return Err(RegistryError::AlreadyEnabled {
                id: self.affiliates[index].id.clone(),
            });
        }
        let id = self.affiliates[index].id.clone();
        self.id_to_index.remove(&id);
        self.owner_to_index.remove(&caller);
        self.retired_ids.insert(id.clone());
        self.commit(RegistryEvent::AffiliateWithdrawn { index, id });
        Ok(())
    }

    // --- user attribution ----------------------------------------------------

    /// Attribute `user` to the affiliate registered under `id` and bump its
    /// referral count.
    ///
    /// Requires an enabled affiliate and a user with no prior attribution of
    /// either kind; an existing organic flag is reported even while the
    /// affiliate is still pending verification. The attribution is permanent.
    pub fn register_referred_user(
        &mut self,
        user: Address,
        id: &str,
    ) -> Result<(), RegistryError> {
        let index = match self.id_to_index.get(id) {
            Some(&index) => index,
            None => return Err(RegistryError::InvalidAffiliate),
        };
        if self.organic_users.contains(&user) {
            return Err(RegistryError::AlreadyOrganic { addr: user });
        }
        if !self.affiliates[index].enabled {
            return Err(RegistryError::AffiliateNotActive { id: id.to_string() });
        }
        if self.user_affiliate_index(user) != NO_AFFILIATE {
            return Err(RegistryError::AlreadyReferred { addr: user });
        }
        self.user_to_affiliate.insert(user, index);
        self.affiliates[index].total_ref += 1;
        self.commit(RegistryEvent::UserReferred { user, index });
        Ok(())
    }

    /// Flag `user` as organic, permanently excluding every affiliate
    /// attribution. Registering the same user twice is rejected, not ignored.
    pub fn register_organic_user(&mut self, user: Address) -> Result<(), RegistryError> {
        if self.user_affiliate_index(user) != NO_AFFILIATE {
            return Err(RegistryError::AlreadyReferred { addr: user });
        }
        if self.organic_users.contains(&user) {
            return Err(RegistryError::AlreadyOrganic { addr: user });
        }
        self.organic_users.insert(user);
        self.commit(RegistryEvent::UserRegisteredOrganic { user });
        Ok(())
    }

    // --- read queries --------------------------------------------------------

    /// True when `user` was explicitly registered as organic.
    pub fn is_user_organic(&self, user: Address) -> bool {
        self.organic_users.contains(&user)
    }

    /// Current payable address of the affiliate `user` is attributed to.
    ///
    /// Returns [`Address::ZERO`] for unattributed and organic users, and for
    /// referred users whose affiliate is currently disabled. The underlying
    /// attribution is kept either way.
    pub fn get_affiliate_address(&self, user: Address) -> Address {
        let index = self.user_affiliate_index(user);
        if index == NO_AFFILIATE {
            return Address::ZERO;
        }
        let affiliate = &self.affiliates[index];
        if affiliate.enabled {
            affiliate.addr
        } else {
            Address::ZERO
        }
    }

    /// Whether `id` resolves to an enabled affiliate. Unknown and withdrawn
    /// ids read as disabled rather than erroring.
    pub fn is_affiliate_enabled(&self, id: &str) -> bool {
        match self.id_to_index.get(id) {
            Some(&index) => self.affiliates[index].enabled,
            None => false,
        }
    }

    /// Index registered under `id`, or [`NO_AFFILIATE`] when the id is
    /// unknown or withdrawn.
    pub fn affiliate_index(&self, id: &str) -> AffiliateIndex {
        self.id_to_index.get(id).copied().unwrap_or(NO_AFFILIATE)
    }

    /// Index of the affiliate `user` is attributed to, or [`NO_AFFILIATE`].
    pub fn user_affiliate_index(&self, user: Address) -> AffiliateIndex {
        self.user_to_affiliate
            .get(&user)
            .copied()
            .unwrap_or(NO_AFFILIATE)
    }

    /// Index of the affiliate owned by `caller`, or [`NO_AFFILIATE`].
    pub fn caller_affiliate_index(&self, caller: Address) -> AffiliateIndex {
        self.owner_to_index
            .get(&caller)
            .copied()
            .unwrap_or(NO_AFFILIATE)
    }

    /// Record stored at `index`. Index 0 is the genesis sentinel.
    pub fn affiliate_by_index(&self, index: AffiliateIndex) -> Option<&Affiliate> {
        self.affiliates.get(index)
    }

    /// Record currently registered under `id`.
    pub fn affiliate_by_id(&self, id: &str) -> Option<&Affiliate> {
        self.id_to_index.get(id).map(|&index| &self.affiliates[index])
    }

    /// The full affiliate table, genesis sentinel included.
    pub fn affiliates(&self) -> &[Affiliate] {
        &self.affiliates
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Committed transitions since creation, oldest first.
    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    /// Number of committed transitions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // --- persistence ---------------------------------------------------------

    /// Capture the complete registry state for durable storage.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot {
            revision: self.revision,
            admin: self.admin,
            affiliates: self.affiliates.clone(),
            id_to_index: self.id_to_index.clone(),
            owner_to_index: self.owner_to_index.clone(),
            user_to_affiliate: self.user_to_affiliate.clone(),
            organic_users: self.organic_users.clone(),
            retired_ids: self.retired_ids.clone(),
            events: self.events.clone(),
            state_digest: [0u8; 32],
        };
        snapshot.state_digest = snapshot.compute_digest();
        snapshot
    }

    /// Rebuild a registry from a snapshot produced by
    /// [`ReferralRegistry::snapshot`].
    ///
    /// The digest is not re-checked here; hosts call
    /// [`RegistrySnapshot::verify_digest`] before restoring. The lookup
    /// tables are bounds-checked regardless: a snapshot whose maps point at
    /// the genesis sentinel or outside the affiliate table is rejected as
    /// [`RegistryError::CorruptSnapshot`].
    pub fn restore(snapshot: RegistrySnapshot) -> Result<ReferralRegistry, RegistryError> {
        if snapshot.affiliates.is_empty() {
            return Err(RegistryError::CorruptSnapshot {
                reason: "affiliate table is empty".to_string(),
            });
        }
        let slots = snapshot.affiliates.len();
        let out_of_range = |index: AffiliateIndex| index == NO_AFFILIATE || index >= slots;
        for (id, &index) in &snapshot.id_to_index {
            if out_of_range(index) {
                return Err(RegistryError::CorruptSnapshot {
                    reason: format!("id {id} maps to invalid slot {index}"),
                });
            }
        }
        for (owner, &index) in &snapshot.owner_to_index {
            if out_of_range(index) {
                return Err(RegistryError::CorruptSnapshot {
                    reason: format!("owner {owner} maps to invalid slot {index}"),
                });
            }
        }
        for (user, &index) in &snapshot.user_to_affiliate {
            if out_of_range(index) {
                return Err(RegistryError::CorruptSnapshot {
                    reason: format!("user {user} maps to invalid slot {index}"),
                });
            }
        }
        Ok(ReferralRegistry {
            admin: snapshot.admin,
            affiliates: snapshot.affiliates,
            id_to_index: snapshot.id_to_index,
            owner_to_index: snapshot.owner_to_index,
            user_to_affiliate: snapshot.user_to_affiliate,
            organic_users: snapshot.organic_users,
            retired_ids: snapshot.retired_ids,
            events: snapshot.events,
            revision: snapshot.revision,
        })
    }

    // --- internals -----------------------------------------------------------

    fn resolve_for_admin(
        &self,
        caller: Address,
        id: &str,
    ) -> Result<AffiliateIndex, RegistryError> {
        if caller != self.admin {
            return Err(RegistryError::NotAuthorized { caller });
        }
        match self.id_to_index.get(id) {
            Some(&index) => Ok(index),
            None => Err(RegistryError::InvalidAffiliate),
        }
    }

    fn commit(&mut self, event: RegistryEvent) {
        self.events.push(event);
        self.revision += 1;
    }
}
