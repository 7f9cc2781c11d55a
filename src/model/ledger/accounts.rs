use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::model::common::{Identity, Role, SessionId, VoterId};

/// A voter account, created when an identity is granted the voter role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterAccount {
    pub id: VoterId,
    pub identity: Identity,
    /// Sessions this voter has been registered into.
    pub sessions_participated: BTreeSet<SessionId>,
}

/// The owner, admins and voters known to the ledger.
///
/// Every identity holds at most one role. Roles are resolved owner first,
/// then admins, then voters.
#[derive(Debug)]
pub struct AccountRegistry {
    owner: Identity,
    /// Admins in the order they were added.
    admins: Vec<Identity>,
    /// Voters indexed by `id - 1`.
    voters: Vec<VoterAccount>,
    voter_ids: HashMap<Identity, VoterId>,
}

impl AccountRegistry {
    /// Create a registry whose owner is fixed for its whole lifetime.
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            admins: Vec::new(),
            voters: Vec::new(),
            voter_ids: HashMap::new(),
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn admins(&self) -> &[Identity] {
        &self.admins
    }

    pub fn voters(&self) -> &[VoterAccount] {
        &self.voters
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    /// Determine the role held by the given identity, if any.
    pub fn classify(&self, identity: &Identity) -> Option<Role> {
        if *identity == self.owner {
            Some(Role::Owner)
        } else if self.admins.contains(identity) {
            Some(Role::Admin)
        } else if self.voter_ids.contains_key(identity) {
            Some(Role::Voter)
        } else {
            None
        }
    }

    /// Ensure the caller is the owner or an admin.
    pub fn ensure_privileged(&self, caller: &Identity) -> Result<Role> {
        match self.classify(caller) {
            Some(role) if role.is_privileged() => Ok(role),
            _ => Err(Error::AccessDenied),
        }
    }

    /// Ensure the caller is the voter with the given ID.
    pub fn ensure_voter(&self, caller: &Identity, voter: VoterId) -> Result<&VoterAccount> {
        match self.voter_by_identity(caller) {
            Some(account) if account.id == voter => Ok(account),
            _ => Err(Error::AccessDenied),
        }
    }

    pub fn voter(&self, id: VoterId) -> Result<&VoterAccount> {
        id.checked_sub(1)
            .and_then(|index| self.voters.get(index as usize))
            .ok_or_else(|| Error::VoterNotFound(id.to_string()))
    }

    pub fn voter_by_identity(&self, identity: &Identity) -> Option<&VoterAccount> {
        let id = self.voter_ids.get(identity)?;
        self.voter(*id).ok()
    }

    /// Check that a new role may be granted to the given identity.
    pub fn check_unprivileged(&self, identity: &Identity) -> Result<()> {
        match self.classify(identity) {
            Some(_) => Err(Error::AlreadyPrivileged(identity.clone())),
            None => Ok(()),
        }
    }

    /// Grant the admin role. Must only follow a successful [`Self::check_unprivileged`].
    pub fn commit_add_admin(&mut self, identity: Identity) {
        debug_assert!(self.classify(&identity).is_none());
        self.admins.push(identity);
    }

    /// Grant the voter role and allocate the next voter ID.
    /// Must only follow a successful [`Self::check_unprivileged`].
    pub fn commit_add_voter(&mut self, identity: Identity) -> VoterId {
        debug_assert!(self.classify(&identity).is_none());
        // Voter IDs are 1-based.
        let id = self.voters.len() as VoterId + 1;
        self.voter_ids.insert(identity.clone(), id);
        self.voters.push(VoterAccount {
            id,
            identity,
            sessions_participated: BTreeSet::new(),
        });
        id
    }

    /// Record that a known voter has been registered into a session.
    pub fn commit_participation(&mut self, voter: VoterId, session: SessionId) {
        if let Some(account) = voter
            .checked_sub(1)
            .and_then(|index| self.voters.get_mut(index as usize))
        {
            account.sessions_participated.insert(session);
        }
    }
}
