use serde::{Deserialize, Serialize};

use crate::model::{
    common::{Identity, Role, SessionId, VoterId},
    ledger::VoterAccount,
};

/// A request to grant a role to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Unvalidated; see [`Identity::new`].
    pub identity: String,
}

/// The role held by an identity, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRole {
    pub identity: Identity,
    /// `None` for identities with no role.
    pub role: Option<Role>,
}

/// Public details of a voter account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDetails {
    pub voter_id: VoterId,
    pub identity: Identity,
    /// Sessions the voter is registered in, ascending.
    pub sessions_participated: Vec<SessionId>,
}

impl From<&VoterAccount> for VoterDetails {
    fn from(account: &VoterAccount) -> Self {
        Self {
            voter_id: account.id,
            identity: account.identity.clone(),
            sessions_participated: account.sessions_participated.iter().copied().collect(),
        }
    }
}
