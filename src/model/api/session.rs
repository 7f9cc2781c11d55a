use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, Identity, Phase, SessionId, VoteCount, VoterId, Weight},
    ledger::{AccountRegistry, Candidate, Registration, VotingSession},
};

/// A request to create a voting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
}

/// A request to register a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reference produced by an external upload; never inspected.
    #[serde(default)]
    pub image_ref: String,
}

/// A request to register a voter into a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub voter_id: VoterId,
    pub weight: Weight,
}

/// A ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVote {
    pub voter_id: VoterId,
    pub candidate_id: CandidateId,
}

/// Session metadata, without registrants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub id: SessionId,
    pub name: String,
    pub phase: Phase,
    pub registration_opened_at: DateTime<Utc>,
    pub voting_opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<&VotingSession> for SessionDetails {
    fn from(session: &VotingSession) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            phase: session.phase(),
            registration_opened_at: session.registration_opened_at(),
            voting_opened_at: session.voting_opened_at(),
            closed_at: session.closed_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDetails {
    pub id: CandidateId,
    pub name: String,
    pub description: String,
    pub image_ref: String,
    pub vote_count: VoteCount,
}

impl From<&Candidate> for CandidateDetails {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name.clone(),
            description: candidate.description.clone(),
            image_ref: candidate.image_ref.clone(),
            vote_count: candidate.vote_count,
        }
    }
}

/// A voter's registration in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetails {
    pub voter_id: VoterId,
    pub weight: Weight,
    /// `None` until the voter has voted.
    pub voted_candidate_id: Option<CandidateId>,
}

impl RegistrationDetails {
    pub fn new(voter_id: VoterId, registration: &Registration) -> Self {
        Self {
            voter_id,
            weight: registration.weight,
            voted_candidate_id: registration.voted_candidate,
        }
    }
}

/// A session the calling voter is registered in, with their registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSession {
    pub session: SessionDetails,
    pub registration: RegistrationDetails,
}

/// A registered voter as it appears in a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredVoter {
    pub voter_id: VoterId,
    pub identity: Identity,
    pub weight: Weight,
    pub voted_candidate_id: Option<CandidateId>,
}

/// Everything known about a session, read at a single point in time.
///
/// This is also the dump format accepted by the offline verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: SessionDetails,
    pub candidates: Vec<CandidateDetails>,
    /// Empty until the session is closed.
    pub winner_ids: Vec<CandidateId>,
    /// Registered voters in registration order.
    pub voters: Vec<RegisteredVoter>,
}

impl SessionSnapshot {
    /// Assemble a snapshot. The caller must hold both the session and the
    /// account registry for the duration.
    pub fn new(session: &VotingSession, accounts: &AccountRegistry) -> Self {
        let voters = session
            .registered_voter_ids()
            .iter()
            .filter_map(|&voter_id| {
                let account = accounts.voter(voter_id).ok()?;
                let registration = session.registration(voter_id).ok()?;
                Some(RegisteredVoter {
                    voter_id,
                    identity: account.identity.clone(),
                    weight: registration.weight,
                    voted_candidate_id: registration.voted_candidate,
                })
            })
            .collect();
        Self {
            session: session.into(),
            candidates: session.candidates().iter().map(Into::into).collect(),
            winner_ids: session
                .winners()
                .map(<[CandidateId]>::to_vec)
                .unwrap_or_default(),
            voters,
        }
    }
}
