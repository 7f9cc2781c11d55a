use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::model::{
    common::{CandidateId, Phase, VoteCount, VoterId},
    ledger::winner_ids,
};

use super::session::SessionSnapshot;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum VerificationError {
    /// A voter's ballot names a candidate that does not exist.
    UnknownCandidate {
        voter_id: VoterId,
        candidate_id: CandidateId,
    },
    /// A candidate's vote count is not the sum of the weights cast for it.
    Tally {
        candidate_id: CandidateId,
        claimed: VoteCount,
        computed: VoteCount,
    },
    /// The winner set of a closed session is not the set of maximal candidates.
    Winners {
        claimed: Vec<CandidateId>,
        computed: Vec<CandidateId>,
    },
    /// A session that is not closed reports winners.
    PrematureWinners { phase: Phase },
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCandidate {
                voter_id,
                candidate_id,
            } => write!(f, "Voter {voter_id} voted for unknown candidate {candidate_id}"),
            Self::Tally {
                candidate_id,
                claimed,
                computed,
            } => write!(
                f,
                "Candidate {candidate_id} claims {claimed} votes but ballots give {computed}"
            ),
            Self::Winners { claimed, computed } => {
                write!(f, "Claimed winners {claimed:?} but tallies give {computed:?}")
            }
            Self::PrematureWinners { phase } => {
                write!(f, "Session in phase {phase} must not report winners")
            }
        }
    }
}

impl SessionSnapshot {
    /// Verify that the tallies and winners are consistent with the ballots.
    pub fn verify(&self) -> Result<(), VerificationError> {
        // Recount from the ballots.
        let mut computed: HashMap<CandidateId, VoteCount> =
            self.candidates.iter().map(|c| (c.id, 0)).collect();
        for voter in &self.voters {
            if let Some(candidate_id) = voter.voted_candidate_id {
                let tally = computed.get_mut(&candidate_id).ok_or(
                    VerificationError::UnknownCandidate {
                        voter_id: voter.voter_id,
                        candidate_id,
                    },
                )?;
                *tally += VoteCount::from(voter.weight);
            }
        }

        for candidate in &self.candidates {
            let recounted = computed.get(&candidate.id).copied().unwrap_or_default();
            if candidate.vote_count != recounted {
                return Err(VerificationError::Tally {
                    candidate_id: candidate.id,
                    claimed: candidate.vote_count,
                    computed: recounted,
                });
            }
        }

        if self.session.phase == Phase::Close {
            let expected = winner_ids(self.candidates.iter().map(|c| (c.id, c.vote_count)));
            let mut claimed = self.winner_ids.clone();
            claimed.sort_unstable();
            if claimed != expected {
                return Err(VerificationError::Winners {
                    claimed,
                    computed: expected,
                });
            }
        } else if !self.winner_ids.is_empty() {
            return Err(VerificationError::PrematureWinners {
                phase: self.session.phase,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::api::session::{CandidateDetails, RegisteredVoter, SessionDetails};
    use crate::model::common::Identity;

    fn snapshot() -> SessionSnapshot {
        let candidate = |id, vote_count| CandidateDetails {
            id,
            name: format!("Candidate {id}"),
            description: String::new(),
            image_ref: String::new(),
            vote_count,
        };
        let voter = |voter_id, weight, voted| RegisteredVoter {
            voter_id,
            identity: Identity::voter_example(voter_id),
            weight,
            voted_candidate_id: voted,
        };
        SessionSnapshot {
            session: SessionDetails {
                id: 1,
                name: "Lunch".to_string(),
                phase: Phase::Close,
                registration_opened_at: Utc::now(),
                voting_opened_at: Some(Utc::now()),
                closed_at: Some(Utc::now()),
            },
            candidates: vec![candidate(1, 5), candidate(2, 5), candidate(3, 2)],
            winner_ids: vec![1, 2],
            voters: vec![
                voter(1, 5, Some(1)),
                voter(2, 5, Some(2)),
                voter(3, 2, Some(3)),
                voter(4, 7, None),
            ],
        }
    }

    #[test]
    fn consistent_snapshot_verifies() {
        assert_eq!(snapshot().verify(), Ok(()));
    }

    #[test]
    fn tampered_tally_detected() {
        let mut snapshot = snapshot();
        snapshot.candidates[2].vote_count = 3;
        assert_eq!(
            snapshot.verify(),
            Err(VerificationError::Tally {
                candidate_id: 3,
                claimed: 3,
                computed: 2
            })
        );
    }

    #[test]
    fn unknown_candidate_detected() {
        let mut snapshot = snapshot();
        snapshot.voters[3].voted_candidate_id = Some(9);
        assert_eq!(
            snapshot.verify(),
            Err(VerificationError::UnknownCandidate {
                voter_id: 4,
                candidate_id: 9
            })
        );
    }

    #[test]
    fn dropped_tied_winner_detected() {
        let mut snapshot = snapshot();
        snapshot.winner_ids = vec![2];
        assert!(matches!(
            snapshot.verify(),
            Err(VerificationError::Winners { .. })
        ));
    }

    #[test]
    fn open_session_has_no_winners() {
        let mut snapshot = snapshot();
        snapshot.session.phase = Phase::Voting;
        assert_eq!(
            snapshot.verify(),
            Err(VerificationError::PrematureWinners {
                phase: Phase::Voting
            })
        );
        snapshot.winner_ids.clear();
        assert_eq!(snapshot.verify(), Ok(()));
    }
}
