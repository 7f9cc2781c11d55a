use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::common::{CandidateId, Phase, SessionId, VoteCount, VoterId, Weight};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub description: String,
    /// Opaque reference to an externally stored image.
    pub image_ref: String,
    pub vote_count: VoteCount,
}

/// The binding of a voter to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub weight: Weight,
    pub voted_candidate: Option<CandidateId>,
}

/// A single election, its registrants and its tallies.
///
/// Mutations are split into a `check_*` method, which validates without
/// side effects, and a `commit_*` method, which applies a change that has
/// already been validated. The ledger journals the change in between.
#[derive(Debug)]
pub struct VotingSession {
    pub id: SessionId,
    pub name: String,
    phase: Phase,
    registration_opened_at: DateTime<Utc>,
    voting_opened_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    /// Candidates indexed by `id - 1`.
    candidates: Vec<Candidate>,
    /// Registered voters in registration order.
    registered: Vec<VoterId>,
    registrations: HashMap<VoterId, Registration>,
    winners: Vec<CandidateId>,
}

impl VotingSession {
    /// A session needs a non-blank name.
    pub fn check_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::BadRequest(
                "Voting session name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn new(id: SessionId, name: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            phase: Phase::Registration,
            registration_opened_at: created_at,
            voting_opened_at: None,
            closed_at: None,
            candidates: Vec::new(),
            registered: Vec::new(),
            registrations: HashMap::new(),
            winners: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registration_opened_at(&self) -> DateTime<Utc> {
        self.registration_opened_at
    }

    pub fn voting_opened_at(&self) -> Option<DateTime<Utc>> {
        self.voting_opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn candidate(&self, id: CandidateId) -> Result<&Candidate> {
        id.checked_sub(1)
            .and_then(|index| self.candidates.get(index as usize))
            .ok_or(Error::CandidateNotFound {
                session: self.id,
                candidate: id,
            })
    }

    pub fn registered_voter_ids(&self) -> &[VoterId] {
        &self.registered
    }

    pub fn registration(&self, voter: VoterId) -> Result<&Registration> {
        self.registrations.get(&voter).ok_or(Error::NotRegistered {
            session: self.id,
            voter,
        })
    }

    /// The winner set, available once the session is closed.
    pub fn winners(&self) -> Result<&[CandidateId]> {
        self.ensure_phase(Phase::Close, "report winners")?;
        Ok(&self.winners)
    }

    pub fn ensure_phase(&self, phase: Phase, operation: &'static str) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Error::PhaseViolation {
                session: self.id,
                phase: self.phase,
                operation,
            })
        }
    }

    pub fn check_register_candidate(&self) -> Result<()> {
        self.ensure_phase(Phase::Registration, "register candidates")
    }

    pub fn commit_register_candidate(
        &mut self,
        name: String,
        description: String,
        image_ref: String,
    ) -> CandidateId {
        let id = self.candidates.len() as CandidateId + 1;
        self.candidates.push(Candidate {
            id,
            name,
            description,
            image_ref,
            vote_count: 0,
        });
        id
    }

    pub fn check_voter_registration_open(&self) -> Result<()> {
        self.ensure_phase(Phase::Registration, "register voters")
    }

    /// Validate a voter registration. The voter must already be known to
    /// the account registry.
    pub fn check_register_voter(&self, voter: VoterId, weight: Weight) -> Result<()> {
        self.check_voter_registration_open()?;
        if weight < 1 {
            return Err(Error::InvalidWeight(weight));
        }
        if self.registrations.contains_key(&voter) {
            return Err(Error::AlreadyRegistered {
                session: self.id,
                voter,
            });
        }
        Ok(())
    }

    pub fn commit_register_voter(&mut self, voter: VoterId, weight: Weight) {
        self.registered.push(voter);
        self.registrations.insert(
            voter,
            Registration {
                weight,
                voted_candidate: None,
            },
        );
    }

    /// Validate a phase transition, returning the phase it leads to.
    pub fn check_advance(&self) -> Result<Phase> {
        let next = self.phase.next().ok_or(Error::PhaseViolation {
            session: self.id,
            phase: self.phase,
            operation: "advance past the final phase",
        })?;
        if self.phase == Phase::Registration
            && (self.candidates.is_empty() || self.registered.is_empty())
        {
            return Err(Error::InsufficientRegistrants {
                session: self.id,
                candidates: self.candidates.len(),
                voters: self.registered.len(),
            });
        }
        Ok(next)
    }

    /// Move to the next phase. Closing the session fixes the winner set.
    pub fn commit_advance(&mut self, at: DateTime<Utc>) -> Phase {
        match self.phase {
            Phase::Registration => {
                self.phase = Phase::Voting;
                self.voting_opened_at = Some(at);
            }
            Phase::Voting => {
                self.phase = Phase::Close;
                self.closed_at = Some(at);
                self.winners = winner_ids(self.candidates.iter().map(|c| (c.id, c.vote_count)));
            }
            Phase::Close => unreachable!("advance from Close must fail validation"),
        }
        self.phase
    }

    /// Validate a ballot, checking preconditions in a fixed order.
    pub fn check_cast_vote(&self, voter: VoterId, candidate: CandidateId) -> Result<()> {
        self.ensure_phase(Phase::Voting, "cast votes")?;
        let registration = self.registration(voter)?;
        if registration.voted_candidate.is_some() {
            return Err(Error::AlreadyVoted {
                session: self.id,
                voter,
            });
        }
        self.candidate(candidate)?;
        Ok(())
    }

    /// Record a validated ballot, returning the candidate's new tally.
    pub fn commit_cast_vote(&mut self, voter: VoterId, candidate: CandidateId) -> VoteCount {
        let (Some(registration), Some(entry)) = (
            self.registrations.get_mut(&voter),
            candidate
                .checked_sub(1)
                .and_then(|index| self.candidates.get_mut(index as usize)),
        ) else {
            unreachable!("ballot must pass validation before commit");
        };
        registration.voted_candidate = Some(candidate);
        entry.vote_count += VoteCount::from(registration.weight);
        entry.vote_count
    }
}

/// All candidates sharing the maximum tally, in ascending ID order.
///
/// If nobody voted, every candidate ties at zero and all of them win.
pub fn winner_ids<I>(tallies: I) -> Vec<CandidateId>
where
    I: IntoIterator<Item = (CandidateId, VoteCount)>,
{
    let tallies: Vec<_> = tallies.into_iter().collect();
    let Some(max) = tallies.iter().map(|(_, count)| *count).max() else {
        return Vec::new();
    };
    let mut winners: Vec<_> = tallies
        .into_iter()
        .filter(|(_, count)| *count == max)
        .map(|(id, _)| id)
        .collect();
    winners.sort_unstable();
    winners
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> VotingSession {
        VotingSession::new(1, "Lunch".to_string(), Utc::now())
    }

    fn add_candidate(session: &mut VotingSession, name: &str) -> CandidateId {
        session.check_register_candidate().unwrap();
        session.commit_register_candidate(name.to_string(), String::new(), String::new())
    }

    fn add_voter(session: &mut VotingSession, voter: VoterId, weight: Weight) {
        session.check_register_voter(voter, weight).unwrap();
        session.commit_register_voter(voter, weight);
    }

    fn advance(session: &mut VotingSession) -> Phase {
        session.check_advance().unwrap();
        session.commit_advance(Utc::now())
    }

    fn vote(session: &mut VotingSession, voter: VoterId, candidate: CandidateId) -> VoteCount {
        session.check_cast_vote(voter, candidate).unwrap();
        session.commit_cast_vote(voter, candidate)
    }

    #[test]
    fn blank_name_rejected() {
        assert!(VotingSession::check_name("Lunch").is_ok());
        for name in ["", "   "] {
            assert!(matches!(
                VotingSession::check_name(name),
                Err(Error::BadRequest(_))
            ));
        }
    }

    #[test]
    fn candidate_ids_are_per_session() {
        let mut first = session();
        let mut second = VotingSession::new(2, "Dinner".to_string(), Utc::now());
        assert_eq!(add_candidate(&mut first, "Pizza"), 1);
        assert_eq!(add_candidate(&mut first, "Sushi"), 2);
        assert_eq!(add_candidate(&mut second, "Tacos"), 1);

        assert_eq!(first.candidate(2).unwrap().name, "Sushi");
        assert_eq!(first.candidate(2).unwrap().vote_count, 0);
        assert!(matches!(
            first.candidate(3),
            Err(Error::CandidateNotFound { session: 1, candidate: 3 })
        ));
        assert!(matches!(first.candidate(0), Err(Error::CandidateNotFound { .. })));
    }

    #[test]
    fn registration_rules() {
        let mut session = session();
        assert!(matches!(
            session.check_register_voter(1, 0),
            Err(Error::InvalidWeight(0))
        ));
        add_voter(&mut session, 1, 3);
        assert!(matches!(
            session.check_register_voter(1, 1),
            Err(Error::AlreadyRegistered { session: 1, voter: 1 })
        ));
        assert_eq!(
            *session.registration(1).unwrap(),
            Registration {
                weight: 3,
                voted_candidate: None
            }
        );
        assert!(matches!(
            session.registration(2),
            Err(Error::NotRegistered { session: 1, voter: 2 })
        ));
        assert_eq!(session.registered_voter_ids(), [1]);
    }

    #[test]
    fn advance_needs_registrants() {
        let mut session = session();
        assert!(matches!(
            session.check_advance(),
            Err(Error::InsufficientRegistrants { candidates: 0, voters: 0, .. })
        ));
        add_candidate(&mut session, "Pizza");
        assert!(matches!(
            session.check_advance(),
            Err(Error::InsufficientRegistrants { candidates: 1, voters: 0, .. })
        ));
        assert_eq!(session.phase(), Phase::Registration);
        add_voter(&mut session, 1, 1);
        assert_eq!(session.check_advance().unwrap(), Phase::Voting);
    }

    #[test]
    fn phase_sequence() {
        let mut session = session();
        add_candidate(&mut session, "Pizza");
        add_voter(&mut session, 1, 1);
        assert!(session.voting_opened_at().is_none());

        assert_eq!(advance(&mut session), Phase::Voting);
        assert!(session.voting_opened_at().is_some());
        assert!(matches!(
            session.check_register_candidate(),
            Err(Error::PhaseViolation { phase: Phase::Voting, .. })
        ));
        assert!(matches!(
            session.check_register_voter(2, 1),
            Err(Error::PhaseViolation { phase: Phase::Voting, .. })
        ));

        assert_eq!(advance(&mut session), Phase::Close);
        assert!(session.closed_at().is_some());
        assert!(matches!(
            session.check_advance(),
            Err(Error::PhaseViolation { phase: Phase::Close, .. })
        ));
        assert_eq!(session.phase(), Phase::Close);
    }

    #[test]
    fn weighted_vote_exactly_once() {
        let mut session = session();
        let candidate = add_candidate(&mut session, "Pizza");
        add_voter(&mut session, 1, 3);
        advance(&mut session);

        assert_eq!(vote(&mut session, 1, candidate), 3);
        assert!(matches!(
            session.check_cast_vote(1, candidate),
            Err(Error::AlreadyVoted { session: 1, voter: 1 })
        ));
        assert_eq!(session.candidate(candidate).unwrap().vote_count, 3);
        assert_eq!(session.registration(1).unwrap().voted_candidate, Some(candidate));
    }

    #[test]
    fn vote_preconditions_in_order() {
        let mut session = session();
        add_candidate(&mut session, "Pizza");
        add_voter(&mut session, 1, 1);
        // Phase is checked before anything else.
        assert!(matches!(
            session.check_cast_vote(2, 9),
            Err(Error::PhaseViolation { phase: Phase::Registration, .. })
        ));
        advance(&mut session);
        assert!(matches!(
            session.check_cast_vote(2, 9),
            Err(Error::NotRegistered { voter: 2, .. })
        ));
        assert!(matches!(
            session.check_cast_vote(1, 9),
            Err(Error::CandidateNotFound { candidate: 9, .. })
        ));
        vote(&mut session, 1, 1);
        assert!(matches!(
            session.check_cast_vote(1, 9),
            Err(Error::AlreadyVoted { .. })
        ));
    }

    #[test]
    fn winners_only_after_close() {
        let mut session = session();
        for name in ["A", "B", "C"] {
            add_candidate(&mut session, name);
        }
        add_voter(&mut session, 1, 5);
        add_voter(&mut session, 2, 5);
        add_voter(&mut session, 3, 2);
        advance(&mut session);
        assert!(matches!(session.winners(), Err(Error::PhaseViolation { .. })));

        vote(&mut session, 1, 1);
        vote(&mut session, 2, 2);
        vote(&mut session, 3, 3);
        advance(&mut session);
        assert_eq!(session.winners().unwrap(), [1, 2]);
    }

    #[test]
    fn winner_computation() {
        assert_eq!(winner_ids([(1, 5), (2, 5), (3, 2)]), [1, 2]);
        assert_eq!(winner_ids([(3, 7), (1, 7)]), [1, 3]);
        assert_eq!(winner_ids([(1, 0), (2, 0), (3, 0)]), [1, 2, 3]);
        assert_eq!(winner_ids([(1, 0), (2, 1)]), [2]);
        assert!(winner_ids([]).is_empty());
    }
}
