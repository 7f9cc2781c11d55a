mod account;
mod session;

pub use account::{Identity, Role};
pub use session::Phase;

/// Voting session IDs are allocated sequentially from 1.
pub type SessionId = u32;
/// Candidate IDs are allocated sequentially from 1 within each session.
pub type CandidateId = u32;
/// Voter IDs are allocated sequentially from 1 and never reused.
pub type VoterId = u32;
/// Multiplier applied to a voter's single vote.
pub type Weight = u32;
/// A candidate's weighted tally.
pub type VoteCount = u64;
