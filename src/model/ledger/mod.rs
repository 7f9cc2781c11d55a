//! The authoritative voting state: accounts, sessions and their journal.

mod accounts;
mod journal;
mod session;
mod store;

pub use accounts::{AccountRegistry, VoterAccount};
pub use journal::{Entry, FileJournal, Journal, MemoryJournal};
pub use session::{winner_ids, Candidate, Registration, VotingSession};
pub use store::Ledger;
