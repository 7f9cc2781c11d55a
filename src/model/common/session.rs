use std::fmt::{Display, Formatter};

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Phases in the voting session lifecycle. Transitions only move forward.
///
/// On the wire a phase is the integer 0, 1 or 2.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Phase {
    /// Candidates and voters may be registered.
    Registration = 0,
    /// Ballots are accepted.
    Voting = 1,
    /// Terminal; results are final.
    Close = 2,
}

impl Phase {
    /// The phase following this one, or `None` if this phase is terminal.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Registration => Some(Phase::Voting),
            Phase::Voting => Some(Phase::Close),
            Phase::Close => None,
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Registration => "Registration",
            Phase::Voting => "Voting",
            Phase::Close => "Close",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn phases_only_move_forward() {
        let mut seen = vec![Phase::Registration];
        while let Some(next) = seen.last().unwrap().next() {
            assert!(next > *seen.last().unwrap());
            seen.push(next);
        }
        assert_eq!(seen, [Phase::Registration, Phase::Voting, Phase::Close]);
    }

    #[test]
    fn numeric_wire_format() {
        assert_eq!(serde_json::to_string(&Phase::Voting).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Phase>("2").unwrap(), Phase::Close);
        assert!(serde_json::from_str::<Phase>("3").is_err());
    }
}
