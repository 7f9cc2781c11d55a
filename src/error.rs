use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::common::{CandidateId, Identity, Phase, SessionId, VoterId, Weight};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Caller's role does not permit this operation")]
    AccessDenied,
    #[error("Voting session {0} not found")]
    SessionNotFound(SessionId),
    #[error("Voter {0} not found")]
    VoterNotFound(String),
    #[error("Candidate {candidate} not found in voting session {session}")]
    CandidateNotFound {
        session: SessionId,
        candidate: CandidateId,
    },
    #[error("{0} already holds a role")]
    AlreadyPrivileged(Identity),
    #[error("Voter {voter} is already registered in voting session {session}")]
    AlreadyRegistered { session: SessionId, voter: VoterId },
    #[error("Voter {voter} has already voted in voting session {session}")]
    AlreadyVoted { session: SessionId, voter: VoterId },
    #[error("Voter {voter} is not registered in voting session {session}")]
    NotRegistered { session: SessionId, voter: VoterId },
    #[error("Voting session {session} is in phase {phase}; cannot {operation}")]
    PhaseViolation {
        session: SessionId,
        phase: Phase,
        operation: &'static str,
    },
    #[error(
        "Voting session {session} needs at least one candidate and one voter \
(has {candidates} and {voters})"
    )]
    InsufficientRegistrants {
        session: SessionId,
        candidates: usize,
        voters: usize,
    },
    #[error("Voting weight must be at least 1, got {0}")]
    InvalidWeight(Weight),
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// The machine-readable name of this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::SessionNotFound(_) => "SessionNotFound",
            Self::VoterNotFound(_) => "VoterNotFound",
            Self::CandidateNotFound { .. } => "CandidateNotFound",
            Self::AlreadyPrivileged(_) => "AlreadyPrivileged",
            Self::AlreadyRegistered { .. } => "AlreadyRegistered",
            Self::AlreadyVoted { .. } => "AlreadyVoted",
            Self::NotRegistered { .. } => "NotRegistered",
            Self::PhaseViolation { .. } => "PhaseViolation",
            Self::InsufficientRegistrants { .. } => "InsufficientRegistrants",
            Self::InvalidWeight(_) => "InvalidWeight",
            Self::Unavailable(_) => "Unavailable",
            Self::Jwt(_) => "Unauthenticated",
            Self::BadRequest(_) => "BadRequest",
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::AccessDenied => Status::Forbidden,
            Self::SessionNotFound(_)
            | Self::VoterNotFound(_)
            | Self::CandidateNotFound { .. } => Status::NotFound,
            Self::AlreadyPrivileged(_)
            | Self::AlreadyRegistered { .. }
            | Self::AlreadyVoted { .. } => Status::Conflict,
            Self::NotRegistered { .. }
            | Self::PhaseViolation { .. }
            | Self::InsufficientRegistrants { .. }
            | Self::InvalidWeight(_) => Status::UnprocessableEntity,
            Self::Unavailable(_) => Status::ServiceUnavailable,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::BadRequest(_) => Status::BadRequest,
        }
    }
}

/// The JSON body accompanying every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{self}");
        } else {
            debug!("Rejected: {self}");
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        Custom(status, Json(body)).respond_to(req)
    }
}
