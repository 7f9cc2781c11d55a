use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            session::{NewVote, VoterSession},
        },
        common::SessionId,
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, get_my_sessions]
}

/// Cast the caller's ballot. The caller must be the voter named in the ballot.
#[post("/sessions/<session_id>/votes", data = "<vote>", format = "json")]
pub async fn cast_vote(
    token: AuthToken,
    session_id: SessionId,
    vote: Json<NewVote>,
    ledger: &State<Ledger>,
) -> Result<()> {
    ledger
        .cast_vote(&token.identity, session_id, vote.voter_id, vote.candidate_id)
        .await?;
    Ok(())
}

/// Every session the caller is registered in, with their registration.
#[get("/voter/sessions")]
async fn get_my_sessions(
    token: AuthToken,
    ledger: &State<Ledger>,
) -> Result<Json<Vec<VoterSession>>> {
    Ok(Json(ledger.voter_sessions(&token.identity).await?))
}
