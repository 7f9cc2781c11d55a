use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            session::{NewSession, SessionDetails, SessionSnapshot},
        },
        common::{CandidateId, Phase, SessionId},
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_session,
        get_session_count,
        get_session,
        get_session_snapshot,
        advance_phase,
        get_winners,
    ]
}

#[post("/sessions", data = "<new_session>", format = "json")]
pub async fn create_session(
    token: AuthToken,
    new_session: Json<NewSession>,
    ledger: &State<Ledger>,
) -> Result<Json<SessionDetails>> {
    let session = ledger
        .create_session(&token.identity, new_session.0.name)
        .await?;
    Ok(Json(session))
}

/// The highest allocated session ID.
#[get("/sessions/count")]
async fn get_session_count(ledger: &State<Ledger>) -> Json<usize> {
    Json(ledger.session_count().await)
}

#[get("/sessions/<session_id>")]
pub async fn get_session(
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<SessionDetails>> {
    Ok(Json(ledger.session_details(session_id).await?))
}

/// Session details, candidates, winners and registrants, as of one instant.
#[get("/sessions/<session_id>/snapshot")]
async fn get_session_snapshot(
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<SessionSnapshot>> {
    Ok(Json(ledger.session_snapshot(session_id).await?))
}

#[post("/sessions/<session_id>/advance")]
pub async fn advance_phase(
    token: AuthToken,
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<Phase>> {
    let phase = ledger.advance_phase(&token.identity, session_id).await?;
    Ok(Json(phase))
}

#[get("/sessions/<session_id>/winners")]
async fn get_winners(
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<Vec<CandidateId>>> {
    Ok(Json(ledger.winner_ids(session_id).await?))
}
