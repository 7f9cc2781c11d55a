use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            account::{AccountRole, NewAccount, VoterDetails},
            auth::AuthToken,
            session::RegistrationDetails,
        },
        common::{Identity, SessionId},
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_role,
        get_my_role,
        get_owner,
        get_admins,
        add_admin,
        get_voters,
        add_voter,
        get_voter_count,
        get_voter,
        get_voter_registration,
    ]
}

#[get("/accounts/<identity>/role", rank = 2)]
async fn get_role(identity: String, ledger: &State<Ledger>) -> Result<Json<AccountRole>> {
    let identity = Identity::new(identity)?;
    let role = ledger.classify_account(&identity).await;
    Ok(Json(AccountRole { identity, role }))
}

#[get("/accounts/me")]
async fn get_my_role(token: AuthToken, ledger: &State<Ledger>) -> Json<AccountRole> {
    let role = ledger.classify_account(&token.identity).await;
    Json(AccountRole {
        identity: token.identity,
        role,
    })
}

#[get("/accounts/owner")]
async fn get_owner(ledger: &State<Ledger>) -> Json<Identity> {
    Json(ledger.owner_identity().await)
}

#[get("/accounts/admins")]
async fn get_admins(ledger: &State<Ledger>) -> Json<Vec<Identity>> {
    Json(ledger.admin_identities().await)
}

#[post("/accounts/admins", data = "<new_admin>", format = "json")]
pub async fn add_admin(
    token: AuthToken,
    new_admin: Json<NewAccount>,
    ledger: &State<Ledger>,
) -> Result<()> {
    let identity = Identity::new(new_admin.0.identity)?;
    ledger.add_admin(&token.identity, identity).await
}

#[get("/accounts/voters")]
async fn get_voters(ledger: &State<Ledger>) -> Json<Vec<VoterDetails>> {
    Json(ledger.voters().await)
}

#[post("/accounts/voters", data = "<new_voter>", format = "json")]
pub async fn add_voter(
    token: AuthToken,
    new_voter: Json<NewAccount>,
    ledger: &State<Ledger>,
) -> Result<Json<VoterDetails>> {
    let identity = Identity::new(new_voter.0.identity)?;
    let voter = ledger.add_voter(&token.identity, identity).await?;
    Ok(Json(voter))
}

#[get("/accounts/voters/count")]
async fn get_voter_count(ledger: &State<Ledger>) -> Json<usize> {
    Json(ledger.voter_count().await)
}

#[get("/accounts/voters/<identity>")]
pub async fn get_voter(identity: String, ledger: &State<Ledger>) -> Result<Json<VoterDetails>> {
    let identity = Identity::new(identity)?;
    let voter = ledger.voter_details(&identity).await?;
    Ok(Json(voter))
}

#[get("/accounts/voters/<identity>/sessions/<session_id>")]
pub async fn get_voter_registration(
    identity: String,
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<RegistrationDetails>> {
    let identity = Identity::new(identity)?;
    let registration = ledger
        .registration_by_identity(&identity, session_id)
        .await?;
    Ok(Json(registration))
}
