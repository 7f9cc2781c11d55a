use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::Result,
    model::{
        api::{
            account::AccountRole,
            auth::{AuthToken, ConnectRequest, AUTH_TOKEN_COOKIE},
        },
        common::Identity,
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![connect, disconnect]
}

/// Connect as the given identity, reporting the role it holds.
#[post("/auth/connect", data = "<request>", format = "json")]
pub async fn connect(
    request: Json<ConnectRequest>,
    cookies: &CookieJar<'_>,
    ledger: &State<Ledger>,
    config: &State<Config>,
) -> Result<Json<AccountRole>> {
    let identity = Identity::new(request.0.identity)?;
    let role = ledger.classify_account(&identity).await;

    let token = AuthToken::new(identity.clone());
    cookies.add(token.into_cookie(config)?);

    Ok(Json(AccountRole { identity, role }))
}

#[delete("/auth")]
pub fn disconnect(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
