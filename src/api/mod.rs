use rocket::Route;

pub mod accounts;
pub mod auth;
pub mod registration;
pub mod sessions;
pub mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(accounts::routes());
    routes.extend(sessions::routes());
    routes.extend(registration::routes());
    routes.extend(voting::routes());
    routes
}

#[cfg(test)]
mod test_util;
