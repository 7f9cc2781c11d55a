use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            session::{CandidateDetails, NewCandidate, NewRegistration, RegistrationDetails},
        },
        common::{CandidateId, SessionId, VoterId},
        ledger::Ledger,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        register_candidate,
        get_candidate_count,
        get_candidate,
        register_voter,
        get_registered_voters,
        get_registration,
    ]
}

#[post("/sessions/<session_id>/candidates", data = "<candidate>", format = "json")]
pub async fn register_candidate(
    token: AuthToken,
    session_id: SessionId,
    candidate: Json<NewCandidate>,
    ledger: &State<Ledger>,
) -> Result<Json<CandidateDetails>> {
    let NewCandidate {
        name,
        description,
        image_ref,
    } = candidate.0;
    let candidate = ledger
        .register_candidate(&token.identity, session_id, name, description, image_ref)
        .await?;
    Ok(Json(candidate))
}

#[get("/sessions/<session_id>/candidates/count")]
async fn get_candidate_count(
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<usize>> {
    Ok(Json(ledger.candidate_count(session_id).await?))
}

#[get("/sessions/<session_id>/candidates/<candidate_id>", rank = 2)]
pub async fn get_candidate(
    session_id: SessionId,
    candidate_id: CandidateId,
    ledger: &State<Ledger>,
) -> Result<Json<CandidateDetails>> {
    Ok(Json(ledger.candidate_details(session_id, candidate_id).await?))
}

#[post("/sessions/<session_id>/voters", data = "<registration>", format = "json")]
pub async fn register_voter(
    token: AuthToken,
    session_id: SessionId,
    registration: Json<NewRegistration>,
    ledger: &State<Ledger>,
) -> Result<Json<RegistrationDetails>> {
    let registration = ledger
        .register_voter(
            &token.identity,
            session_id,
            registration.voter_id,
            registration.weight,
        )
        .await?;
    Ok(Json(registration))
}

/// Voter IDs registered in the session, in registration order.
#[get("/sessions/<session_id>/voters")]
async fn get_registered_voters(
    session_id: SessionId,
    ledger: &State<Ledger>,
) -> Result<Json<Vec<VoterId>>> {
    Ok(Json(ledger.registered_voter_ids(session_id).await?))
}

#[get("/sessions/<session_id>/voters/<voter_id>")]
async fn get_registration(
    session_id: SessionId,
    voter_id: VoterId,
    ledger: &State<Ledger>,
) -> Result<Json<RegistrationDetails>> {
    Ok(Json(ledger.registration(session_id, voter_id).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::api::test_util::*;
    use crate::model::{
        api::account::VoterDetails,
        common::{Identity, Phase},
    };

    use super::*;

    #[backend_test(admin)]
    async fn candidates_are_numbered_per_session(client: Client) {
        let lunch = open_session(&client, "Lunch").await;
        let dinner = open_session(&client, "Dinner").await;
        add_candidates(&client, lunch, &["Pizza", "Sushi"]).await;
        add_candidates(&client, dinner, &["Tacos"]).await;

        let response = client.get(uri!(get_candidate_count(lunch))).dispatch().await;
        assert_eq!(response.into_json::<usize>().await, Some(2));

        let response = client.get(uri!(get_candidate(dinner, 1))).dispatch().await;
        let candidate: CandidateDetails = response.into_json().await.unwrap();
        assert_eq!(candidate.name, "Tacos");
        assert_eq!(candidate.image_ref, "ipfs://tacos");
        assert_eq!(candidate.vote_count, 0);

        let response = client.get(uri!(get_candidate(dinner, 2))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(error_kind(&response.into_string().await.unwrap()), "CandidateNotFound");
    }

    #[backend_test(admin)]
    async fn voter_registration(client: Client) {
        let voters = add_voters(&client, 2).await;
        let session = open_session(&client, "Lunch").await;
        let registration: RegistrationDetails = post_ok(
            &client,
            uri!(register_voter(session)),
            &NewRegistration {
                voter_id: voters[1],
                weight: 4,
            },
        )
        .await;
        assert_eq!(registration.weight, 4);
        assert_eq!(registration.voted_candidate_id, None);

        // Registering twice, with a zero weight, or an unknown voter all fail.
        let attempts = [
            (voters[1], 1, Status::Conflict, "AlreadyRegistered"),
            (voters[0], 0, Status::UnprocessableEntity, "InvalidWeight"),
            (9, 1, Status::NotFound, "VoterNotFound"),
        ];
        for (voter_id, weight, status, kind) in attempts {
            let (actual, body) = post_json(
                &client,
                uri!(register_voter(session)),
                &NewRegistration { voter_id, weight },
            )
            .await;
            assert_eq!(status, actual, "{body}");
            assert_eq!(error_kind(&body), kind);
        }

        let response = client.get(uri!(get_registered_voters(session))).dispatch().await;
        assert_eq!(
            response.into_json::<Vec<VoterId>>().await,
            Some(vec![voters[1]])
        );
        let response = client
            .get(uri!(get_registration(session, voters[0])))
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        assert_eq!(error_kind(&response.into_string().await.unwrap()), "NotRegistered");

        // The voter's account records the session.
        let response = client
            .get(uri!(crate::api::accounts::get_voter(
                Identity::voter_example(2).to_string()
            )))
            .dispatch()
            .await;
        let voter: VoterDetails = response.into_json().await.unwrap();
        assert_eq!(voter.sessions_participated, [session]);
        let response = client
            .get(uri!(crate::api::accounts::get_voter_registration(
                Identity::voter_example(2).to_string(),
                session
            )))
            .dispatch()
            .await;
        let by_identity: RegistrationDetails = response.into_json().await.unwrap();
        assert_eq!(by_identity, registration);
    }

    #[backend_test(owner)]
    async fn registration_closes_with_voting(client: Client) {
        let voters = add_voters(&client, 2).await;
        let session = voting_session(&client, &["Pizza"], &voters[..1]).await;

        let (status, body) = post_json(
            &client,
            uri!(register_candidate(session)),
            &NewCandidate::example("Late"),
        )
        .await;
        assert_eq!(Status::UnprocessableEntity, status);
        assert_eq!(error_kind(&body), "PhaseViolation");

        let (status, body) = post_json(
            &client,
            uri!(register_voter(session)),
            &NewRegistration {
                voter_id: voters[1],
                weight: 1,
            },
        )
        .await;
        assert_eq!(Status::UnprocessableEntity, status);
        assert_eq!(error_kind(&body), "PhaseViolation");

        let response = client.get(uri!(get_candidate_count(session))).dispatch().await;
        assert_eq!(response.into_json::<usize>().await, Some(1));
        let response = client
            .get(uri!(crate::api::sessions::get_session(session)))
            .dispatch()
            .await;
        let details: crate::model::api::session::SessionDetails =
            response.into_json().await.unwrap();
        assert_eq!(details.phase, Phase::Voting);
    }
}
