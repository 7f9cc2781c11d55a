//! Shared steps for route tests. Each step asserts that it succeeded.

use rocket::{
    http::{uri::Origin, ContentType, Status},
    local::asynchronous::Client,
    serde::json::serde_json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::model::{
    api::{
        account::{NewAccount, VoterDetails},
        auth::ConnectRequest,
        session::{NewCandidate, NewRegistration, NewSession, NewVote, SessionDetails},
    },
    common::{CandidateId, Identity, Phase, SessionId, VoterId, Weight},
};

/// POST a JSON body, returning the status and the raw response body.
pub async fn post_json<T: Serialize>(
    client: &Client,
    uri: Origin<'static>,
    body: &T,
) -> (Status, String) {
    let response = client
        .post(uri)
        .header(ContentType::JSON)
        .body(serde_json::to_string(body).unwrap())
        .dispatch()
        .await;
    let status = response.status();
    (status, response.into_string().await.unwrap_or_default())
}

/// POST a JSON body that must succeed, decoding the response.
pub async fn post_ok<T: Serialize, R: DeserializeOwned>(
    client: &Client,
    uri: Origin<'static>,
    body: &T,
) -> R {
    let (status, body) = post_json(client, uri, body).await;
    assert_eq!(Status::Ok, status, "{body}");
    serde_json::from_str(&body).unwrap()
}

/// The error kind of a failed response body.
pub fn error_kind(body: &str) -> String {
    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    body["kind"].as_str().unwrap().to_string()
}

pub async fn connect_as(client: &Client, identity: &Identity) {
    let request = ConnectRequest {
        identity: identity.to_string(),
    };
    let _: serde_json::Value = post_ok(client, uri!(crate::api::auth::connect), &request).await;
}

/// Add voters `0xvoter1..=n`, returning their IDs. The client must be privileged.
pub async fn add_voters(client: &Client, n: u32) -> Vec<VoterId> {
    let mut ids = Vec::new();
    for i in 1..=n {
        let voter: VoterDetails = post_ok(
            client,
            uri!(crate::api::accounts::add_voter),
            &NewAccount::voter_example(i),
        )
        .await;
        ids.push(voter.voter_id);
    }
    ids
}

pub async fn open_session(client: &Client, name: &str) -> SessionId {
    let session: SessionDetails = post_ok(
        client,
        uri!(crate::api::sessions::create_session),
        &NewSession {
            name: name.to_string(),
        },
    )
    .await;
    session.id
}

pub async fn add_candidates(client: &Client, session: SessionId, names: &[&str]) {
    for name in names {
        let _: serde_json::Value = post_ok(
            client,
            uri!(crate::api::registration::register_candidate(session)),
            &NewCandidate::example(name),
        )
        .await;
    }
}

pub async fn enrol_voter(
    client: &Client,
    session: SessionId,
    voter_id: VoterId,
    weight: Weight,
) {
    let _: serde_json::Value = post_ok(
        client,
        uri!(crate::api::registration::register_voter(session)),
        &NewRegistration { voter_id, weight },
    )
    .await;
}

pub async fn advance(client: &Client, session: SessionId) -> Phase {
    post_ok(client, uri!(crate::api::sessions::advance_phase(session)), &()).await
}

/// A session in the Voting phase with the given candidates and voters
/// registered at weight 1.
pub async fn voting_session(
    client: &Client,
    candidates: &[&str],
    voters: &[VoterId],
) -> SessionId {
    let session = open_session(client, "Lunch").await;
    add_candidates(client, session, candidates).await;
    for voter in voters {
        enrol_voter(client, session, *voter, 1).await;
    }
    assert_eq!(advance(client, session).await, Phase::Voting);
    session
}

pub async fn vote(
    client: &Client,
    session: SessionId,
    voter_id: VoterId,
    candidate_id: CandidateId,
) -> (Status, String) {
    post_json(
        client,
        uri!(crate::api::voting::cast_vote(session)),
        &NewVote {
            voter_id,
            candidate_id,
        },
    )
    .await
}
