use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rocket::tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        account::VoterDetails,
        session::{
            CandidateDetails, RegistrationDetails, SessionDetails, SessionSnapshot, VoterSession,
        },
    },
    common::{CandidateId, Identity, Phase, Role, SessionId, VoteCount, VoterId, Weight},
};

use super::{
    accounts::AccountRegistry,
    journal::{Entry, Journal, MemoryJournal},
    session::VotingSession,
};

type SessionHandle = Arc<Mutex<VotingSession>>;

/// The authoritative voting state.
///
/// Every mutation is validated in full, appended to the journal, and only
/// then applied in memory, so a failed operation leaves no trace.
///
/// Locks are always taken in the order: `registry_writes`, session list,
/// individual sessions in ascending ID order, then the account registry.
/// The account registry is never held while waiting on another lock, and is
/// only written to apply a change that is already journalled. Operations on
/// one session are linearised by that session's mutex; different sessions
/// proceed in parallel.
pub struct Ledger {
    /// Serialises changes to the account registry and the session list, so
    /// their checks stay valid across the journal append.
    registry_writes: Mutex<()>,
    accounts: RwLock<AccountRegistry>,
    sessions: RwLock<Vec<SessionHandle>>,
    journal: Box<dyn Journal>,
}

impl Ledger {
    /// A volatile ledger with no prior history.
    pub async fn in_memory(owner: Identity) -> Result<Self> {
        Self::restore(owner, Box::new(MemoryJournal::new()), Vec::new()).await
    }

    /// Rebuild a ledger from its journal history, writing the genesis entry
    /// if the journal is new.
    pub async fn restore(
        owner: Identity,
        journal: Box<dyn Journal>,
        history: Vec<Entry>,
    ) -> Result<Self> {
        let mut entries = history.into_iter();
        match entries.next() {
            None => {
                journal
                    .append(&Entry::Genesis {
                        owner: owner.clone(),
                    })
                    .await?;
                info!("Initialised new ledger owned by {owner}");
            }
            Some(Entry::Genesis { owner: recorded }) if recorded == owner => {}
            Some(Entry::Genesis { owner: recorded }) => {
                return Err(Error::Unavailable(format!(
                    "Journal is owned by {recorded}, not the configured owner {owner}"
                )));
            }
            Some(_) => {
                return Err(Error::Unavailable(
                    "Journal does not begin with a genesis entry".to_string(),
                ));
            }
        }

        let mut accounts = AccountRegistry::new(owner);
        let mut sessions = Vec::new();
        let mut replayed = 0;
        for (n, entry) in entries.enumerate() {
            replay(&mut accounts, &mut sessions, entry).map_err(|err| {
                Error::Unavailable(format!("Journal entry {} cannot be replayed: {err}", n + 2))
            })?;
            replayed += 1;
        }
        if replayed > 0 {
            info!(
                "Replayed {replayed} journal entries: {} sessions, {} voters",
                sessions.len(),
                accounts.voter_count()
            );
        }

        Ok(Self::from_parts(accounts, sessions, journal))
    }

    fn from_parts(
        accounts: AccountRegistry,
        sessions: Vec<VotingSession>,
        journal: Box<dyn Journal>,
    ) -> Self {
        Self {
            registry_writes: Mutex::new(()),
            accounts: RwLock::new(accounts),
            sessions: RwLock::new(
                sessions
                    .into_iter()
                    .map(|session| Arc::new(Mutex::new(session)))
                    .collect(),
            ),
            journal,
        }
    }

    /// Look up a session handle. The list lock is released before returning.
    async fn session(&self, id: SessionId) -> Result<SessionHandle> {
        let sessions = self.sessions.read().await;
        id.checked_sub(1)
            .and_then(|index| sessions.get(index as usize))
            .cloned()
            .ok_or(Error::SessionNotFound(id))
    }

    /// Roles are never revoked, so the check holds after the lock is released.
    async fn ensure_privileged(&self, caller: &Identity) -> Result<()> {
        self.accounts.read().await.ensure_privileged(caller)?;
        Ok(())
    }

    // Accounts.

    pub async fn classify_account(&self, identity: &Identity) -> Option<Role> {
        self.accounts.read().await.classify(identity)
    }

    pub async fn owner_identity(&self) -> Identity {
        self.accounts.read().await.owner().clone()
    }

    pub async fn admin_identities(&self) -> Vec<Identity> {
        self.accounts.read().await.admins().to_vec()
    }

    pub async fn voter_count(&self) -> usize {
        self.accounts.read().await.voter_count()
    }

    /// All voters in voter ID order.
    pub async fn voters(&self) -> Vec<VoterDetails> {
        self.accounts
            .read()
            .await
            .voters()
            .iter()
            .map(Into::into)
            .collect()
    }

    pub async fn voter_details(&self, identity: &Identity) -> Result<VoterDetails> {
        self.accounts
            .read()
            .await
            .voter_by_identity(identity)
            .map(Into::into)
            .ok_or_else(|| Error::VoterNotFound(identity.to_string()))
    }

    pub async fn add_admin(&self, caller: &Identity, identity: Identity) -> Result<()> {
        let _writes = self.registry_writes.lock().await;
        {
            let accounts = self.accounts.read().await;
            accounts.ensure_privileged(caller)?;
            accounts.check_unprivileged(&identity)?;
        }

        self.journal
            .append(&Entry::AddAdmin {
                identity: identity.clone(),
            })
            .await?;
        info!("{caller} granted admin role to {identity}");
        self.accounts.write().await.commit_add_admin(identity);
        Ok(())
    }

    pub async fn add_voter(&self, caller: &Identity, identity: Identity) -> Result<VoterDetails> {
        let _writes = self.registry_writes.lock().await;
        {
            let accounts = self.accounts.read().await;
            accounts.ensure_privileged(caller)?;
            accounts.check_unprivileged(&identity)?;
        }

        self.journal
            .append(&Entry::AddVoter {
                identity: identity.clone(),
            })
            .await?;
        let mut accounts = self.accounts.write().await;
        let id = accounts.commit_add_voter(identity);
        let voter = accounts.voter(id)?;
        info!("{caller} granted voter role to {} as voter {id}", voter.identity);
        Ok(voter.into())
    }

    // Sessions.

    /// The highest allocated session ID.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn create_session(&self, caller: &Identity, name: String) -> Result<SessionDetails> {
        let _writes = self.registry_writes.lock().await;
        self.ensure_privileged(caller).await?;
        VotingSession::check_name(&name)?;
        let id = self.sessions.read().await.len() as SessionId + 1;

        let at = Utc::now();
        self.journal
            .append(&Entry::CreateSession {
                name: name.clone(),
                at,
            })
            .await?;
        let session = VotingSession::new(id, name, at);
        let details = SessionDetails::from(&session);
        self.sessions.write().await.push(Arc::new(Mutex::new(session)));
        info!("{caller} created voting session {id} \"{}\"", details.name);
        Ok(details)
    }

    pub async fn session_details(&self, id: SessionId) -> Result<SessionDetails> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        Ok(SessionDetails::from(&*session))
    }

    /// A consistent view of a session with its candidates and registrants.
    pub async fn session_snapshot(&self, id: SessionId) -> Result<SessionSnapshot> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        let accounts = self.accounts.read().await;
        Ok(SessionSnapshot::new(&session, &accounts))
    }

    pub async fn winner_ids(&self, id: SessionId) -> Result<Vec<CandidateId>> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        Ok(session.winners()?.to_vec())
    }

    /// Move a session to its next phase. Closing a session fixes its winners.
    pub async fn advance_phase(&self, caller: &Identity, id: SessionId) -> Result<Phase> {
        self.ensure_privileged(caller).await?;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.check_advance()?;

        let at = Utc::now();
        self.journal
            .append(&Entry::AdvancePhase { session: id, at })
            .await?;
        let phase = session.commit_advance(at);
        match phase {
            Phase::Close => info!(
                "{caller} closed voting session {id}, winners {:?}",
                session.winners()?
            ),
            _ => info!("{caller} moved voting session {id} to phase {phase}"),
        }
        Ok(phase)
    }

    // Registration.

    pub async fn candidate_count(&self, id: SessionId) -> Result<usize> {
        let session = self.session(id).await?;
        let count = session.lock().await.candidate_count();
        Ok(count)
    }

    pub async fn candidate_details(
        &self,
        id: SessionId,
        candidate: CandidateId,
    ) -> Result<CandidateDetails> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        session.candidate(candidate).map(Into::into)
    }

    pub async fn register_candidate(
        &self,
        caller: &Identity,
        id: SessionId,
        name: String,
        description: String,
        image_ref: String,
    ) -> Result<CandidateDetails> {
        self.ensure_privileged(caller).await?;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.check_register_candidate()?;

        self.journal
            .append(&Entry::RegisterCandidate {
                session: id,
                name: name.clone(),
                description: description.clone(),
                image_ref: image_ref.clone(),
            })
            .await?;
        let candidate = session.commit_register_candidate(name, description, image_ref);
        info!("{caller} registered candidate {candidate} in voting session {id}");
        session.candidate(candidate).map(Into::into)
    }

    pub async fn registered_voter_ids(&self, id: SessionId) -> Result<Vec<VoterId>> {
        let session = self.session(id).await?;
        let ids = session.lock().await.registered_voter_ids().to_vec();
        Ok(ids)
    }

    pub async fn registration(&self, id: SessionId, voter: VoterId) -> Result<RegistrationDetails> {
        let session = self.session(id).await?;
        let session = session.lock().await;
        let registration = session.registration(voter)?;
        Ok(RegistrationDetails::new(voter, registration))
    }

    /// A voter's registration in a session, looked up by identity.
    pub async fn registration_by_identity(
        &self,
        identity: &Identity,
        id: SessionId,
    ) -> Result<RegistrationDetails> {
        let voter = self
            .accounts
            .read()
            .await
            .voter_by_identity(identity)
            .map(|voter| voter.id)
            .ok_or_else(|| Error::VoterNotFound(identity.to_string()))?;
        let session = self.session(id).await?;
        let session = session.lock().await;
        let registration = session.registration(voter)?;
        Ok(RegistrationDetails::new(voter, registration))
    }

    pub async fn register_voter(
        &self,
        caller: &Identity,
        id: SessionId,
        voter: VoterId,
        weight: Weight,
    ) -> Result<RegistrationDetails> {
        self.ensure_privileged(caller).await?;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.check_voter_registration_open()?;
        // Voters are never removed, so the voter still exists at commit.
        self.accounts.read().await.voter(voter)?;
        session.check_register_voter(voter, weight)?;

        self.journal
            .append(&Entry::RegisterVoter {
                session: id,
                voter,
                weight,
            })
            .await?;
        session.commit_register_voter(voter, weight);
        self.accounts.write().await.commit_participation(voter, id);
        info!("{caller} registered voter {voter} with weight {weight} in voting session {id}");
        let registration = session.registration(voter)?;
        Ok(RegistrationDetails::new(voter, registration))
    }

    // Voting.

    /// Cast a weighted ballot, returning the candidate's new tally.
    pub async fn cast_vote(
        &self,
        caller: &Identity,
        id: SessionId,
        voter: VoterId,
        candidate: CandidateId,
    ) -> Result<VoteCount> {
        self.accounts.read().await.ensure_voter(caller, voter)?;
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.check_cast_vote(voter, candidate)?;

        self.journal
            .append(&Entry::CastVote {
                session: id,
                voter,
                candidate,
            })
            .await?;
        let tally = session.commit_cast_vote(voter, candidate);
        info!("Voter {voter} voted in voting session {id}");
        Ok(tally)
    }

    /// Every session the calling voter is registered in, read at one point
    /// in time.
    pub async fn voter_sessions(&self, caller: &Identity) -> Result<Vec<VoterSession>> {
        loop {
            let (voter, participated) = self.participation(caller).await?;
            let handles = {
                let sessions = self.sessions.read().await;
                participated
                    .iter()
                    .filter_map(|id| {
                        id.checked_sub(1)
                            .and_then(|index| sessions.get(index as usize))
                            .cloned()
                    })
                    .collect::<Vec<_>>()
            };

            // Participation is ordered by session ID, so the locks are too.
            let mut guards: Vec<OwnedMutexGuard<VotingSession>> =
                Vec::with_capacity(handles.len());
            for handle in handles {
                guards.push(handle.lock_owned().await);
            }
            // A registration that completed while the sessions were being
            // locked changes the set; read it again.
            if self.participation(caller).await?.1 != participated {
                continue;
            }

            return guards
                .iter()
                .map(|session| -> Result<VoterSession> {
                    let registration = session.registration(voter)?;
                    Ok(VoterSession {
                        session: SessionDetails::from(&**session),
                        registration: RegistrationDetails::new(voter, registration),
                    })
                })
                .collect();
        }
    }

    async fn participation(&self, caller: &Identity) -> Result<(VoterId, BTreeSet<SessionId>)> {
        let accounts = self.accounts.read().await;
        let voter = accounts.voter_by_identity(caller).ok_or(Error::AccessDenied)?;
        Ok((voter.id, voter.sessions_participated.clone()))
    }
}

/// Apply a journal entry to state under construction, validating it exactly
/// as the live operation would.
fn replay(
    accounts: &mut AccountRegistry,
    sessions: &mut Vec<VotingSession>,
    entry: Entry,
) -> Result<()> {
    match entry {
        Entry::Genesis { .. } => {
            return Err(Error::Unavailable("Repeated genesis entry".to_string()));
        }
        Entry::AddAdmin { identity } => {
            accounts.check_unprivileged(&identity)?;
            accounts.commit_add_admin(identity);
        }
        Entry::AddVoter { identity } => {
            accounts.check_unprivileged(&identity)?;
            accounts.commit_add_voter(identity);
        }
        Entry::CreateSession { name, at } => {
            VotingSession::check_name(&name)?;
            let id = sessions.len() as SessionId + 1;
            sessions.push(VotingSession::new(id, name, at));
        }
        Entry::RegisterCandidate {
            session,
            name,
            description,
            image_ref,
        } => {
            let session = session_mut(sessions, session)?;
            session.check_register_candidate()?;
            session.commit_register_candidate(name, description, image_ref);
        }
        Entry::RegisterVoter {
            session: id,
            voter,
            weight,
        } => {
            let session = session_mut(sessions, id)?;
            session.check_voter_registration_open()?;
            accounts.voter(voter)?;
            session.check_register_voter(voter, weight)?;
            session.commit_register_voter(voter, weight);
            accounts.commit_participation(voter, id);
        }
        Entry::AdvancePhase { session, at } => {
            let session = session_mut(sessions, session)?;
            session.check_advance()?;
            session.commit_advance(at);
        }
        Entry::CastVote {
            session,
            voter,
            candidate,
        } => {
            let session = session_mut(sessions, session)?;
            session.check_cast_vote(voter, candidate)?;
            session.commit_cast_vote(voter, candidate);
        }
    }
    Ok(())
}

fn session_mut(sessions: &mut [VotingSession], id: SessionId) -> Result<&mut VotingSession> {
    id.checked_sub(1)
        .and_then(|index| sessions.get_mut(index as usize))
        .ok_or(Error::SessionNotFound(id))
}
