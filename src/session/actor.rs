//! Session actors and their directory.
//!
//! Each live session id maps to exactly one [`SessionActor`] inside the
//! process. Every read and write of that session goes through the actor's
//! lock, so operations on one session are totally ordered. State is written
//! through to [`SessionStorage`](crate::domain::SessionStorage) before a
//! mutation is acknowledged. Ordering is per process; with storage shared
//! between processes the actor reads the record again on every operation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Session, SessionStoragePtr};
use crate::error::{AuthError, AuthResult};

/// What an actor reports about its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Active(Session),
    /// Never created, or gone from storage.
    Missing,
    Revoked,
    Expired,
}

#[derive(Default)]
struct ActorState {
    /// Cached record; only meaningful once `hydrated`.
    session: Option<Session>,
    hydrated: bool,
}

pub struct SessionActor {
    // ---
    session_id: String,
    storage: SessionStoragePtr,
    state: Mutex<ActorState>,
}

impl SessionActor {
    // ---
    /// An actor that loads its state from storage on first use.
    fn dormant(session_id: String, storage: SessionStoragePtr) -> Self {
        // ---
        Self {
            session_id,
            storage,
            state: Mutex::new(ActorState::default()),
        }
    }

    /// An actor for a freshly created session. The record is persisted
    /// before the actor is handed out.
    async fn create(session: Session, storage: SessionStoragePtr) -> AuthResult<Self> {
        // ---
        storage.save(&session).await?;
        Ok(Self {
            session_id: session.session_id.clone(),
            storage,
            state: Mutex::new(ActorState {
                session: Some(session),
                hydrated: true,
            }),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Loads the record on first use. Storage shared with other processes
    /// is re-read every time, so a logout elsewhere is seen at once.
    async fn hydrate(&self, state: &mut ActorState) -> AuthResult<()> {
        // ---
        if !state.hydrated || self.storage.shares_state() {
            state.session = self.storage.load(&self.session_id).await?;
            state.hydrated = true;
        }
        Ok(())
    }

    fn classify(session: Option<&Session>, now: DateTime<Utc>) -> Lookup {
        // ---
        match session {
            None => Lookup::Missing,
            Some(s) if s.revoked => Lookup::Revoked,
            Some(s) if now >= s.expires_at => Lookup::Expired,
            Some(s) => Lookup::Active(s.clone()),
        }
    }

    /// Current view of the session.
    pub async fn lookup(&self, now: DateTime<Utc>) -> AuthResult<Lookup> {
        // ---
        let mut state = self.state.lock().await;
        self.hydrate(&mut state).await?;
        Ok(Self::classify(state.session.as_ref(), now))
    }

    /// Binds `user_id` to an active session.
    ///
    /// Fails `Unauthenticated` if the session is revoked, expired or missing;
    /// a revoked session is never brought back.
    pub async fn attach_user(&self, user_id: Uuid, now: DateTime<Utc>) -> AuthResult<Session> {
        // ---
        let mut state = self.state.lock().await;
        self.hydrate(&mut state).await?;

        let Lookup::Active(mut session) = Self::classify(state.session.as_ref(), now) else {
            return Err(AuthError::Unauthenticated);
        };
        session.user_id = Some(user_id);

        self.storage.save(&session).await?;
        state.session = Some(session.clone());
        Ok(session)
    }

    /// Marks the session revoked. Returns whether this call changed anything.
    pub async fn revoke(&self) -> AuthResult<bool> {
        // ---
        let mut state = self.state.lock().await;
        self.hydrate(&mut state).await?;

        let Some(current) = state.session.as_ref().filter(|s| !s.revoked) else {
            return Ok(false);
        };
        let revoked = Session {
            revoked: true,
            ..current.clone()
        };

        self.storage.save(&revoked).await?;
        state.session = Some(revoked);
        Ok(true)
    }

    /// True when nobody is inside the actor right now.
    fn is_idle(&self) -> bool {
        self.state.try_lock().is_ok()
    }
}

/// Index of live actors by session id.
#[derive(Default)]
pub struct ActorDirectory {
    // ---
    actors: DashMap<String, Arc<SessionActor>>,
}

impl ActorDirectory {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// The actor for `session_id`, creating a dormant one if none is live.
    pub fn get(&self, session_id: &str, storage: &SessionStoragePtr) -> Arc<SessionActor> {
        // ---
        if let Some(actor) = self.actors.get(session_id) {
            return actor.clone();
        }
        self.actors
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(SessionActor::dormant(
                    session_id.to_string(),
                    storage.clone(),
                ))
            })
            .clone()
    }

    /// Persists `session` and registers its actor.
    pub async fn spawn(
        &self,
        session: Session,
        storage: &SessionStoragePtr,
    ) -> AuthResult<Arc<SessionActor>> {
        // ---
        let session_id = session.session_id.clone();
        let actor = Arc::new(SessionActor::create(session, storage.clone()).await?);

        match self.actors.entry(session_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AuthError::Internal(anyhow::anyhow!(
                "session id collision"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(actor.clone());
                Ok(actor)
            }
        }
    }

    /// Drops `actor` from the index if it is still the registered one.
    pub fn evict(&self, actor: &Arc<SessionActor>) {
        // ---
        self.actors
            .remove_if(actor.session_id(), |_, live| Arc::ptr_eq(live, actor));
    }

    /// Removes actors that nobody holds and nobody is using. Their state is
    /// already persisted and is reloaded on next use.
    pub fn sweep(&self) -> usize {
        // ---
        let before = self.actors.len();
        self.actors
            .retain(|_, actor| Arc::strong_count(actor) > 1 || !actor.is_idle());
        before.saturating_sub(self.actors.len())
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{SessionStorage, SystemClock};
    use crate::infrastructure::create_memory_session_storage;

    fn storage() -> SessionStoragePtr {
        create_memory_session_storage(Arc::new(SystemClock))
    }

    fn fresh(id: &str) -> Session {
        // ---
        let now = Utc::now();
        Session {
            session_id: id.to_string(),
            user_id: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            revoked: false,
        }
    }

    #[tokio::test]
    async fn dormant_actor_hydrates_from_storage() {
        // ---
        let storage = storage();
        storage.save(&fresh("s1")).await.unwrap();

        let directory = ActorDirectory::new();
        let actor = directory.get("s1", &storage);
        assert!(matches!(actor.lookup(Utc::now()).await.unwrap(), Lookup::Active(_)));

        let unknown = directory.get("nope", &storage);
        assert_eq!(unknown.lookup(Utc::now()).await.unwrap(), Lookup::Missing);
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_blocks_attach() {
        // ---
        let storage = storage();
        let directory = ActorDirectory::new();
        let actor = directory.spawn(fresh("s2"), &storage).await.unwrap();

        assert!(actor.revoke().await.unwrap());
        assert!(!actor.revoke().await.unwrap());

        let err = actor.attach_user(Uuid::new_v4(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
        assert!(storage.load("s2").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn expired_session_is_reported_as_such() {
        // ---
        let directory = ActorDirectory::new();
        let actor = directory.spawn(fresh("s3"), &storage()).await.unwrap();
        let later = Utc::now() + chrono::Duration::hours(2);

        assert_eq!(actor.lookup(later).await.unwrap(), Lookup::Expired);
        assert!(actor.attach_user(Uuid::new_v4(), later).await.is_err());
    }

    #[tokio::test]
    async fn sweep_keeps_held_actors_and_state_survives() {
        // ---
        let storage = storage();
        let directory = ActorDirectory::new();
        let held = directory.spawn(fresh("held"), &storage).await.unwrap();
        let user = Uuid::new_v4();
        {
            let idle = directory.spawn(fresh("idle"), &storage).await.unwrap();
            idle.attach_user(user, Utc::now()).await.unwrap();
        }

        assert_eq!(directory.sweep(), 1);
        assert_eq!(directory.len(), 1);
        drop(held);

        // Rehydrated from storage with the attached user intact.
        let again = directory.get("idle", &storage);
        match again.lookup(Utc::now()).await.unwrap() {
            Lookup::Active(session) => assert_eq!(session.user_id, Some(user)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn evict_only_removes_the_same_actor() {
        // ---
        let storage = storage();
        let directory = ActorDirectory::new();
        let stale = Arc::new(SessionActor::dormant("x".into(), storage.clone()));
        let live = directory.get("x", &storage);

        directory.evict(&stale);
        assert_eq!(directory.len(), 1);
        directory.evict(&live);
        assert!(directory.is_empty());
    }

    /// Memory storage that claims to be shared, standing in for Redis.
    struct SharedStorage(SessionStoragePtr);

    #[async_trait::async_trait]
    impl SessionStorage for SharedStorage {
        async fn load(&self, session_id: &str) -> AuthResult<Option<Session>> {
            self.0.load(session_id).await
        }
        async fn save(&self, session: &Session) -> AuthResult<()> {
            self.0.save(session).await
        }
        fn shares_state(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn revocation_by_another_process_is_seen_on_shared_storage() {
        // ---
        let backing = storage();
        let shared: SessionStoragePtr = Arc::new(SharedStorage(backing.clone()));
        let directory = ActorDirectory::new();
        let actor = directory.spawn(fresh("s4"), &shared).await.unwrap();
        assert!(matches!(actor.lookup(Utc::now()).await.unwrap(), Lookup::Active(_)));

        // Another instance revokes the session directly in storage.
        let mut elsewhere = backing.load("s4").await.unwrap().unwrap();
        elsewhere.revoked = true;
        backing.save(&elsewhere).await.unwrap();

        assert_eq!(actor.lookup(Utc::now()).await.unwrap(), Lookup::Revoked);
        assert!(actor.attach_user(Uuid::new_v4(), Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn private_storage_is_read_once() {
        // ---
        let storage = storage();
        let directory = ActorDirectory::new();
        let actor = directory.spawn(fresh("s5"), &storage).await.unwrap();

        let mut elsewhere = storage.load("s5").await.unwrap().unwrap();
        elsewhere.revoked = true;
        storage.save(&elsewhere).await.unwrap();

        // Only this actor writes in-process storage, so the cache stands.
        assert!(matches!(actor.lookup(Utc::now()).await.unwrap(), Lookup::Active(_)));
    }
}
