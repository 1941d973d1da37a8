//! Sessions
//!
//! A session is created at sign-in and owns the customer context and the view
//! board for that user. Sessions live in memory and expire after a fixed TTL.

pub mod context;
pub mod identity;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::views::ViewBoard;

pub use context::{CustomerContext, Scope};
pub use identity::{FirebaseIdentity, Identity, IdentityProvider};

pub struct Session {
    pub id: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
    context: RwLock<CustomerContext>,
    pub views: ViewBoard,
}

impl Session {
    fn new(identity: Identity, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        Self {
            id: Uuid::new_v4().to_string(),
            context: RwLock::new(CustomerContext::for_email(identity.email.clone())),
            identity,
            expires_at: Utc::now() + ttl,
            views: ViewBoard::default(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Snapshot of the customer context.
    pub async fn context(&self) -> CustomerContext {
        self.context.read().await.clone()
    }

    /// Apply `f` under the context's write lock and return the new snapshot.
    pub async fn update_context<R>(&self, f: impl FnOnce(&mut CustomerContext) -> R) -> (R, CustomerContext) {
        let mut ctx = self.context.write().await;
        let out = f(&mut ctx);
        (out, ctx.clone())
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self, identity: Identity) -> Arc<Session> {
        let session = Arc::new(Session::new(identity, self.ttl));
        info!("Session opened for {}", session.identity.email);
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        session
    }

    /// Live session by id; an expired one is dropped on the way.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        if session.is_expired() {
            debug!("Session for {} expired", session.identity.email);
            self.sessions.write().await.remove(id);
            return None;
        }
        Some(session)
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    /// Drop every expired session, returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
