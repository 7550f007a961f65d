use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use {
    serde_json::Value,
    tokio::sync::mpsc,
    tracing::{debug, info},
};

/// Process-wide sequence appended to session ids.
static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_session_id() -> String {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{ms}-{seq}")
}

// ── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// One open control-protocol connection.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub client_id: Option<String>,
    pub opened_at: Instant,
    state: SessionState,
    /// Serialized frames for the client's event stream.
    outbound: mpsc::UnboundedSender<String>,
    /// Inbound frames for the session's dispatch worker.
    inbox: mpsc::UnboundedSender<Value>,
}

/// Receiving ends handed to the caller of [`SessionRegistry::open`].
#[derive(Debug)]
pub struct OpenedSession {
    pub id: String,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub inbox: mpsc::UnboundedReceiver<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Connection not found")]
    NotFound,
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Owns every open session. One lock guards the table; removal under the
/// lock is the only way a session's handles are released.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an open session and return its id with the receiving ends.
    pub fn open(&self, client_id: Option<String>) -> OpenedSession {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let id = next_session_id();

        self.table().insert(id.clone(), Session {
            id: id.clone(),
            client_id: client_id.clone(),
            opened_at: Instant::now(),
            state: SessionState::Open,
            outbound: outbound_tx,
            inbox: inbox_tx,
        });
        info!(session = %id, client_id = client_id.as_deref().unwrap_or("-"), "session opened");

        OpenedSession {
            id,
            outbound: outbound_rx,
            inbox: inbox_rx,
        }
    }

    /// Forward an inbound frame to the session's dispatch worker.
    pub fn route(&self, id: &str, frame: Value) -> Result<(), RouteError> {
        let mut table = self.table();
        let session = table
            .get(id)
            .filter(|s| s.state == SessionState::Open)
            .ok_or(RouteError::NotFound)?;
        if session.inbox.send(frame).is_err() {
            // Worker already gone.
            Self::release(&mut table, id);
            return Err(RouteError::NotFound);
        }
        Ok(())
    }

    /// Send a frame to the client. A failed send closes the session and is
    /// not retried.
    pub fn push(&self, id: &str, frame: String) -> Result<(), RouteError> {
        let mut table = self.table();
        let session = table.get(id).ok_or(RouteError::NotFound)?;
        if session.outbound.send(frame).is_err() {
            debug!(session = %id, "push failed, closing session");
            Self::release(&mut table, id);
            return Err(RouteError::NotFound);
        }
        Ok(())
    }

    /// Close and forget a session. Unknown or already closed ids are a no-op
    /// returning `false`.
    pub fn close(&self, id: &str) -> bool {
        Self::release(&mut self.table(), id)
    }

    fn release(table: &mut HashMap<String, Session>, id: &str) -> bool {
        match table.remove(id) {
            Some(mut session) => {
                session.state = SessionState::Closed;
                info!(
                    session = %id,
                    client_id = session.client_id.as_deref().unwrap_or("-"),
                    open_ms = session.opened_at.elapsed().as_millis() as u64,
                    "session closed"
                );
                true
            },
            None => false,
        }
    }

    /// Close every session, ending their event streams. Returns how many
    /// were open.
    pub fn close_all(&self) -> usize {
        let mut table = self.table();
        let ids: Vec<String> = table.keys().cloned().collect();
        ids.iter().filter(|id| Self::release(&mut table, id)).count()
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.table().contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.table().len()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        serde_json::json,
        std::{collections::HashSet, sync::Arc},
    };

    #[test]
    fn ids_are_unique() {
        let registry = SessionRegistry::new();
        let ids: HashSet<String> = (0..500).map(|_| registry.open(None).id).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn route_delivers_until_close() {
        let registry = SessionRegistry::new();
        let mut opened = registry.open(Some("client-a".into()));
        registry.route(&opened.id, json!({"n": 1})).unwrap();
        assert_eq!(opened.inbox.try_recv().unwrap(), json!({"n": 1}));
        assert!(registry.is_open(&opened.id));

        assert!(registry.close(&opened.id));
        assert_eq!(registry.route(&opened.id, json!({})), Err(RouteError::NotFound));
        assert!(opened.inbox.try_recv().is_err());
    }

    #[test]
    fn never_opened_is_not_found() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.route("0-0", json!({})), Err(RouteError::NotFound));
        assert_eq!(registry.push("0-0", "{}".into()), Err(RouteError::NotFound));
    }

    #[test]
    fn close_is_idempotent() {
        let registry = SessionRegistry::new();
        let opened = registry.open(None);
        assert!(registry.close(&opened.id));
        assert!(!registry.close(&opened.id));
        assert!(!registry.close("unknown"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn close_releases_outbound_handle() {
        let registry = SessionRegistry::new();
        let mut opened = registry.open(None);
        registry.push(&opened.id, "hello".into()).unwrap();
        registry.close(&opened.id);
        assert_eq!(opened.outbound.try_recv().unwrap(), "hello");
        // Sender dropped: the stream sees the end.
        assert!(matches!(
            opened.outbound.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn close_all_ends_every_stream() {
        let registry = SessionRegistry::new();
        let mut a = registry.open(None);
        let mut b = registry.open(Some("c".into()));
        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.count(), 0);
        for outbound in [&mut a.outbound, &mut b.outbound] {
            assert!(matches!(
                outbound.try_recv(),
                Err(mpsc::error::TryRecvError::Disconnected)
            ));
        }
    }

    #[test]
    fn failed_push_closes_session() {
        let registry = SessionRegistry::new();
        let opened = registry.open(None);
        let id = opened.id.clone();
        drop(opened.outbound);
        assert_eq!(registry.push(&id, "x".into()), Err(RouteError::NotFound));
        assert!(!registry.is_open(&id));
        assert_eq!(registry.push(&id, "x".into()), Err(RouteError::NotFound));
    }

    #[test]
    fn dropped_worker_makes_route_fail() {
        let registry = SessionRegistry::new();
        let opened = registry.open(None);
        let id = opened.id.clone();
        drop(opened.inbox);
        assert_eq!(registry.route(&id, json!({})), Err(RouteError::NotFound));
        assert!(!registry.is_open(&id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_open_close_release_once() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let opened = registry.open(None);
                registry.route(&opened.id, json!({})).unwrap();

                // Two racing closers: exactly one wins.
                let a = {
                    let registry = Arc::clone(&registry);
                    let id = opened.id.clone();
                    tokio::spawn(async move { registry.close(&id) })
                };
                let b = {
                    let registry = Arc::clone(&registry);
                    let id = opened.id.clone();
                    tokio::spawn(async move { registry.close(&id) })
                };
                let (a, b) = (a.await.unwrap(), b.await.unwrap());
                assert!(a ^ b);
                assert_eq!(registry.route(&opened.id, json!({})), Err(RouteError::NotFound));
                opened.id
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(registry.count(), 0);
    }
}
