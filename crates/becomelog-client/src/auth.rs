use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use becomelog_types::auth::{AuthState, AuthStatus};

use crate::store::{MemoryTokenStore, TokenStore};

/// Token used when nothing is persisted and none is configured.
pub const DEFAULT_DEV_TOKEN: &str = "local-dev-token";

type Listener = Arc<dyn Fn(&AuthState) + Send + Sync>;

/// Standalone auth session for local development.
///
/// There is no sign-in flow: the session starts authenticated with a
/// persisted or configured token, and callers swap it with [`set_token`] or
/// drop it with [`clear`]. Clones share the same state and may be used from
/// any thread.
///
/// Listeners registered with [`subscribe`] get the current state and then
/// every change, in order. Notifications go through one queue drained by one
/// caller at a time: a change made from inside a listener (or on another
/// thread during delivery) is applied immediately but notified once the
/// current round has returned, so listeners are never re-entered.
///
/// [`set_token`]: AuthSession::set_token
/// [`clear`]: AuthSession::clear
/// [`subscribe`]: AuthSession::subscribe
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn TokenStore>,
    /// Held across a whole change so the store and the state agree.
    writer: Mutex<()>,
    core: Mutex<Core>,
    delivering: AtomicBool,
    changes_tx: broadcast::Sender<AuthState>,
}

struct Core {
    state: AuthState,
    /// Sequence number of the latest change.
    seq: u64,
    listeners: Vec<Registered>,
    next_listener_id: u64,
    /// Work waiting to be delivered, oldest first.
    pending: VecDeque<Delivery>,
}

struct Registered {
    id: u64,
    /// Changes up to this sequence number predate the subscription.
    since: u64,
    listener: Listener,
}

enum Delivery {
    Change { seq: u64, state: AuthState },
    Initial { listener_id: u64, state: AuthState },
}

/// Clears the delivering flag even if a listener panics.
struct DeliveryGuard<'a>(&'a AtomicBool);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthSession {
    /// Start a session from `store`, falling back to `default_token` and then
    /// to [`DEFAULT_DEV_TOKEN`] when nothing is persisted.
    ///
    /// The store must not call back into the session.
    pub fn new(store: Arc<dyn TokenStore>, default_token: Option<String>) -> Self {
        let stored = match store.load() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Token store unavailable, ignoring persisted token: {:#}", e);
                None
            }
        };

        let (token, source) = match (stored, default_token.filter(|t| !t.is_empty())) {
            (Some(token), _) => (token, "persisted"),
            (None, Some(token)) => (token, "configured"),
            (None, None) => (DEFAULT_DEV_TOKEN.to_string(), "default"),
        };

        info!("Running in standalone mode - auth bypassed");
        info!("Using {} auth token", source);

        let (changes_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(SessionInner {
                store,
                writer: Mutex::new(()),
                core: Mutex::new(Core {
                    state: AuthState::with_token(Some(token)),
                    seq: 0,
                    listeners: Vec::new(),
                    next_listener_id: 0,
                    pending: VecDeque::new(),
                }),
                delivering: AtomicBool::new(false),
                changes_tx,
            }),
        }
    }

    /// Session that persists nothing beyond the process.
    pub fn in_memory(default_token: Option<String>) -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()), default_token)
    }

    /// Completes immediately; there is nothing to wait for in standalone mode.
    pub async fn wait_for_initialization(&self) {}

    pub fn token(&self) -> Option<String> {
        self.inner.core.lock().state.token.clone()
    }

    pub async fn token_async(&self) -> Option<String> {
        self.token()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.core.lock().state.status
    }

    pub fn state(&self) -> AuthState {
        self.inner.core.lock().state.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub fn has_invalid_token(&self) -> bool {
        self.status() == AuthStatus::InvalidToken
    }

    pub fn has_no_token(&self) -> bool {
        self.inner.core.lock().state.token.is_none()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == AuthStatus::Loading
    }

    /// Replace the token and persist it. `None` (or an empty token) signs out.
    pub fn set_token(&self, token: Option<String>) {
        let token = token.filter(|t| !t.is_empty());
        if token.is_some() {
            info!("Auth token updated");
        } else {
            info!("Auth token removed");
        }
        self.apply(AuthState::with_token(token));
    }

    pub async fn set_token_async(&self, token: Option<String>) {
        self.set_token(token);
    }

    /// Drop the token, reset the state and forget the persisted copy.
    pub fn clear(&self) {
        info!("Auth cleared");
        self.apply(AuthState::signed_out());
    }

    /// Attach the current token, if any, as a bearer credential.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Call `listener` with the current state and after every later change.
    ///
    /// The first call happens before this returns unless a delivery round is
    /// already running, in which case it is queued behind that round.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let id = {
            let mut core = self.inner.core.lock();
            let id = core.next_listener_id;
            core.next_listener_id += 1;

            let since = core.seq;
            core.listeners.push(Registered {
                id,
                since,
                listener: Arc::new(listener),
            });
            let state = core.state.clone();
            core.pending.push_back(Delivery::Initial {
                listener_id: id,
                state,
            });
            id
        };
        self.deliver();

        Subscription {
            id,
            session: Arc::downgrade(&self.inner),
        }
    }

    /// Receive every state change on a channel.
    pub fn watch(&self) -> broadcast::Receiver<AuthState> {
        self.inner.changes_tx.subscribe()
    }

    fn apply(&self, next: AuthState) {
        {
            let _writer = self.inner.writer.lock();
            self.persist(next.token.as_deref());

            let mut core = self.inner.core.lock();
            core.seq += 1;
            let seq = core.seq;
            core.state = next.clone();
            core.pending.push_back(Delivery::Change { seq, state: next });
        }
        self.deliver();
    }

    fn persist(&self, token: Option<&str>) {
        let result = match token {
            Some(token) => self.inner.store.save(token),
            None => self.inner.store.remove(),
        };
        if let Err(e) = result {
            warn!("Failed to persist auth token: {:#}", e);
        }
    }

    /// Drain the queue unless another call is already doing so.
    fn deliver(&self) {
        loop {
            if self.inner.delivering.swap(true, Ordering::AcqRel) {
                return;
            }

            {
                let _guard = DeliveryGuard(&self.inner.delivering);
                while let Some((listeners, state, is_change)) = self.next_delivery() {
                    for listener in &listeners {
                        listener(&state);
                    }
                    if is_change {
                        // No receivers is fine.
                        let _ = self.inner.changes_tx.send(state);
                    }
                }
            }

            // Work queued between the last pop and the guard's release
            // would otherwise wait for the next change.
            if self.inner.core.lock().pending.is_empty() {
                return;
            }
        }
    }

    /// Pop the next delivery with the listeners it goes to.
    fn next_delivery(&self) -> Option<(Vec<Listener>, AuthState, bool)> {
        let mut core = self.inner.core.lock();
        let delivery = core.pending.pop_front()?;
        Some(match delivery {
            Delivery::Change { seq, state } => {
                let listeners = core
                    .listeners
                    .iter()
                    .filter(|entry| entry.since < seq)
                    .map(|entry| entry.listener.clone())
                    .collect();
                (listeners, state, true)
            }
            Delivery::Initial { listener_id, state } => {
                let listeners = core
                    .listeners
                    .iter()
                    .filter(|entry| entry.id == listener_id)
                    .map(|entry| entry.listener.clone())
                    .collect();
                (listeners, state, false)
            }
        })
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("AuthSession")
            .field("status", &core.state.status)
            .field("listeners", &core.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`AuthSession::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    session: Weak<SessionInner>,
}

impl Subscription {
    /// Stop notifications. A no-op once the session is gone.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.session.upgrade() {
            inner.core.lock().listeners.retain(|entry| entry.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    use anyhow::{Result, anyhow};

    /// Store whose every operation fails.
    struct BrokenStore;

    impl TokenStore for BrokenStore {
        fn load(&self) -> Result<Option<String>> {
            Err(anyhow!("storage disabled"))
        }
        fn save(&self, _token: &str) -> Result<()> {
            Err(anyhow!("storage disabled"))
        }
        fn remove(&self) -> Result<()> {
            Err(anyhow!("storage disabled"))
        }
    }

    /// Memory store whose `save` of one particular token is slow.
    struct SlowStore {
        inner: MemoryTokenStore,
        slow_token: &'static str,
    }

    impl TokenStore for SlowStore {
        fn load(&self) -> Result<Option<String>> {
            self.inner.load()
        }
        fn save(&self, token: &str) -> Result<()> {
            if token == self.slow_token {
                thread::sleep(Duration::from_millis(200));
            }
            self.inner.save(token)
        }
        fn remove(&self) -> Result<()> {
            self.inner.remove()
        }
    }

    fn recorder(session: &AuthSession) -> (Arc<Mutex<Vec<Option<String>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = session.subscribe(move |state| sink.lock().push(state.token.clone()));
        (seen, sub)
    }

    #[test]
    fn persisted_token_wins() {
        let store = Arc::new(MemoryTokenStore::with_token("stored"));
        let session = AuthSession::new(store, Some("configured".into()));
        assert_eq!(session.token().as_deref(), Some("stored"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn falls_back_to_configured_then_default() {
        let session = AuthSession::in_memory(Some("configured".into()));
        assert_eq!(session.token().as_deref(), Some("configured"));

        let session = AuthSession::in_memory(None);
        assert_eq!(session.token().as_deref(), Some(DEFAULT_DEV_TOKEN));
        assert_eq!(session.status(), AuthStatus::Authenticated);
        assert!(!session.has_no_token());
        assert!(!session.has_invalid_token());
        assert!(!session.is_loading());
    }

    #[test]
    fn unreadable_store_falls_back() {
        let session = AuthSession::new(Arc::new(BrokenStore), Some("configured".into()));
        assert_eq!(session.token().as_deref(), Some("configured"));
    }

    #[test]
    fn unwritable_store_still_updates_state() {
        let session = AuthSession::new(Arc::new(BrokenStore), None);
        session.set_token(Some("next".into()));
        assert_eq!(session.token().as_deref(), Some("next"));

        session.clear();
        assert!(session.has_no_token());
    }

    #[test]
    fn set_token_persists() {
        let store = Arc::new(MemoryTokenStore::new());
        let session = AuthSession::new(store.clone(), None);

        session.set_token(Some("abc".into()));
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        assert_eq!(session.state(), AuthState::with_token(Some("abc".into())));

        session.set_token(None);
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(session.status(), AuthStatus::Unauthenticated);
        assert!(session.has_no_token());
    }

    #[test]
    fn empty_token_signs_out() {
        let session = AuthSession::in_memory(None);
        session.set_token(Some(String::new()));
        assert!(session.has_no_token());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn clear_resets_everything() {
        let store = Arc::new(MemoryTokenStore::with_token("stored"));
        let session = AuthSession::new(store.clone(), None);

        session.clear();
        assert_eq!(session.state(), AuthState::signed_out());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn next_session_after_clear_starts_from_default() {
        let store: Arc<MemoryTokenStore> = Arc::new(MemoryTokenStore::with_token("stored"));
        AuthSession::new(store.clone(), Some("configured".into())).clear();

        let next = AuthSession::new(store.clone(), Some("configured".into()));
        assert_eq!(next.token().as_deref(), Some("configured"));

        let next = AuthSession::new(store, None);
        assert_eq!(next.token().as_deref(), Some(DEFAULT_DEV_TOKEN));
    }

    #[test]
    fn clones_share_state() {
        let session = AuthSession::in_memory(None);
        let other = session.clone();
        other.set_token(Some("shared".into()));
        assert_eq!(session.token().as_deref(), Some("shared"));
    }

    #[test]
    fn subscriber_sees_current_state_then_changes() {
        let session = AuthSession::in_memory(Some("first".into()));
        let (seen, sub) = recorder(&session);

        session.set_token(Some("second".into()));
        session.clear();
        sub.unsubscribe();
        session.set_token(Some("unseen".into()));

        assert_eq!(
            *seen.lock(),
            vec![Some("first".to_string()), Some("second".to_string()), None]
        );
    }

    #[test]
    fn subscriptions_outlive_session() {
        let session = AuthSession::in_memory(None);
        let sub = session.subscribe(|_| {});
        drop(session);
        sub.unsubscribe();
    }

    #[test]
    fn changes_from_listeners_are_queued() {
        let session = AuthSession::in_memory(Some("start".into()));
        let depth = Arc::new(AtomicUsize::new(0));
        let max_depth = Arc::new(AtomicUsize::new(0));

        let handle = session.clone();
        let (d, m) = (depth.clone(), max_depth.clone());
        let _redirect = session.subscribe(move |state| {
            let now = d.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            if state.token.as_deref() == Some("a") {
                handle.set_token(Some("b".into()));
                // Applied at once, delivered later.
                assert_eq!(handle.token().as_deref(), Some("b"));
            }
            d.fetch_sub(1, Ordering::SeqCst);
        });
        let (seen, _sub) = recorder(&session);

        session.set_token(Some("a".into()));

        assert_eq!(max_depth.load(Ordering::SeqCst), 1);
        assert_eq!(
            *seen.lock(),
            vec![
                Some("start".to_string()),
                Some("a".to_string()),
                Some("b".to_string())
            ]
        );
        assert_eq!(session.token().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn watch_receives_changes() {
        let session = AuthSession::in_memory(None);
        let mut rx = session.watch();

        session.set_token_async(Some("async".into())).await;
        session.clear();

        assert_eq!(rx.recv().await.unwrap().token.as_deref(), Some("async"));
        assert_eq!(rx.recv().await.unwrap(), AuthState::signed_out());
        assert_eq!(session.token_async().await, None);
        session.wait_for_initialization().await;
    }

    #[test]
    fn authorize_attaches_bearer() {
        let session = AuthSession::in_memory(Some("tok".into()));
        let request = session
            .authorize(reqwest::Client::new().get("http://localhost/api/entries"))
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer tok");

        session.clear();
        let request = session
            .authorize(reqwest::Client::new().get("http://localhost/api/entries"))
            .build()
            .unwrap();
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn session_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthSession>();
        assert_send_sync::<Subscription>();
    }

    #[test]
    fn concurrent_changes_leave_store_state_and_listeners_agreeing() {
        let store = Arc::new(SlowStore {
            inner: MemoryTokenStore::new(),
            slow_token: "a",
        });
        let session = AuthSession::new(store.clone(), Some("start".into()));
        let (seen, _sub) = recorder(&session);

        let first = session.clone();
        let writer = thread::spawn(move || first.set_token(Some("a".into())));
        thread::sleep(Duration::from_millis(50));
        session.set_token(Some("b".into()));
        writer.join().unwrap();

        assert_eq!(session.token().as_deref(), Some("b"));
        assert_eq!(store.load().unwrap().as_deref(), Some("b"));
        assert_eq!(
            *seen.lock(),
            vec![
                Some("start".to_string()),
                Some("a".to_string()),
                Some("b".to_string())
            ]
        );
    }

    #[test]
    fn many_threads_deliver_every_change_once_and_in_order() {
        let store = Arc::new(MemoryTokenStore::new());
        let session = AuthSession::new(store.clone(), None);
        let (seen, _sub) = recorder(&session);
        let in_listener = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));

        let (busy, flag) = (in_listener.clone(), overlapped.clone());
        let _overlap_check = session.subscribe(move |_| {
            if busy.fetch_add(1, Ordering::SeqCst) > 0 {
                flag.store(true, Ordering::SeqCst);
            }
            thread::yield_now();
            busy.fetch_sub(1, Ordering::SeqCst);
        });

        let workers: Vec<_> = (0..8)
            .map(|t| {
                let session = session.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        session.set_token(Some(format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 1 + 8 * 50);
        assert_eq!(seen.last().unwrap(), &session.token());
        assert_eq!(store.load().unwrap(), session.token());
        assert!(!overlapped.load(Ordering::SeqCst));

        // Each thread's own changes arrive in the order it made them.
        for t in 0..8 {
            let prefix = format!("{t}-");
            let order: Vec<u32> = seen
                .iter()
                .flatten()
                .filter_map(|token| token.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(order, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn panicking_listener_does_not_stall_later_changes() {
        let session = AuthSession::in_memory(Some("start".into()));
        let _faulty = session.subscribe(|state| {
            if state.token.as_deref() == Some("x") {
                panic!("listener failure");
            }
        });
        let mut rx = session.watch();

        let result = catch_unwind(AssertUnwindSafe(|| session.set_token(Some("x".into()))));
        assert!(result.is_err());
        assert_eq!(session.token().as_deref(), Some("x"));

        let (seen, _sub) = recorder(&session);
        session.set_token(Some("y".into()));

        assert_eq!(*seen.lock(), vec![Some("x".to_string()), Some("y".to_string())]);
        assert_eq!(rx.try_recv().unwrap().token.as_deref(), Some("y"));
    }

    #[test]
    fn subscribing_inside_a_listener_waits_for_queued_changes() {
        let session = AuthSession::in_memory(Some("start".into()));
        let late: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let late_sub: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let depth = Arc::new(AtomicUsize::new(0));

        let handle = session.clone();
        let (sink, slot, d) = (late.clone(), late_sub.clone(), depth.clone());
        let _outer = session.subscribe(move |state| {
            d.fetch_add(1, Ordering::SeqCst);
            if state.token.as_deref() == Some("a") {
                handle.set_token(Some("b".into()));

                let inner_sink = sink.clone();
                let d = d.clone();
                let sub = handle.subscribe(move |state| {
                    // Never called while the outer listener is running.
                    assert_eq!(d.load(Ordering::SeqCst), 0);
                    inner_sink.lock().push(state.token.clone());
                });
                *slot.lock() = Some(sub);
                assert!(sink.lock().is_empty());
            }
            d.fetch_sub(1, Ordering::SeqCst);
        });

        session.set_token(Some("a".into()));
        assert_eq!(*late.lock(), vec![Some("b".to_string())]);

        session.set_token(Some("c".into()));
        assert_eq!(*late.lock(), vec![Some("b".to_string()), Some("c".to_string())]);

        if let Some(sub) = late_sub.lock().take() {
            sub.unsubscribe();
        }
        session.clear();
        assert_eq!(late.lock().len(), 2);
    }

    #[test]
    fn unsubscribing_before_first_delivery_stays_silent() {
        let session = AuthSession::in_memory(Some("start".into()));
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = session.clone();
        let counter = calls.clone();
        let _outer = session.subscribe(move |state| {
            if state.token.as_deref() == Some("a") {
                let counter = counter.clone();
                let sub = handle.subscribe(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
                sub.unsubscribe();
            }
        });

        session.set_token(Some("a".into()));
        session.set_token(Some("b".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
