// console/src/session.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use common::{
    decode_claims_unverified, InvalidationReason, Session, SessionEvent, SessionStatus,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backend::AuthBackend;
use crate::clock::Clock;
use crate::errors::{AuthError, SessionError};
use crate::notifier::Notifier;
use crate::storage::{SessionStorage, StorageError, EXPIRY_KEY, TOKEN_KEY};
use crate::validation::validate_login;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired";
pub const LOGIN_SUCCESS_MESSAGE: &str = "Session started successfully";

const EVENT_CAPACITY: usize = 16;

/// Owner of authenticated state that must be reset when the session ends
pub trait SessionObserver: Send + Sync {
    fn on_session_invalidated(&self, reason: InvalidationReason);
}

/// Handle to the operator session.
///
/// Cloning is cheap and every clone sees the same session. The session is
/// either active (token plus expiry) or empty; expiry is detected both
/// lazily, whenever a caller checks, and eagerly by a timer scheduled for
/// the expiry instant.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    auth: Arc<dyn AuthBackend>,
    notifier: Notifier,
    state: Mutex<SessionState>,
    restored: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
    observers: Mutex<Vec<Weak<dyn SessionObserver>>>,
}

#[derive(Default)]
struct SessionState {
    session: Session,
    // identifies the login the pending timer belongs to
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        auth: Arc<dyn AuthBackend>,
        notifier: Notifier,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                storage,
                clock,
                auth,
                notifier,
                state: Mutex::new(SessionState::default()),
                restored: AtomicBool::new(false),
                events,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Pick up a session persisted by an earlier run.
    ///
    /// Returns whether an unexpired session was found. Anything else in
    /// storage (expired, half-written, unparsable) is cleared.
    pub fn restore(&self) -> Result<bool, SessionError> {
        if self.inner.restored.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyRestored);
        }

        let (token, expires_at) = match self.read_persisted() {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!("Discarding unreadable persisted session: {}", e);
                if let Err(e) = self.inner.storage.clear() {
                    tracing::warn!("Could not reset session storage: {}", e);
                }
                return Ok(false);
            }
        };
        let now = self.inner.clock.now();

        match (token, expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() && now < expires_at => {
                tracing::info!("Restored session valid for {}s", expires_at - now);
                self.activate(token, expires_at);
                Ok(true)
            },
            (None, None) => {
                tracing::debug!("No persisted session");
                Ok(false)
            },
            _ => {
                tracing::info!("Discarding expired or incomplete persisted session");
                self.clear_storage()?;
                Ok(false)
            }
        }
    }

    /// Exchange credentials for a token and start a session with it
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        validate_login(email, password).map_err(AuthError::Validation)?;

        let token = match self.inner.auth.login(email.trim(), password).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                return Err(self.login_failed(AuthError::from_backend(&e)));
            }
        };

        let expires_at = match decode_claims_unverified(&token) {
            Ok(claims) => claims.exp,
            Err(e) => {
                tracing::warn!("Login returned an unreadable token: {}", e);
                return Err(self.login_failed(AuthError::Failed(e.to_string())));
            }
        };

        let now = self.inner.clock.now();
        if expires_at <= now {
            tracing::warn!("Login returned a token that expired at {}", expires_at);
            return Err(self.login_failed(AuthError::Failed("token already expired".to_string())));
        }

        if let Err(e) = self.persist(&token, expires_at) {
            tracing::error!("Could not persist session: {}", e);
            // storage may hold a half-written pair
            if let Err(e) = self.clear_storage() {
                tracing::warn!("Could not clear session storage: {}", e);
            }
            return Err(self.login_failed(AuthError::Failed(e.to_string())));
        }

        self.activate(token.clone(), expires_at);
        let _ = self.inner.events.send(SessionEvent::LoggedIn { expires_at });
        tracing::info!("Session started, expires in {}s", expires_at - now);
        self.inner.notifier.success(LOGIN_SUCCESS_MESSAGE);

        Ok(token)
    }

    /// End the session now and drop everything that depended on it
    pub fn logout(&self) -> Result<(), SessionError> {
        tracing::info!("Logging out");
        self.invalidate(InvalidationReason::Logout)
    }

    /// Whether a token is held and its expiry is still ahead.
    ///
    /// Never changes the session. Emits the expired notification when the
    /// check fails because an existing token ran out.
    pub fn is_authenticated(&self) -> bool {
        match self.status() {
            SessionStatus::Active { .. } => true,
            SessionStatus::Expired => {
                self.inner.notifier.error(SESSION_EXPIRED_MESSAGE);
                false
            },
            SessionStatus::Anonymous => false,
        }
    }

    /// Gate for operations that need the token.
    ///
    /// Returns the token while the session is active. Otherwise emits one
    /// expired notification, ends an expired session, and returns `None`.
    pub fn authorize(&self) -> Option<String> {
        match self.status() {
            SessionStatus::Active { token, .. } => Some(token),
            status => {
                self.inner.notifier.error(SESSION_EXPIRED_MESSAGE);
                if status == SessionStatus::Expired {
                    tracing::info!("Session expired, detected on use");
                    if let Err(e) = self.invalidate(InvalidationReason::Expired) {
                        tracing::warn!("Could not clear expired session: {}", e);
                    }
                } else if !self.inner.restored.load(Ordering::SeqCst) {
                    tracing::warn!("Gated operation attempted before session restore");
                }
                None
            }
        }
    }

    /// Session status at the current instant, without side effects
    pub fn status(&self) -> SessionStatus {
        let now = self.inner.clock.now();
        self.lock_state().session.status_at(now)
    }

    /// The held token, whether or not it has expired
    pub fn token(&self) -> Option<String> {
        self.lock_state().session.token.clone()
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.lock_state().session.expires_at
    }

    /// Current time in epoch seconds, from the session's clock
    pub fn now(&self) -> i64 {
        self.inner.clock.now()
    }

    pub fn show_notification(&self, message: impl Into<String>) {
        self.inner.notifier.info(message);
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Register an owner of authenticated state; held weakly
    pub fn register_observer(&self, observer: Weak<dyn SessionObserver>) {
        let mut observers = self.lock_observers();
        observers.retain(|o| o.strong_count() > 0);
        observers.push(observer);
    }

    pub fn observe<O: SessionObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn SessionObserver> = observer.clone();
        self.register_observer(Arc::downgrade(&observer));
    }

    /// Stop the expiry timer and forget observers. The session itself is kept.
    pub fn dispose(&self) {
        if let Some(timer) = self.lock_state().timer.take() {
            timer.abort();
        }
        self.lock_observers().clear();
        tracing::debug!("Session manager disposed");
    }

    fn login_failed(&self, error: AuthError) -> AuthError {
        self.inner.notifier.error(error.to_string());
        error
    }

    fn persist(&self, token: &str, expires_at: i64) -> Result<(), StorageError> {
        self.inner.storage.set(TOKEN_KEY, token)?;
        self.inner.storage.set(EXPIRY_KEY, &expires_at.to_string())
    }

    fn read_persisted(&self) -> Result<(Option<String>, Option<i64>), StorageError> {
        let token = self.inner.storage.get(TOKEN_KEY)?;
        let expires_at = self
            .inner
            .storage
            .get(EXPIRY_KEY)?
            .and_then(|value| value.trim().parse::<i64>().ok());
        Ok((token, expires_at))
    }

    fn clear_storage(&self) -> Result<(), StorageError> {
        let removed = self
            .inner
            .storage
            .remove(TOKEN_KEY)
            .and_then(|_| self.inner.storage.remove(EXPIRY_KEY));

        if let Err(e) = removed {
            tracing::warn!("Could not remove persisted session ({}), clearing storage", e);
            self.inner.storage.clear()?;
        }
        Ok(())
    }

    // Install the session in memory and schedule its expiry
    fn activate(&self, token: String, expires_at: i64) {
        let delay = Duration::from_secs((expires_at - self.inner.clock.now()).max(0) as u64);

        let mut state = self.lock_state();
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }
        state.generation += 1;
        state.session = Session::active(token, expires_at);
        state.timer = self.schedule_expiry(state.generation, delay);
    }

    fn schedule_expiry(&self, generation: u64, delay: Duration) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("No runtime, expiry will only be detected on use");
                return None;
            }
        };

        let inner = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                SessionManager { inner }.expire_from_timer(generation);
            }
        }))
    }

    fn expire_from_timer(&self, generation: u64) {
        {
            let mut state = self.lock_state();
            if state.generation != generation || state.session.is_empty() {
                return;
            }
            // this task is the timer; detach rather than abort it
            state.timer.take();
        }

        tracing::info!("Session expired, timer fired");
        self.inner.notifier.error(SESSION_EXPIRED_MESSAGE);
        if let Err(e) = self.invalidate(InvalidationReason::Expired) {
            tracing::warn!("Could not clear expired session: {}", e);
        }
    }

    // Single path every way of ending a session goes through
    fn invalidate(&self, reason: InvalidationReason) -> Result<(), SessionError> {
        let timer = {
            let mut state = self.lock_state();
            state.session.clear();
            state.generation += 1;
            state.timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
        }

        let stored = self.clear_storage();

        let observers: Vec<Arc<dyn SessionObserver>> = {
            let mut observers = self.lock_observers();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.on_session_invalidated(reason);
        }

        let _ = self.inner.events.send(SessionEvent::Invalidated(reason));
        stored.map_err(SessionError::from)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Weak<dyn SessionObserver>>> {
        self.inner.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish()
    }
}
