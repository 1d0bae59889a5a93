//! Session state holder.
//!
//! `SessionStore` is the single source of truth for "who is signed in". It owns the
//! current [`Session`] inside a `tokio::sync::watch` channel so every consumer can
//! take a cheap snapshot or subscribe to changes, and it is the only thing allowed to
//! mutate that state: `restore`, `login`, `logout` and storage-event re-derivation.
//!
//! Invariant: a published session carries a principal iff it carries a token that
//! decodes and names a role. Anything else is cleared (fail-closed).

mod storage;
mod exchange;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::{Principal, TokenDecoder};
use crate::tprintln;

pub use storage::{FileStorage, MemoryStorage, StorageError, StorageEvent, TokenStorage, TOKEN_KEY};
pub use exchange::{CredentialExchange, Credentials, HttpCredentialExchange, LOGIN_ENDPOINT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub raw_token: Option<String>,
    pub principal: Option<Principal>,
    pub is_loading: bool,
}

impl Session {
    pub fn loading() -> Self { Self { is_loading: true, ..Default::default() } }

    pub fn empty() -> Self { Self::default() }

    pub fn authenticated(token: impl Into<String>, principal: Principal) -> Self {
        Self { raw_token: Some(token.into()), principal: Some(principal), is_loading: false }
    }

    /// Snapshot for a token presented from outside the store (e.g. an HTTP request).
    /// An undecodable token is kept with no principal so the guard can report it.
    pub fn from_bearer(token: Option<&str>, decoder: &dyn TokenDecoder) -> Self {
        let Some(tok) = token.map(str::trim).filter(|t| !t.is_empty()) else { return Self::empty(); };
        let principal = decode_principal(decoder, tok);
        Self { raw_token: Some(tok.to_string()), principal, is_loading: false }
    }

    /// Canonical role of the signed-in principal, if any.
    pub fn role(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.role.as_str()).filter(|r| !r.is_empty())
    }

    pub fn has_token(&self) -> bool { self.raw_token.is_some() }

    pub fn is_authenticated(&self) -> bool { self.has_token() && self.role().is_some() }
}

fn decode_principal(decoder: &dyn TokenDecoder, token: &str) -> Option<Principal> {
    match decoder.decode(token) {
        Ok(claims) => Principal::from_claims(&claims),
        Err(e) => {
            debug!(target: "session", "token decode failed: {}", e);
            None
        }
    }
}

pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
    decoder: Arc<dyn TokenDecoder>,
    state: watch::Sender<Session>,
    /// Token this store signed out of. Storage events carrying it are ignored, so a
    /// token that could not be removed from storage is never adopted again.
    signed_out: Mutex<Option<String>>,
}

impl SessionStore {
    /// A store in the loading state; call [`SessionStore::restore`] once at startup.
    pub fn new(storage: Arc<dyn TokenStorage>, decoder: Arc<dyn TokenDecoder>) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self { storage, decoder, state, signed_out: Mutex::new(None) }
    }

    /// Create and immediately restore from persisted storage.
    pub fn open(storage: Arc<dyn TokenStorage>, decoder: Arc<dyn TokenDecoder>) -> Self {
        let store = Self::new(storage, decoder);
        store.restore();
        store
    }

    pub fn snapshot(&self) -> Session { self.state.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<Session> { self.state.subscribe() }

    fn publish(&self, next: Session) {
        self.state.send_replace(next);
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            warn!(target: "session", "failed to clear persisted token: {}", e);
        }
    }

    /// Re-derive the session from whatever token storage currently holds.
    pub fn restore(&self) -> Session {
        let stored = match self.storage.get(TOKEN_KEY) {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "session", "token storage unreadable, starting signed out: {}", e);
                None
            }
        };
        let next = match stored {
            None => Session::empty(),
            Some(tok) => match decode_principal(self.decoder.as_ref(), &tok) {
                Some(p) => {
                    info!(target: "session", "restored session role={} user={}", p.role, p.display_name());
                    Session::authenticated(tok, p)
                }
                None => {
                    info!(target: "session", "discarding persisted token that no longer decodes");
                    self.clear_persisted();
                    Session::empty()
                }
            },
        };
        self.publish(next.clone());
        next
    }

    /// Adopt a freshly issued token. On decode failure the session reverts to
    /// signed-out and storage is cleared; nothing half-authenticated is kept.
    pub fn login(&self, token: &str) -> AppResult<Principal> {
        let token = token.trim();
        self.storage.set(TOKEN_KEY, token)?;
        *self.signed_out.lock() = None;
        match decode_principal(self.decoder.as_ref(), token) {
            Some(p) => {
                tprintln!("session.login role={} user={}", p.role, p.display_name());
                info!(target: "session", "login role={} user={}", p.role, p.display_name());
                self.publish(Session::authenticated(token, p.clone()));
                Ok(p)
            }
            None => {
                warn!(target: "session", "login token rejected: invalid role");
                self.clear_persisted();
                self.publish(Session::empty());
                Err(AppError::invalid_token("invalid_token", "invalid role"))
            }
        }
    }

    /// Exchange credentials for a token, then [`SessionStore::login`] with it. A
    /// failed exchange leaves the current session untouched.
    pub async fn login_with<E>(&self, exchange: &E, credentials: &Credentials) -> AppResult<Principal>
    where
        E: CredentialExchange,
    {
        let token = exchange.exchange(credentials).await?;
        self.login(&token)
    }

    /// Clear storage and reset to the empty session. Safe to call repeatedly.
    /// The in-memory session is signed out even when storage cannot be cleared;
    /// the storage failure is still returned so the caller can report it.
    pub fn logout(&self) -> AppResult<()> {
        let was = self.snapshot();
        if was.raw_token.is_some() {
            *self.signed_out.lock() = was.raw_token.clone();
        }
        let cleared = self.storage.remove(TOKEN_KEY);
        self.publish(Session::empty());
        if let Some(p) = was.principal {
            info!(target: "session", "logout role={} user={}", p.role, p.display_name());
        }
        cleared.map_err(|e| {
            warn!(target: "session", "logout could not clear persisted token: {}", e);
            AppError::from(e)
        })
    }

    /// React to a storage change made elsewhere (another tab or process).
    pub fn apply_storage_event(&self, event: &StorageEvent) {
        if event.key != TOKEN_KEY { return; }
        {
            let mut signed_out = self.signed_out.lock();
            match (&*signed_out, event.new_value.as_deref()) {
                (Some(gone), Some(tok)) if gone == tok => {
                    debug!(target: "session", "ignoring storage event for a signed-out token");
                    return;
                }
                (_, None) => *signed_out = None,
                _ => {}
            }
        }
        let current = self.snapshot();
        if current.raw_token == event.new_value && !current.is_loading { return; }
        match event.new_value.as_deref() {
            None => {
                info!(target: "session", "token removed externally; signing out");
                self.publish(Session::empty());
            }
            Some(tok) => match decode_principal(self.decoder.as_ref(), tok) {
                Some(p) => {
                    info!(target: "session", "token replaced externally; role={}", p.role);
                    self.publish(Session::authenticated(tok, p));
                }
                None => {
                    warn!(target: "session", "externally stored token does not decode; signing out");
                    self.clear_persisted();
                    self.publish(Session::empty());
                }
            },
        }
    }

    /// Poll storage and turn differences from the published token into storage
    /// events. Runs until the returned handle is aborted.
    pub fn spawn_storage_watcher(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let stored = match store.storage.get(TOKEN_KEY) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!(target: "session", "storage poll failed: {}", e);
                        continue;
                    }
                };
                let current = store.snapshot();
                if current.is_loading || current.raw_token == stored { continue; }
                store.apply_storage_event(&StorageEvent::token_changed(stored));
            }
        })
    }
}
