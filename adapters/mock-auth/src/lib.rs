//! mock-auth: auth session simulator for the KonBase mock backend.
//!
//! Purpose
//! - Stand in for the hosted auth service while the app runs in demo mode.
//! - Keeps a credential table seeded with the demo accounts, the current
//!   session and an observer list of auth-state listeners.
//!
//! API
//! - `AuthSimulator::new(store, delays)` then `sign_in_with_password`,
//!   `sign_up`, `sign_out`, `get_session`, `get_user`, `update_user`,
//!   `set_session`, `reset_password_for_email`, `verify_otp` and
//!   `on_auth_state_change`.
//!
//! Notes
//! - Every operation sleeps a configurable latency (see [`AuthDelays`]).
//! - Profiles and audit entries are written through the shared
//!   [`RecordStore`]; those writes are not atomic with the session change.
//! - Listeners are invoked after all internal locks are released, so a
//!   listener may call back into the simulator.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use domain::ids::UuidIds;
use domain::time::{format_timestamp, SystemClock};
use domain::{Clock, IdGenerator, Record, RecordStore, StoreError, Table};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, trace, warn};

/// Password shared by the seeded demo accounts.
pub const DEMO_PASSWORD: &str = "password123";
pub const ADMIN_EMAIL: &str = "admin@konbase.cfd";

const DEMO_ACCOUNTS: [(&str, &str, &str); 3] = [
    ("user-admin", ADMIN_EMAIL, "system_admin"),
    ("user-manager", "manager@konbase.cfd", "manager"),
    ("user-member", "member@konbase.cfd", "member"),
];

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("User already registered")]
    AlreadyRegistered,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("internal error")]
    Internal,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// HTTP-like status code reported alongside the message.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::NotAuthenticated => 401,
            AuthError::Internal | AuthError::Store(StoreError::Repository(_)) => 500,
            AuthError::Store(StoreError::AlreadyExists) => 409,
            _ => 400,
        }
    }
}

/// Artificial latency per auth operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthDelays {
    /// Sign-in, sign-up, user update, password reset and OTP checks.
    pub slow: Duration,
    /// Sign-out and set-session.
    pub medium: Duration,
    /// Session and user reads.
    pub fast: Duration,
}

impl Default for AuthDelays {
    fn default() -> Self {
        Self {
            slow: Duration::from_millis(100),
            medium: Duration::from_millis(50),
            fast: Duration::from_millis(10),
        }
    }
}

impl AuthDelays {
    pub fn instant() -> Self {
        Self {
            slow: Duration::ZERO,
            medium: Duration::ZERO,
            fast: Duration::ZERO,
        }
    }
}

/// Sleep for `d`; a zero duration returns without touching the timer.
pub async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub app_metadata: Value,
    pub user_metadata: Map<String, Value>,
    pub aud: String,
    pub created_at: String,
    pub email_confirmed_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    UserUpdated,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::UserUpdated => "USER_UPDATED",
        })
    }
}

/// Kind of one-time password passed to [`AuthSimulator::verify_otp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpKind {
    Recovery,
    Signup,
    MagicLink,
    Email,
}

impl FromStr for OtpKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recovery" => Ok(OtpKind::Recovery),
            "signup" => Ok(OtpKind::Signup),
            "magiclink" => Ok(OtpKind::MagicLink),
            "email" => Ok(OtpKind::Email),
            _ => Err(AuthError::InvalidOtp),
        }
    }
}

/// Changes accepted by [`AuthSimulator::update_user`].
#[derive(Clone, Debug, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
    /// Profile columns to patch; also merged into the user metadata.
    pub data: Option<Record>,
}

#[derive(Clone, Debug)]
struct Credential {
    id: String,
    email: String,
    password: String,
    role: String,
}

type Listener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;
type Listeners = Mutex<Vec<(u64, Listener)>>;

/// Handle returned by [`AuthSimulator::on_auth_state_change`].
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Remove this listener only. Calling it twice is harmless.
    pub fn unsubscribe(&self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        if let Ok(mut list) = listeners.lock() {
            list.retain(|(id, _)| *id != self.id);
        }
        trace!(listener = self.id, "auth listener removed");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct AuthState {
    credentials: HashMap<String, Credential>,
    session: Option<Session>,
}

pub struct AuthSimulator {
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    delays: AuthDelays,
    state: Mutex<AuthState>,
    listeners: Arc<Listeners>,
    next_listener: AtomicU64,
}

impl AuthSimulator {
    /// Simulator with the demo credentials, `user-<uuid>` ids for new
    /// accounts and the wall clock.
    pub fn new(store: Arc<dyn RecordStore>, delays: AuthDelays) -> Self {
        Self::with_parts(
            store,
            delays,
            Arc::new(UuidIds::new("user-")),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        store: Arc<dyn RecordStore>,
        delays: AuthDelays,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let credentials = DEMO_ACCOUNTS
            .iter()
            .map(|(id, email, role)| {
                (
                    email.to_string(),
                    Credential {
                        id: id.to_string(),
                        email: email.to_string(),
                        password: DEMO_PASSWORD.to_string(),
                        role: role.to_string(),
                    },
                )
            })
            .collect();
        Self {
            store,
            ids,
            clock,
            delays,
            state: Mutex::new(AuthState {
                credentials,
                session: None,
            }),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, AuthState>, AuthError> {
        self.state.lock().map_err(|_| AuthError::Internal)
    }

    fn notify(&self, event: AuthEvent, session: Option<&Session>) {
        let listeners: Vec<Listener> = match self.listeners.lock() {
            Ok(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => {
                warn!("auth listener list poisoned; skipping notification");
                return;
            }
        };
        debug!(%event, listeners = listeners.len(), "auth state change");
        for listener in listeners {
            listener(event, session);
        }
    }

    fn audit(&self, action: &str, entity: &str, user_id: &str, changes: Option<Value>) {
        self.store.record_audit(action, entity, user_id, changes);
    }

    fn build_user(&self, id: &str, email: &str) -> User {
        let profile = self.store.get(Table::Profiles, id).ok().flatten();
        let now = format_timestamp(self.clock.now());
        let name = profile
            .as_ref()
            .and_then(|p| p.str("name"))
            .unwrap_or(email)
            .to_string();
        let mut user_metadata = Map::new();
        user_metadata.insert("name".into(), Value::from(name));
        User {
            id: id.to_string(),
            email: email.to_string(),
            app_metadata: json!({"provider": "email"}),
            user_metadata,
            aud: "authenticated".to_string(),
            created_at: profile
                .as_ref()
                .and_then(|p| p.str("created_at"))
                .map(str::to_string)
                .unwrap_or_else(|| now.clone()),
            email_confirmed_at: Some(
                profile
                    .as_ref()
                    .and_then(|p| p.str("email_confirmed_at"))
                    .map(str::to_string)
                    .unwrap_or(now),
            ),
        }
    }

    fn session_for(&self, id: &str, email: &str, access: String, refresh: String) -> Session {
        Session {
            user: self.build_user(id, email),
            access_token: access,
            refresh_token: refresh,
            expires_in: 3600,
            token_type: "bearer".to_string(),
        }
    }

    /// Replace the current session with a fresh admin session and announce it.
    fn sign_in_admin(&self, access: String, refresh: String) -> Result<Session, AuthError> {
        let admin = {
            let state = self.lock()?;
            state
                .credentials
                .get(ADMIN_EMAIL)
                .cloned()
                .ok_or(AuthError::InvalidCredentials)?
        };
        let session = self.session_for(&admin.id, &admin.email, access, refresh);
        self.lock()?.session = Some(session.clone());
        self.notify(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        pause(self.delays.slow).await;
        let email = email.trim().to_lowercase();
        let credential = {
            let state = self.lock()?;
            state
                .credentials
                .get(&email)
                .filter(|c| c.password == password)
                .cloned()
        };
        let Some(credential) = credential else {
            info!(email = %email, "sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let session = self.session_for(
            &credential.id,
            &credential.email,
            format!("mock-access-token-{}", credential.id),
            format!("mock-refresh-token-{}", credential.id),
        );
        self.lock()?.session = Some(session.clone());
        self.audit(
            "login",
            "auth",
            &credential.id,
            Some(json!({"method": "password"})),
        );
        info!(user_id = %credential.id, role = %credential.role, "signed in");
        self.notify(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    /// Register a member account, create its profile and sign it in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Session, AuthError> {
        pause(self.delays.slow).await;
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if self.lock()?.credentials.contains_key(&email) {
            info!(email = %email, "sign-up rejected: already registered");
            return Err(AuthError::AlreadyRegistered);
        }

        let id = self.ids.next_id();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let profile = Record::new()
            .with("id", id.as_str())
            .with("name", name)
            .with("email", email.as_str())
            .with("role", "member")
            .with("association_id", "assoc-1");
        self.store.insert(Table::Profiles, profile)?;

        {
            let mut state = self.lock()?;
            if state.credentials.contains_key(&email) {
                return Err(AuthError::AlreadyRegistered);
            }
            state.credentials.insert(
                email.clone(),
                Credential {
                    id: id.clone(),
                    email: email.clone(),
                    password: password.to_string(),
                    role: "member".to_string(),
                },
            );
        }
        self.audit("signup", "auth", &id, Some(json!({"email": email})));
        info!(user_id = %id, "signed up");

        self.sign_in_with_password(&email, password).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        pause(self.delays.medium).await;
        let previous = self.lock()?.session.take();
        if let Some(session) = &previous {
            self.audit("logout", "auth", &session.user.id, None);
            info!(user_id = %session.user.id, "signed out");
        }
        self.notify(AuthEvent::SignedOut, None);
        Ok(())
    }

    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        pause(self.delays.fast).await;
        Ok(self.lock()?.session.clone())
    }

    pub async fn get_user(&self) -> Result<Option<User>, AuthError> {
        pause(self.delays.fast).await;
        let mut user = match self.lock()?.session.as_ref() {
            Some(s) => s.user.clone(),
            None => return Ok(None),
        };
        if user.email_confirmed_at.is_none() {
            user.email_confirmed_at = Some(
                self.store
                    .get(Table::Profiles, &user.id)?
                    .and_then(|p| p.str("email_confirmed_at").map(str::to_string))
                    .unwrap_or_else(|| format_timestamp(self.clock.now())),
            );
        }
        Ok(Some(user))
    }

    /// Id of the signed-in user, without any artificial latency.
    pub fn current_user_id(&self) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|s| s.session.as_ref().map(|s| s.user.id.clone()))
    }

    pub async fn update_user(&self, update: UserUpdate) -> Result<User, AuthError> {
        pause(self.delays.slow).await;
        let (user_id, email) = match self.lock()?.session.as_ref() {
            Some(s) => (s.user.id.clone(), s.user.email.clone()),
            None => return Err(AuthError::NotAuthenticated),
        };

        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            let changed = {
                let mut state = self.lock()?;
                match state.credentials.get_mut(&email) {
                    Some(c) => {
                        c.password = password;
                        true
                    }
                    None => false,
                }
            };
            if changed {
                info!(user_id = %user_id, "password updated");
                self.audit(
                    "update_user",
                    "auth",
                    &user_id,
                    Some(json!({"password_changed": true})),
                );
            }
        }

        if let Some(data) = update.data {
            self.store.update(Table::Profiles, &user_id, data.clone())?;
            {
                let mut state = self.lock()?;
                if let Some(session) = state.session.as_mut() {
                    for (k, v) in data.iter() {
                        session.user.user_metadata.insert(k.to_string(), v.clone());
                    }
                }
            }
            self.audit("update_user", "profile", &user_id, Some(data.into_value()));
        }

        let session = self.lock()?.session.clone();
        let Some(session) = session else {
            return Err(AuthError::NotAuthenticated);
        };
        self.notify(AuthEvent::UserUpdated, Some(&session));
        Ok(session.user)
    }

    /// Adopt tokens from a redirect. Without a current session this signs in
    /// the admin demo account with the given tokens.
    pub async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        pause(self.delays.medium).await;
        debug!("set_session called");
        if let Some(existing) = self.lock()?.session.clone() {
            return Ok(existing);
        }
        self.sign_in_admin(access_token.to_string(), refresh_token.to_string())
    }

    /// Register a listener. It is invoked at once with `InitialSession` (or
    /// `SignedOut` when nobody is signed in) and then on every change.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Result<Subscription, AuthError>
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(callback);
        self.listeners
            .lock()
            .map_err(|_| AuthError::Internal)?
            .push((id, Arc::clone(&listener)));
        trace!(listener = id, "auth listener added");

        let current = self.lock()?.session.clone();
        match &current {
            Some(s) => listener(AuthEvent::InitialSession, Some(s)),
            None => listener(AuthEvent::SignedOut, None),
        }
        Ok(Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        })
    }

    /// Always succeeds; logs the simulated reset link.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        pause(self.delays.slow).await;
        let token = format!("mock-reset-{}", uuid::Uuid::new_v4());
        let redirect = redirect_to.unwrap_or_default();
        info!(email, "password reset email simulated");
        info!(
            link = %format!("{}?token={}#type=recovery", redirect, token),
            "simulated reset link"
        );
        Ok(())
    }

    /// Recovery tokens sign in the admin demo account; anything else fails.
    pub async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        kind: OtpKind,
    ) -> Result<Session, AuthError> {
        pause(self.delays.slow).await;
        debug!(email, ?kind, "verify_otp called");
        if token.is_empty() || kind != OtpKind::Recovery {
            return Err(AuthError::InvalidOtp);
        }
        let id = DEMO_ACCOUNTS[0].0;
        self.sign_in_admin(
            format!("mock-access-token-{}", id),
            format!("mock-refresh-token-{}", id),
        )
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.lock().map(|s| s.credentials.len()).unwrap_or(0)
    }

    /// Role recorded for an account at sign-up time.
    pub fn account_role(&self, email: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|s| s.credentials.get(&email.to_lowercase()).map(|c| c.role.clone()))
    }
}
