//! Integration tests for the session manager.
//!
//! A scripted backend stands in for the real server: it mints tokens
//! `t1`, `t2`, ... on login and refresh, and can be told to revoke
//! tokens, go offline, refuse refreshes or hold a call mid-flight.
//! Periodic tests run with `start_paused` so the interval elapses
//! instantly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::Notify;
use warden_protocol::{ApiResponse, Credentials, LoginData, RefreshData, User, UserId};
use warden_session::{
    AuthBackend, AuthError, Escalation, FileTokenStore, ManualClock, MemoryTokenStore,
    SessionConfig, SessionEnd, SessionManager, SessionState, TokenStatus, VerifyOutcome,
};

// =========================================================================
// Scripted backend
// =========================================================================

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "correct horse";

fn alice() -> User {
    User {
        id: UserId::from("u-1"),
        name: "Alice".into(),
        email: EMAIL.into(),
        role: "admin".into(),
        permissions: ["READ_USERS", "READ_DASHBOARD"]
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

/// Lets a test pause a backend call after it started.
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    async fn pass(gate: Option<Arc<Gate>>) {
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[derive(Default)]
struct Script {
    issued: u64,
    /// Tokens the backend currently accepts, and whose they are.
    sessions: HashMap<String, User>,
    offline: bool,
    refuse_refresh: Option<String>,
    login_without_data: bool,
    verify_gate: Option<Arc<Gate>>,
    refresh_gate: Option<Arc<Gate>>,
    login_gate: Option<Arc<Gate>>,
    verified: Vec<String>,
    logouts: Vec<String>,
}

impl Script {
    fn mint(&mut self, user: User) -> String {
        self.issued += 1;
        let token = format!("t{}", self.issued);
        self.sessions.insert(token.clone(), user);
        token
    }
}

#[derive(Clone, Default)]
struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A valid token issued outside of `login`, as if by a previous run.
    fn issue_token(&self, user: User) -> String {
        self.script().mint(user)
    }

    fn revoke_all(&self) {
        self.script().sessions.clear();
    }

    fn set_user(&self, token: &str, user: User) {
        self.script().sessions.insert(token.to_owned(), user);
    }

    fn set_offline(&self, offline: bool) {
        self.script().offline = offline;
    }

    fn refuse_refresh(&self, reason: &str) {
        self.script().refuse_refresh = Some(reason.to_owned());
    }

    fn answer_login_without_data(&self) {
        self.script().login_without_data = true;
    }

    /// The next `verify` call signals `entered` and waits for `release`.
    fn hold_next_verify(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.script().verify_gate = Some(Arc::clone(&gate));
        gate
    }

    fn hold_next_refresh(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.script().refresh_gate = Some(Arc::clone(&gate));
        gate
    }

    fn hold_next_login(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.script().login_gate = Some(Arc::clone(&gate));
        gate
    }

    fn verified(&self) -> Vec<String> {
        self.script().verified.clone()
    }

    fn logouts(&self) -> Vec<String> {
        self.script().logouts.clone()
    }
}

fn unreachable() -> AuthError {
    AuthError::NetworkFailure("backend unreachable".into())
}

impl AuthBackend for ScriptedBackend {
    async fn verify(&self, token: &str) -> Result<ApiResponse<User>, AuthError> {
        let gate = {
            let mut script = self.script();
            script.verified.push(token.to_owned());
            script.verify_gate.take()
        };
        Gate::pass(gate).await;

        let script = self.script();
        if script.offline {
            return Err(unreachable());
        }
        Ok(match script.sessions.get(token) {
            Some(user) => ApiResponse::ok(user.clone()),
            None => ApiResponse::failure("token expired"),
        })
    }

    async fn refresh(&self, token: &str) -> Result<ApiResponse<RefreshData>, AuthError> {
        let gate = self.script().refresh_gate.take();
        Gate::pass(gate).await;

        let mut script = self.script();
        if script.offline {
            return Err(unreachable());
        }
        if let Some(reason) = script.refuse_refresh.clone() {
            return Ok(ApiResponse::failure(reason));
        }
        let Some(user) = script.sessions.remove(token) else {
            return Ok(ApiResponse::failure("unknown token"));
        };
        let fresh = script.mint(user);
        Ok(ApiResponse::ok(RefreshData { token: fresh }))
    }

    async fn login(&self, credentials: &Credentials) -> Result<ApiResponse<LoginData>, AuthError> {
        let gate = self.script().login_gate.take();
        Gate::pass(gate).await;

        let mut script = self.script();
        if script.offline {
            return Err(unreachable());
        }
        if credentials.email != EMAIL || credentials.password != PASSWORD {
            return Ok(ApiResponse::failure("wrong email or password"));
        }
        if script.login_without_data {
            return Ok(ApiResponse::ok_empty());
        }
        let token = script.mint(alice());
        Ok(ApiResponse::ok(LoginData {
            user: alice(),
            token,
        }))
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let mut script = self.script();
        script.logouts.push(token.to_owned());
        script.sessions.remove(token);
        Ok(())
    }
}

// =========================================================================
// Helpers
// =========================================================================

type Manager = SessionManager<ScriptedBackend, MemoryTokenStore>;

fn start_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

/// Periodic verification off, so only explicit calls hit the backend.
fn manual() -> SessionConfig {
    SessionConfig {
        verify_interval_ms: 0,
        ..SessionConfig::default()
    }
}

fn every_minute() -> SessionConfig {
    SessionConfig {
        verify_interval_ms: 60_000,
        ..SessionConfig::default()
    }
}

fn creds() -> Credentials {
    Credentials::new(EMAIL, PASSWORD)
}

struct Harness {
    backend: ScriptedBackend,
    store: MemoryTokenStore,
    clock: Arc<ManualClock>,
    manager: Manager,
}

fn harness_with(store: MemoryTokenStore, config: SessionConfig) -> Harness {
    let backend = ScriptedBackend::default();
    let clock = Arc::new(ManualClock::new(start_time()));
    let manager = SessionManager::with_clock(
        backend.clone(),
        store.clone(),
        config,
        clock.clone(),
    );
    Harness {
        backend,
        store,
        clock,
        manager,
    }
}

fn harness(config: SessionConfig) -> Harness {
    harness_with(MemoryTokenStore::new(), config)
}

async fn logged_in(config: SessionConfig) -> Harness {
    let h = harness(config);
    h.manager.login(&creds()).await.unwrap();
    h
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_success_stores_token_and_user() {
    let h = harness(manual());

    let snapshot = h.manager.login(&creds()).await.unwrap();

    assert_eq!(snapshot.state, SessionState::Authenticated(TokenStatus::Unknown));
    assert_eq!(snapshot.user, Some(alice()));
    assert_eq!(snapshot.ended, None);
    assert_eq!(h.store.current().as_deref(), Some("t1"));
    assert!(h.manager.has_permission("READ_DASHBOARD"));
    assert!(!h.manager.has_permission("WRITE_USERS"));
}

#[tokio::test]
async fn test_login_starts_periodic_verification_when_configured() {
    let h = logged_in(every_minute()).await;
    assert!(h.manager.is_periodic_verification_active());

    let h = logged_in(manual()).await;
    assert!(!h.manager.is_periodic_verification_active());
}

#[tokio::test]
async fn test_login_wrong_password_leaves_state_untouched() {
    let h = harness(every_minute());

    let err = h
        .manager
        .login(&Credentials::new(EMAIL, "nope"))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, AuthError::InvalidCredentials(msg) if msg == "wrong email or password"),
        "got {err:?}"
    );
    assert_eq!(h.manager.state(), SessionState::NoSession);
    assert_eq!(h.store.current(), None);
    assert!(!h.manager.is_periodic_verification_active());
}

#[tokio::test]
async fn test_login_unreachable_backend_is_network_failure() {
    let h = harness(manual());
    h.backend.set_offline(true);

    let err = h.manager.login(&creds()).await.unwrap_err();

    assert!(matches!(err, AuthError::NetworkFailure(_)));
    assert_eq!(h.manager.state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_login_success_without_data_is_protocol_error() {
    let h = harness(manual());
    h.backend.answer_login_without_data();

    let err = h.manager.login(&creds()).await.unwrap_err();

    assert!(matches!(err, AuthError::Protocol(_)));
    assert_eq!(h.manager.state(), SessionState::NoSession);
    assert_eq!(h.store.current(), None);
}

#[tokio::test]
async fn test_failed_login_keeps_existing_session() {
    let h = logged_in(manual()).await;

    let err = h.manager.login(&Credentials::new(EMAIL, "nope")).await;

    assert!(err.is_err());
    assert!(h.manager.is_authenticated());
    assert_eq!(h.store.current().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_login_while_signed_in_replaces_token() {
    let h = logged_in(manual()).await;

    h.manager.login(&creds()).await.unwrap();

    assert_eq!(h.store.current().as_deref(), Some("t2"));
    h.manager.verify().await.unwrap();
    assert_eq!(h.backend.verified(), vec!["t2".to_string()]);
}

// =========================================================================
// Logout
// =========================================================================

#[tokio::test]
async fn test_logout_clears_everything() {
    let h = logged_in(every_minute()).await;

    h.manager.logout().await;

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::NoSession);
    assert_eq!(snapshot.user, None);
    assert_eq!(snapshot.ended, Some(SessionEnd::Logout));
    assert_eq!(h.store.current(), None);
    assert!(!h.manager.is_periodic_verification_active());
    assert_eq!(h.backend.logouts(), vec!["t1".to_string()]);
}

#[tokio::test]
async fn test_logout_twice_is_a_no_op() {
    let h = logged_in(manual()).await;

    h.manager.logout().await;
    let after_first = h.manager.snapshot();
    h.manager.logout().await;

    assert_eq!(h.manager.snapshot(), after_first);
    assert_eq!(h.backend.logouts().len(), 1);
}

#[tokio::test]
async fn test_logout_without_session_does_nothing() {
    let h = harness(manual());

    h.manager.logout().await;

    assert_eq!(h.manager.snapshot().ended, None);
    assert!(h.backend.logouts().is_empty());
}

// =========================================================================
// Manual verification
// =========================================================================

#[tokio::test]
async fn test_verify_valid_token_refreshes_user_and_timestamp() {
    let h = logged_in(manual()).await;
    let mut promoted = alice();
    promoted.permissions.insert("WRITE_USERS".into());
    h.backend.set_user("t1", promoted.clone());
    h.clock.advance(Duration::from_secs(42));

    let outcome = h.manager.verify().await.unwrap();

    assert_eq!(outcome, VerifyOutcome::Valid { user_refreshed: true });
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Authenticated(TokenStatus::Valid));
    assert_eq!(snapshot.user, Some(promoted));
    assert_eq!(
        snapshot.validity.last_checked_at,
        Some(start_time() + Duration::from_secs(42))
    );
    assert_eq!(snapshot.validity.error, None);
}

#[tokio::test]
async fn test_verify_rejected_token_reports_but_keeps_session() {
    let h = logged_in(manual()).await;
    h.backend.revoke_all();

    let err = h.manager.verify().await.unwrap_err();

    assert!(matches!(&err, AuthError::TokenInvalid(msg) if msg == "token expired"));
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Authenticated(TokenStatus::Invalid));
    assert_eq!(snapshot.user, Some(alice()));
    assert_eq!(snapshot.validity.last_checked_at, Some(start_time()));
    assert!(snapshot.validity.error.is_some_and(|e| e.contains("token expired")));
    assert_eq!(h.store.current().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_verify_network_failure_marks_token_invalid() {
    let h = logged_in(manual()).await;
    h.backend.set_offline(true);

    let err = h.manager.verify().await.unwrap_err();

    assert!(matches!(err, AuthError::NetworkFailure(_)));
    assert_eq!(h.manager.validity().status, TokenStatus::Invalid);
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn test_verify_recovers_after_transient_failure() {
    let h = logged_in(manual()).await;
    h.backend.set_offline(true);
    let _ = h.manager.verify().await;

    h.backend.set_offline(false);
    h.manager.verify().await.unwrap();

    assert_eq!(h.manager.validity().status, TokenStatus::Valid);
    assert_eq!(h.manager.validity().error, None);
}

#[tokio::test]
async fn test_verify_without_session_is_no_session() {
    let h = harness(manual());

    assert_eq!(h.manager.verify().await.unwrap(), VerifyOutcome::NoSession);
    assert!(h.backend.verified().is_empty());
}

#[tokio::test]
async fn test_verify_with_logout_policy_ends_session() {
    let h = logged_in(manual()).await;
    h.backend.revoke_all();

    let err = h.manager.verify_with(Escalation::Logout).await;

    assert!(err.is_err());
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::NoSession);
    assert!(matches!(snapshot.ended, Some(SessionEnd::Escalation(_))));
    assert_eq!(h.store.current(), None);
}

// =========================================================================
// Refresh
// =========================================================================

#[tokio::test]
async fn test_refresh_stores_new_token_and_verifies_it() {
    let h = logged_in(manual()).await;

    assert!(h.manager.refresh_token().await.unwrap());

    assert_eq!(h.store.current().as_deref(), Some("t2"));
    assert_eq!(h.backend.verified(), vec!["t2".to_string()]);
    assert_eq!(h.manager.validity().status, TokenStatus::Valid);

    h.manager.verify().await.unwrap();
    assert_eq!(h.backend.verified().last().map(String::as_str), Some("t2"));
}

#[tokio::test]
async fn test_refresh_refused_ends_session_like_logout() {
    let h = logged_in(every_minute()).await;
    h.backend.refuse_refresh("refresh window closed");

    assert!(!h.manager.refresh_token().await.unwrap());

    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::NoSession);
    assert_eq!(snapshot.user, None);
    assert!(
        matches!(&snapshot.ended, Some(SessionEnd::RefreshFailed(msg)) if msg.contains("refresh window closed"))
    );
    assert_eq!(h.store.current(), None);
    assert!(!h.manager.is_periodic_verification_active());
}

#[tokio::test]
async fn test_refresh_unreachable_backend_ends_session() {
    let h = logged_in(manual()).await;
    h.backend.set_offline(true);

    assert!(!h.manager.refresh_token().await.unwrap());
    assert_eq!(h.manager.state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_refresh_without_session_returns_false() {
    let h = harness(manual());
    assert!(!h.manager.refresh_token().await.unwrap());
}

// =========================================================================
// Restore
// =========================================================================

#[tokio::test]
async fn test_restore_empty_store_stays_signed_out() {
    let h = harness(manual());

    assert_eq!(h.manager.restore().await.unwrap(), VerifyOutcome::NoSession);
    assert_eq!(h.manager.state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_restore_valid_token_loads_user() {
    let h = harness_with(MemoryTokenStore::with_token("t1"), every_minute());
    let token = h.backend.issue_token(alice());
    assert_eq!(token, "t1");

    let outcome = h.manager.restore().await.unwrap();

    assert_eq!(outcome, VerifyOutcome::Valid { user_refreshed: true });
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Authenticated(TokenStatus::Valid));
    assert_eq!(snapshot.user, Some(alice()));
    assert!(h.manager.is_periodic_verification_active());
}

#[tokio::test]
async fn test_restore_rejected_token_logs_out_by_default() {
    let h = harness_with(MemoryTokenStore::with_token("stale"), every_minute());

    let err = h.manager.restore().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenInvalid(_)));
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::NoSession);
    assert!(matches!(snapshot.ended, Some(SessionEnd::Escalation(_))));
    assert_eq!(h.store.current(), None);
    assert!(!h.manager.is_periodic_verification_active());
}

#[tokio::test]
async fn test_restore_rejected_token_never_publishes_invalid_session() {
    let h = harness_with(MemoryTokenStore::with_token("stale"), manual());
    let mut changes = h.manager.subscribe();
    let seen = tokio::spawn(async move {
        let mut seen = Vec::new();
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().state;
            let done = state == SessionState::NoSession;
            seen.push(state);
            if done {
                break;
            }
        }
        seen
    });

    assert!(h.manager.restore().await.is_err());

    let seen = seen.await.unwrap();
    assert!(
        !seen
            .iter()
            .any(|s| *s == SessionState::Authenticated(TokenStatus::Invalid)),
        "saw {seen:?}"
    );
    assert_eq!(seen.last(), Some(&SessionState::NoSession));
}

#[tokio::test]
async fn test_restore_with_report_policy_keeps_invalid_session() {
    let config = SessionConfig {
        startup_policy: Escalation::Report,
        ..manual()
    };
    let h = harness_with(MemoryTokenStore::with_token("stale"), config);

    assert!(h.manager.restore().await.is_err());

    assert_eq!(
        h.manager.state(),
        SessionState::Authenticated(TokenStatus::Invalid)
    );
    assert_eq!(h.store.current().as_deref(), Some("stale"));
}

#[tokio::test]
async fn test_restore_after_login_is_superseded() {
    let h = logged_in(manual()).await;

    assert_eq!(h.manager.restore().await.unwrap(), VerifyOutcome::Superseded);
    assert_eq!(h.store.current().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_file_store_session_survives_restart() {
    let path = std::env::temp_dir()
        .join(format!("warden-lifecycle-{:016x}", rand::random::<u64>()))
        .join("token");
    let backend = ScriptedBackend::default();

    let first = SessionManager::new(backend.clone(), FileTokenStore::new(&path), manual());
    first.login(&creds()).await.unwrap();
    drop(first);

    let second = SessionManager::new(backend.clone(), FileTokenStore::new(&path), manual());
    let outcome = second.restore().await.unwrap();

    assert_eq!(outcome, VerifyOutcome::Valid { user_refreshed: true });
    assert_eq!(second.user(), Some(alice()));

    second.logout().await;
    assert!(!path.exists());
}

// =========================================================================
// Periodic verification
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_verification_checks_every_interval() {
    let h = logged_in(every_minute()).await;

    tokio::time::sleep(Duration::from_secs(185)).await;

    assert_eq!(h.backend.verified().len(), 3);
    assert_eq!(
        h.manager.state(),
        SessionState::Authenticated(TokenStatus::Valid)
    );
}

#[tokio::test(start_paused = true)]
async fn test_periodic_verification_logs_out_on_rejection() {
    let h = logged_in(every_minute()).await;
    let mut changes = h.manager.subscribe();
    h.backend.revoke_all();

    let snapshot = tokio::time::timeout(
        Duration::from_secs(120),
        changes.wait_for(|s| s.state == SessionState::NoSession),
    )
    .await
    .expect("periodic check should end the session")
    .expect("manager still alive")
    .clone();

    assert!(matches!(snapshot.ended, Some(SessionEnd::Escalation(_))));
    assert_eq!(h.store.current(), None);
    assert!(!h.manager.is_periodic_verification_active());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_periodic_verification_never_fires() {
    let h = logged_in(every_minute()).await;

    assert!(h.manager.stop_periodic_verification());
    h.backend.revoke_all();
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert!(h.backend.verified().is_empty());
    assert!(h.manager.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_no_periodic_check_after_logout() {
    let h = logged_in(every_minute()).await;

    h.manager.logout().await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert!(h.backend.verified().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_previous_periodic_task() {
    let h = logged_in(manual()).await;

    assert!(h.manager.start_periodic_verification(Duration::from_secs(60)));
    assert!(h.manager.start_periodic_verification(Duration::from_secs(60)));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(h.backend.verified().len(), 1);
}

#[tokio::test]
async fn test_start_periodic_verification_requires_session() {
    let h = harness(manual());

    assert!(!h.manager.start_periodic_verification(Duration::from_secs(60)));
    assert!(!h.manager.is_periodic_verification_active());
    assert!(!h.manager.stop_periodic_verification());
}

// =========================================================================
// Races
// =========================================================================

#[tokio::test]
async fn test_verify_answer_after_logout_is_superseded() {
    let h = logged_in(manual()).await;
    let gate = h.backend.hold_next_verify();

    let in_flight = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.verify().await }
    });
    gate.entered.notified().await;
    h.manager.logout().await;
    gate.release.notify_one();

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome, VerifyOutcome::Superseded);
    assert_eq!(h.manager.state(), SessionState::NoSession);
    assert_eq!(h.manager.snapshot().ended, Some(SessionEnd::Logout));
}

#[tokio::test]
async fn test_stale_escalation_does_not_end_new_session() {
    let h = logged_in(manual()).await;
    let gate = h.backend.hold_next_verify();

    let in_flight = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.verify_with(Escalation::Logout).await }
    });
    gate.entered.notified().await;
    h.manager.logout().await;
    h.manager.login(&creds()).await.unwrap();
    gate.release.notify_one();

    // The held call now sees t1 as revoked, but t1 is no longer current.
    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome, VerifyOutcome::Superseded);
    assert_eq!(
        h.manager.state(),
        SessionState::Authenticated(TokenStatus::Unknown)
    );
    assert_eq!(h.store.current().as_deref(), Some("t2"));
}

#[tokio::test]
async fn test_logout_during_login_discards_login() {
    let h = harness(every_minute());
    let gate = h.backend.hold_next_login();

    let in_flight = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.login(&creds()).await }
    });
    gate.entered.notified().await;
    h.manager.logout().await;
    gate.release.notify_one();

    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, AuthError::Superseded), "got {err:?}");
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::NoSession);
    assert_eq!(snapshot.ended, Some(SessionEnd::Logout));
    assert_eq!(h.store.current(), None);
    assert!(!h.manager.is_periodic_verification_active());
    // The token minted for the dropped login is handed back.
    assert_eq!(h.backend.logouts(), vec!["t1".to_string()]);
}

#[tokio::test]
async fn test_logout_during_relogin_keeps_user_signed_out() {
    let h = logged_in(manual()).await;
    let gate = h.backend.hold_next_login();

    let in_flight = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.login(&creds()).await }
    });
    gate.entered.notified().await;
    h.manager.logout().await;
    gate.release.notify_one();

    assert!(matches!(
        in_flight.await.unwrap(),
        Err(AuthError::Superseded)
    ));
    assert_eq!(h.manager.state(), SessionState::NoSession);
    assert_eq!(h.store.current(), None);
}

#[tokio::test]
async fn test_overlapping_refreshes_keep_session() {
    let h = logged_in(manual()).await;
    let gate = h.backend.hold_next_refresh();

    let held = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.refresh_token().await }
    });
    gate.entered.notified().await;
    assert!(h.manager.refresh_token().await.unwrap());
    gate.release.notify_one();

    // The held call now finds t1 already rotated away, but t2 is current.
    assert!(held.await.unwrap().unwrap());
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Authenticated(TokenStatus::Valid));
    assert_eq!(snapshot.ended, None);
    assert_eq!(h.store.current().as_deref(), Some("t2"));
    assert!(h.backend.logouts().is_empty());
}

#[tokio::test]
async fn test_refresh_answer_after_logout_returns_false() {
    let h = logged_in(manual()).await;
    let gate = h.backend.hold_next_refresh();

    let held = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.refresh_token().await }
    });
    gate.entered.notified().await;
    h.manager.logout().await;
    gate.release.notify_one();

    assert!(!held.await.unwrap().unwrap());
    assert_eq!(h.manager.state(), SessionState::NoSession);
    assert_eq!(h.manager.snapshot().ended, Some(SessionEnd::Logout));
    assert_eq!(h.store.current(), None);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_check_on_old_token_yields_to_refresh() {
    let h = logged_in(every_minute()).await;
    let gate = h.backend.hold_next_verify();

    // The first periodic tick picks up t1 and blocks in the backend.
    gate.entered.notified().await;
    assert!(h.manager.refresh_token().await.unwrap());
    gate.release.notify_one();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // t1 is revoked by now, yet the stale answer must not end the session.
    assert_eq!(h.backend.verified(), vec!["t1".to_string(), "t2".to_string()]);
    let snapshot = h.manager.snapshot();
    assert_eq!(snapshot.state, SessionState::Authenticated(TokenStatus::Valid));
    assert_eq!(snapshot.ended, None);
    assert_eq!(h.store.current().as_deref(), Some("t2"));
    assert!(h.manager.is_periodic_verification_active());
}

#[tokio::test]
async fn test_subscribers_see_final_state() {
    let h = harness(manual());
    let mut changes = h.manager.subscribe();

    h.manager.login(&creds()).await.unwrap();

    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_authenticated());

    h.manager.logout().await;
    assert_eq!(changes.borrow_and_update().state, SessionState::NoSession);
}
