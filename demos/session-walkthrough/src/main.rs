//! Walks a session through its whole life against an in-process backend:
//! guarded routes, refresh, server-side revocation caught by the periodic
//! check, and the forced logout of a user with no permissions.
//!
//! Run with `RUST_LOG=debug` to see the session layer's own logging.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use warden::prelude::*;
use warden::protocol::{Codec, JsonCodec};

const CONFIG: &str = r#"{
    "session": { "verify_interval_ms": 2000, "verify_jitter_ms": 250 },
    "guard": { "root_route": "/" }
}"#;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

struct Account {
    password: &'static str,
    user: User,
}

#[derive(Default)]
struct Server {
    accounts: HashMap<&'static str, Account>,
    sessions: HashMap<String, User>,
    issued: u64,
}

/// An auth server living in the same process.
///
/// Every answer is encoded to JSON and decoded again, so the demo goes
/// through the same envelope checks as an HTTP adapter would.
#[derive(Clone, Default)]
struct DemoBackend {
    server: Arc<Mutex<Server>>,
}

fn user(id: &str, name: &str, email: &str, role: &str, permissions: &[&str]) -> User {
    User {
        id: UserId::from(id),
        name: name.into(),
        email: email.into(),
        role: role.into(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

impl DemoBackend {
    fn new() -> Self {
        let backend = Self::default();
        {
            let mut server = backend.server();
            server.accounts.insert(
                "viewer@example.com",
                Account {
                    password: "viewer",
                    user: user("u-1", "Vera", "viewer@example.com", "viewer", &["READ_USERS"]),
                },
            );
            server.accounts.insert(
                "guest@example.com",
                Account {
                    password: "guest",
                    user: user("u-2", "Gus", "guest@example.com", "guest", &[]),
                },
            );
        }
        backend
    }

    fn server(&self) -> MutexGuard<'_, Server> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidates every token, as an administrator would.
    fn revoke_all(&self) {
        self.server().sessions.clear();
    }

    async fn respond<T>(&self, response: ApiResponse<T>) -> Result<ApiResponse<T>, AuthError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let body = JsonCodec.encode(&response)?;
        Ok(ApiResponse::decode(&JsonCodec, &body)?)
    }
}

impl Server {
    fn mint(&mut self, user: User) -> String {
        self.issued += 1;
        let token = format!("tok-{}", self.issued);
        self.sessions.insert(token.clone(), user);
        token
    }
}

impl AuthBackend for DemoBackend {
    async fn verify(&self, token: &str) -> Result<ApiResponse<User>, AuthError> {
        let response = match self.server().sessions.get(token) {
            Some(user) => ApiResponse::ok(user.clone()),
            None => ApiResponse::failure("token revoked"),
        };
        self.respond(response).await
    }

    async fn refresh(&self, token: &str) -> Result<ApiResponse<RefreshData>, AuthError> {
        let response = {
            let mut server = self.server();
            match server.sessions.remove(token) {
                Some(user) => ApiResponse::ok(RefreshData {
                    token: server.mint(user),
                }),
                None => ApiResponse::failure("token revoked"),
            }
        };
        self.respond(response).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<ApiResponse<LoginData>, AuthError> {
        let response = {
            let mut server = self.server();
            let user = server
                .accounts
                .get(credentials.email.as_str())
                .filter(|account| account.password == credentials.password)
                .map(|account| account.user.clone());
            match user {
                Some(user) => {
                    let token = server.mint(user.clone());
                    ApiResponse::ok(LoginData { user, token })
                }
                None => ApiResponse::failure("wrong email or password"),
            }
        };
        self.respond(response).await
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.server().sessions.remove(token);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), WardenError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = DemoBackend::new();
    let navigator = RecordingNavigator::new();
    let warden = Warden::builder()
        .config(WardenConfig::from_json_str(CONFIG)?)
        .build(backend.clone(), MemoryTokenStore::new(), navigator.clone())
        .await?;

    let users_page = ProtectedRoute::requiring("READ_USERS");
    let dashboard = ProtectedRoute::requiring("READ_DASHBOARD");

    info!("-- 1. signed out");
    let decision = warden.activate(&users_page).await;
    info!(%decision, "users page");

    info!("-- 2. wrong password, then a viewer signs in");
    if let Err(e) = warden
        .login(&Credentials::new("viewer@example.com", "guess"))
        .await
    {
        info!(error = %e, "login refused");
    }
    let snapshot = warden
        .login(&Credentials::new("viewer@example.com", "viewer"))
        .await?;
    info!(state = %snapshot.state, "signed in");

    info!("-- 3. guarded routes");
    info!(decision = %warden.activate(&users_page).await, "users page");
    info!(decision = %warden.activate(&dashboard).await, "dashboard");

    info!("-- 4. refresh and verify");
    let refreshed = warden.refresh_token().await?;
    info!(refreshed, status = %warden.validity().status, "token refreshed");

    info!("-- 5. the server revokes the token");
    backend.revoke_all();
    if let Err(e) = warden.verify().await {
        info!(
            error = %e,
            authenticated = warden.is_authenticated(),
            "manual check only reports"
        );
    }
    let held = tokio::time::timeout(Duration::from_secs(5), warden.hold(&users_page)).await;
    match held {
        Ok(decision) => info!(%decision, ended = ?warden.snapshot().ended, "periodic check ended the session"),
        Err(_) => info!("periodic check did not fire in time"),
    }

    info!("-- 6. a guest with no permissions");
    warden
        .login(&Credentials::new("guest@example.com", "guest"))
        .await?;
    let decision = warden.activate(&dashboard).await;
    info!(
        %decision,
        authenticated = warden.is_authenticated(),
        "dashboard"
    );

    info!(history = ?navigator.history(), "navigation");
    Ok(())
}
