//! Integration tests for the Mindtable app: full request flows from the
//! first page view through login, join, preferences and logout.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use mindtable::DASHBOARD_PATH;
use mindtable::prelude::*;

// =========================================================================
// Test doubles
// =========================================================================

/// Accepts `user<N>` / `secret` as user N. Skips password hashing so the
/// flows stay fast.
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(&self, login: &str, password: &str) -> Result<Identity, SessionError> {
        let id: u64 = login
            .strip_prefix("user")
            .and_then(|n| n.parse().ok())
            .ok_or(SessionError::InvalidCredentials)?;
        if password != "secret" {
            return Err(SessionError::InvalidCredentials);
        }
        Ok(Identity {
            user_id: UserId(id),
            display_name: login.to_string(),
            role: Role::Player,
            email: None,
            avatar: None,
        })
    }
}

/// An audit log that always fails, counting attempts.
#[derive(Default)]
struct BrokenAudit {
    attempts: Arc<AtomicU32>,
}

impl AuditLog for BrokenAudit {
    async fn record(&self, _event: AuditEvent) -> Result<(), MindtableError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MindtableError::SideEffect("audit database down".into()))
    }
}

/// A presence tracker that always fails.
struct BrokenPresence;

impl Presence for BrokenPresence {
    async fn set_online(&self, _user_id: UserId, _online: bool) -> Result<(), MindtableError> {
        Err(MindtableError::SideEffect("presence service down".into()))
    }
}

type TestApp = Mindtable<TestAuth, MemoryRoomRepository>;

// =========================================================================
// Helpers
// =========================================================================

fn app() -> TestApp {
    MindtableBuilder::new().build(TestAuth, MemoryRoomRepository::new())
}

/// A client's cookie jar and the CSRF token from the last rendered page.
struct Client {
    session: Option<SessionId>,
    csrf: String,
}

impl Client {
    /// Loads a page to obtain an anonymous session and its CSRF token.
    async fn visit<R, S, L, P>(app: &Mindtable<TestAuth, R, S, L, P>) -> Self
    where
        R: RoomRepository,
        S: SessionStore,
        L: AuditLog,
        P: Presence,
    {
        let entry = app.enter(&Request::new(None)).await.unwrap();
        Self {
            session: Some(entry.session),
            csrf: entry.csrf_token,
        }
    }

    fn request(&self) -> Request {
        Request::new(self.session.clone())
    }

    fn absorb(&mut self, resp: &Response) {
        self.session = resp.session.clone();
    }
}

async fn logged_in(app: &TestApp, n: u64) -> Client {
    let mut client = Client::visit(app).await;
    let resp = app
        .login(
            &client
                .request()
                .field("username", format!("user{n}"))
                .field("password", "secret")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;
    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    client.absorb(&resp);
    client
}

fn join_form(client: &Client, room: RoomId) -> Request {
    client
        .request()
        .field("game_id", room.0.to_string())
        .field("csrf_token", client.csrf.clone())
}

// =========================================================================
// enter / login
// =========================================================================

#[tokio::test]
async fn test_enter_returns_stable_token_for_same_session() {
    let app = app();
    let first = app.enter(&Request::new(None)).await.unwrap();
    let again = app
        .enter(&Request::new(Some(first.session.clone())))
        .await
        .unwrap();

    assert_eq!(first.csrf_token, again.csrf_token);
    assert_eq!(first.csrf_token.len(), 64);
    assert!(again.identity.is_none());
}

#[tokio::test]
async fn test_login_success_rotates_session_and_redirects() {
    let app = app();
    let client = Client::visit(&app).await;
    let before = client.session.clone();

    let resp = app
        .login(
            &client
                .request()
                .field("username", "user7")
                .field("password", "secret")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(resp.status, 303);
    assert_eq!(resp.location.as_deref(), Some("/dashboard"));
    assert!(resp.session.is_some());
    assert_ne!(resp.session, before, "identifier must change at login");

    let entry = app.enter(&Request::new(resp.session)).await.unwrap();
    assert_eq!(entry.identity.unwrap().user_id, UserId(7));
    assert_eq!(entry.csrf_token, client.csrf, "token survives login");
}

#[tokio::test(start_paused = true)]
async fn test_login_bad_password_is_delayed_and_creates_no_session() {
    let app = app();
    let client = Client::visit(&app).await;

    let started = tokio::time::Instant::now();
    let resp = app
        .login(
            &client
                .request()
                .field("username", "user1")
                .field("password", "wrong")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(
        resp.location.as_deref(),
        Some("/login?error=invalid_credentials")
    );
    let entry = app.enter(&Request::new(resp.session)).await.unwrap();
    assert!(entry.identity.is_none(), "still anonymous");
}

#[tokio::test(start_paused = true)]
async fn test_login_unknown_user_looks_like_bad_password() {
    let app = app();
    let client = Client::visit(&app).await;

    let resp = app
        .login(
            &client
                .request()
                .field("username", "nobody")
                .field("password", "secret")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(
        resp.location.as_deref(),
        Some("/login?error=invalid_credentials")
    );
}

#[tokio::test(start_paused = true)]
async fn test_login_wrong_csrf_token_rejected() {
    let app = app();
    let client = Client::visit(&app).await;

    let resp = app
        .login(
            &client
                .request()
                .field("username", "user1")
                .field("password", "secret")
                .field("csrf_token", "0".repeat(64)),
        )
        .await;

    assert_eq!(resp.location.as_deref(), Some("/login?error=csrf"));
}

#[tokio::test(start_paused = true)]
async fn test_login_missing_password_is_invalid_request() {
    let app = app();
    let client = Client::visit(&app).await;

    let resp = app
        .login(
            &client
                .request()
                .field("username", "user1")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(resp.location.as_deref(), Some("/login?error=invalid_request"));
}

#[tokio::test]
async fn test_login_with_password_authenticator() {
    let identities = MemoryIdentityStore::new().with_user(UserRecord {
        id: UserId(42),
        login: "ada".into(),
        credential_hash: hash_password("correct horse").unwrap(),
        role: Role::Admin,
        email: Some("ada@example.org".into()),
        avatar: None,
    });
    let app = MindtableBuilder::new().build(
        PasswordAuthenticator::new(identities),
        MemoryRoomRepository::new(),
    );
    let entry = app.enter(&Request::new(None)).await.unwrap();

    let resp = app
        .login(
            &Request::new(Some(entry.session))
                .field("username", "ada")
                .field("password", "correct horse")
                .field("csrf_token", entry.csrf_token),
        )
        .await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    let entry = app.enter(&Request::new(resp.session)).await.unwrap();
    let identity = entry.identity.unwrap();
    assert_eq!(identity.user_id, UserId(42));
    assert_eq!(identity.role, Role::Admin);
}

// =========================================================================
// join
// =========================================================================

#[tokio::test]
async fn test_join_form_seats_user_and_redirects_to_room() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let client = logged_in(&app, 1).await;

    let resp = app.join(&join_form(&client, room)).await;

    assert_eq!(resp.location, Some(format!("/room?id={}", room.0)));
    let roster = app.admission().roster(room).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].seat, SeatPosition(1));
}

#[tokio::test]
async fn test_join_twice_keeps_same_seat() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let mut a = logged_in(&app, 1).await;
    let mut b = logged_in(&app, 2).await;
    let resp = app.join(&join_form(&a, room)).await;
    a.absorb(&resp);
    let resp = app.join(&join_form(&b, room)).await;
    b.absorb(&resp);

    let resp = app.join(&join_form(&b, room)).await;

    assert_eq!(resp.location, Some(format!("/room?id={}", room.0)));
    let roster = app.admission().roster(room).await.unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[1].user_id, UserId(2));
    assert_eq!(roster[1].seat, SeatPosition(2));
}

#[tokio::test]
async fn test_join_requires_login() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let client = Client::visit(&app).await;

    let resp = app.join(&join_form(&client, room)).await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    assert!(app.admission().roster(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_join_bad_csrf_destroys_session_without_seating() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let client = logged_in(&app, 1).await;

    let resp = app
        .join(
            &client
                .request()
                .field("game_id", room.0.to_string())
                .field("csrf_token", "forged"),
        )
        .await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    assert!(resp.session.is_none(), "client told to drop its cookie");
    assert!(app.admission().roster(room).await.unwrap().is_empty());
    assert!(
        app.sessions()
            .load(client.session.as_ref().unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_join_missing_csrf_token_rejected() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let client = logged_in(&app, 1).await;

    let resp = app
        .join(&client.request().field("game_id", room.0.to_string()))
        .await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    assert!(app.admission().roster(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reenter_by_query_returns_to_held_seat() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let mut client = logged_in(&app, 1).await;
    let resp = app.join(&join_form(&client, room)).await;
    client.absorb(&resp);

    let resp = app
        .join(&client.request().query("id", room.0.to_string()))
        .await;

    assert_eq!(resp.location, Some(format!("/room?id={}", room.0)));
}

#[tokio::test]
async fn test_reenter_by_query_never_takes_a_seat() {
    let app = app();
    let room = app.admission().repository().create_room(4).await;
    let client = logged_in(&app, 1).await;

    let resp = app
        .join(&client.request().query("id", room.0.to_string()))
        .await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    assert!(app.admission().roster(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_join_unknown_room_goes_to_dashboard() {
    let app = app();
    let client = logged_in(&app, 1).await;

    let resp = app.join(&join_form(&client, RoomId(u64::MAX))).await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    assert!(resp.session.is_some(), "a refused join keeps the session");
}

#[tokio::test]
async fn test_join_non_numeric_room_goes_to_dashboard() {
    let app = app();
    let client = logged_in(&app, 1).await;

    let resp = app
        .join(
            &client
                .request()
                .field("game_id", "abc")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_through_app_respect_capacity() {
    let app = app();
    let room = app.admission().repository().create_room(3).await;
    let mut clients = Vec::new();
    for n in 1..=5 {
        clients.push(logged_in(&app, n).await);
    }

    let handles: Vec<_> = clients
        .into_iter()
        .map(|client| {
            let app = app.clone();
            tokio::spawn(async move { app.join(&join_form(&client, room)).await })
        })
        .collect();

    let mut seated = 0;
    for handle in handles {
        let resp = handle.await.unwrap();
        if resp.location == Some(format!("/room?id={}", room.0)) {
            seated += 1;
        } else {
            assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
        }
    }

    assert_eq!(seated, 3);
    let seats: BTreeSet<u32> = app
        .admission()
        .roster(room)
        .await
        .unwrap()
        .iter()
        .map(|m| m.seat.0)
        .collect();
    assert_eq!(seats, BTreeSet::from([1, 2, 3]));
    assert_eq!(
        app.admission().room(room).await.unwrap().status,
        RoomStatus::InProgress
    );
}

// =========================================================================
// Session expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expired_session_cannot_join() {
    let app = MindtableBuilder::new()
        .session_config(SessionConfig {
            sliding_window: Duration::from_secs(60),
            ..SessionConfig::default()
        })
        .build(TestAuth, MemoryRoomRepository::new());
    let room = app.admission().repository().create_room(4).await;
    let mut client = Client::visit(&app).await;
    let resp = app
        .login(
            &client
                .request()
                .field("username", "user1")
                .field("password", "secret")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;
    client.absorb(&resp);

    tokio::time::advance(Duration::from_secs(61)).await;
    let resp = app.join(&join_form(&client, room)).await;

    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH));
    assert!(app.admission().roster(room).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_purge_sessions_reclaims_idle_anonymous_keeps_live_login() {
    let app = app();
    for _ in 0..10 {
        Client::visit(&app).await;
    }
    let mut client = logged_in(&app, 1).await;
    assert_eq!(app.sessions().len().await, 11);

    // Keep the login busy while the anonymous visitors stay away.
    tokio::time::advance(Duration::from_secs(50 * 60)).await;
    let resp = app
        .save_preference(
            &client
                .request()
                .field("preference", "language")
                .field("value", "fr")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;
    assert_eq!(resp.status, 200);
    client.absorb(&resp);
    tokio::time::advance(Duration::from_secs(15 * 60)).await;

    assert_eq!(app.purge_sessions().await.unwrap(), 10);
    assert_eq!(app.sessions().len().await, 1);
    let room = app.admission().repository().create_room(4).await;
    let resp = app.join(&join_form(&client, room)).await;
    assert_eq!(resp.location, Some(format!("/room?id={}", room.0)));
}

#[tokio::test(start_paused = true)]
async fn test_session_reaper_purges_on_interval() {
    let app = app();
    for _ in 0..5 {
        Client::visit(&app).await;
    }
    let reaper = app.spawn_session_reaper(Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(app.sessions().len().await, 5, "still inside the idle bound");

    tokio::time::sleep(Duration::from_secs(32 * 60)).await;
    assert!(app.sessions().is_empty().await);

    reaper.abort();
}

// =========================================================================
// save_preference
// =========================================================================

#[tokio::test]
async fn test_save_preference_success() {
    let app = app();
    let client = logged_in(&app, 1).await;

    let resp = app
        .save_preference(
            &client
                .request()
                .field("preference", "language")
                .field("value", "fr")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(resp.status, 200);
    let body = resp.body.unwrap();
    assert!(body.success);
    assert_eq!(body.data, Some(serde_json::json!({ "language": "fr" })));
}

#[tokio::test]
async fn test_save_preference_anonymous_is_401() {
    let app = app();
    let client = Client::visit(&app).await;

    let resp = app
        .save_preference(
            &client
                .request()
                .field("preference", "theme")
                .field("value", "dark")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(resp.status, 401);
    assert!(!resp.body.unwrap().success);
}

#[tokio::test]
async fn test_save_preference_bad_csrf_is_403() {
    let app = app();
    let client = logged_in(&app, 1).await;

    let resp = app
        .save_preference(
            &client
                .request()
                .field("preference", "theme")
                .field("value", "dark")
                .field("csrf_token", "nope"),
        )
        .await;

    assert_eq!(resp.status, 403);
    assert!(resp.session.is_none());
}

#[tokio::test]
async fn test_save_preference_missing_value_is_400() {
    let app = app();
    let client = logged_in(&app, 1).await;

    let resp = app
        .save_preference(
            &client
                .request()
                .field("preference", "theme")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;

    assert_eq!(resp.status, 400);
    assert!(resp.session.is_some(), "a bad form does not end the session");
}

// =========================================================================
// logout
// =========================================================================

#[tokio::test]
async fn test_logout_destroys_session() {
    let app = app();
    let client = logged_in(&app, 1).await;

    let resp = app
        .logout(&client.request().field("csrf_token", client.csrf.clone()))
        .await;

    assert_eq!(resp.status, 200);
    assert!(resp.body.unwrap().success);
    assert!(resp.session.is_none());
    assert!(
        app.sessions()
            .load(client.session.as_ref().unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_logout_twice_both_succeed() {
    let app = app();
    let client = logged_in(&app, 1).await;
    let form = client.request().field("csrf_token", client.csrf.clone());

    let first = app.logout(&form).await;
    let second = app.logout(&form).await;

    assert_eq!(first.status, 200);
    assert_eq!(second.status, 200);
    assert!(second.body.unwrap().success);
}

#[tokio::test]
async fn test_logout_without_any_session_succeeds() {
    let app = app();
    let resp = app.logout(&Request::new(None)).await;
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn test_logout_survives_failing_side_effects() {
    let audit = BrokenAudit::default();
    let attempts = Arc::clone(&audit.attempts);
    let app = MindtableBuilder::new()
        .audit_log(audit)
        .presence(BrokenPresence)
        .build(TestAuth, MemoryRoomRepository::new());
    let mut client = Client::visit(&app).await;
    let resp = app
        .login(
            &client
                .request()
                .field("username", "user3")
                .field("password", "secret")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;
    assert_eq!(resp.location.as_deref(), Some(DASHBOARD_PATH), "login unaffected");
    client.absorb(&resp);

    let resp = app
        .logout(&client.request().field("csrf_token", client.csrf.clone()))
        .await;

    assert_eq!(resp.status, 200);
    assert!(resp.body.unwrap().success);
    assert!(app.sessions().is_empty().await);
    assert_eq!(attempts.load(Ordering::SeqCst), 2, "login and logout audited");
}

#[tokio::test]
async fn test_presence_follows_login_and_logout() {
    let app = MindtableBuilder::new()
        .presence(MemoryPresence::new())
        .build(TestAuth, MemoryRoomRepository::new());
    let mut client = Client::visit(&app).await;
    let resp = app
        .login(
            &client
                .request()
                .field("username", "user5")
                .field("password", "secret")
                .field("csrf_token", client.csrf.clone()),
        )
        .await;
    client.absorb(&resp);
    assert!(app.presence().is_online(UserId(5)).await);

    app.logout(&client.request()).await;

    assert!(!app.presence().is_online(UserId(5)).await);
}
