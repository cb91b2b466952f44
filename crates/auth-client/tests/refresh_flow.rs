//! End-to-end refresh behavior against a mock backend.
//!
//! The mock serves `token/refresh/` plus a few protected routes and counts
//! every hit, so each test can assert how many refresh calls were made and
//! which bearer token each request carried.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auth_client::{AuthClient, ClientOptions, Error, NavigationPort, RefreshPhase};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use session_auth::{CredentialPair, CredentialStore};
use tokio::net::TcpListener;

/// How the mock refresh endpoint answers.
#[derive(Clone)]
enum RefreshReply {
    Issue {
        access: &'static str,
        rotate: Option<&'static str>,
    },
    Fail(StatusCode),
    Hang,
}

struct Backend {
    valid_token: &'static str,
    reply: RefreshReply,
    /// Refresh answers only after this many 401s were served, so concurrent
    /// requests are all parked before the refresh settles.
    hold_until_unauthorized: usize,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
    refresh_bodies: Mutex<Vec<serde_json::Value>>,
    accepted_auth: Mutex<Vec<String>>,
}

impl Backend {
    fn new(valid_token: &'static str, reply: RefreshReply, hold_until_unauthorized: usize) -> Arc<Self> {
        Arc::new(Self {
            valid_token,
            reply,
            hold_until_unauthorized,
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            accepted_auth: Mutex::new(Vec::new()),
        })
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn accepted_auth(&self) -> Vec<String> {
        self.accepted_auth.lock().unwrap().clone()
    }
}

async fn refresh_handler(
    State(backend): State<Arc<Backend>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    backend.refresh_bodies.lock().unwrap().push(body);

    // Wait until the expected 401s went out, then give clients time to park
    for _ in 0..200 {
        if backend.unauthorized.load(Ordering::SeqCst) >= backend.hold_until_unauthorized {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    match backend.reply.clone() {
        RefreshReply::Issue { access, rotate } => {
            let mut json = serde_json::json!({ "access": access });
            if let Some(refresh) = rotate {
                json["refresh"] = refresh.into();
            }
            Json(json).into_response()
        }
        RefreshReply::Fail(status) => (
            status,
            Json(serde_json::json!({ "detail": "Token is invalid or expired" })),
        )
            .into_response(),
        RefreshReply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn protected_handler(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if auth == format!("Bearer {}", backend.valid_token) {
        backend.accepted_auth.lock().unwrap().push(auth.clone());
        Json(serde_json::json!({ "ok": true, "authorization": auth })).into_response()
    } else {
        backend.unauthorized.fetch_add(1, Ordering::SeqCst);
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Given token not valid" })),
        )
            .into_response()
    }
}

async fn always_unauthorized(State(backend): State<Arc<Backend>>) -> Response {
    backend.unauthorized.fetch_add(1, Ordering::SeqCst);
    StatusCode::UNAUTHORIZED.into_response()
}

async fn echo_authorization(headers: HeaderMap) -> Json<serde_json::Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(serde_json::json!({ "authorization": auth }))
}

async fn start_backend(backend: Arc<Backend>) -> String {
    let app = axum::Router::new()
        .route("/api/token/refresh/", post(refresh_handler))
        .route("/api/always-401/", get(always_unauthorized))
        .route("/api/echo/", get(echo_authorization))
        .route("/api/missing/", get(|| async { StatusCode::NOT_FOUND }))
        .fallback(protected_handler)
        .with_state(backend);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/")
}

/// Navigator stub whose location follows its redirects.
struct RecordingNavigator {
    location: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn at(location: &str) -> Arc<Self> {
        Arc::new(Self {
            location: Mutex::new(location.to_string()),
            redirects: Mutex::new(Vec::new()),
        })
    }

    fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl NavigationPort for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.lock().unwrap().clone()
    }

    fn redirect(&self, target: &str) {
        self.redirects.lock().unwrap().push(target.to_string());
        *self.location.lock().unwrap() = target.to_string();
    }
}

fn client_for(
    base_url: &str,
    pair: CredentialPair,
    navigator: Arc<RecordingNavigator>,
    timeout: Duration,
) -> (AuthClient, Arc<CredentialStore>) {
    let store = Arc::new(CredentialStore::with_pair(pair));
    let options = ClientOptions {
        base_url: base_url.to_string(),
        timeout,
        login_path: "/login".into(),
    };
    (AuthClient::new(options, store.clone(), navigator), store)
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let backend = Backend::new(
        "T2",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        3,
    );
    let base = start_backend(backend.clone()).await;
    let nav = RecordingNavigator::at("/");
    let (client, store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_secs(5),
    );

    let (a, b, c) = tokio::join!(
        client.get("despesas/"),
        client.get("categorias/"),
        client.get("grupos/meu/"),
    );

    for response in [a, b, c] {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["authorization"], "Bearer T2");
    }
    assert_eq!(backend.refresh_calls(), 1, "exactly one refresh call");
    assert_eq!(backend.accepted_auth(), vec!["Bearer T2"; 3]);
    assert_eq!(
        backend.refresh_bodies.lock().unwrap()[0],
        serde_json::json!({ "refresh": "R1" })
    );
    assert_eq!(store.access_token().await.as_deref(), Some("T2"));
    assert_eq!(store.refresh_token().await.as_deref(), Some("R1"));
    assert_eq!(client.phase(), RefreshPhase::Idle);
    assert_eq!(client.coordinator().waiting(), 0);
    assert!(nav.redirects().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallel_401s_across_workers_share_one_refresh() {
    const REQUESTS: usize = 20;
    let backend = Backend::new(
        "T2",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        REQUESTS,
    );
    let base = start_backend(backend.clone()).await;
    let nav = RecordingNavigator::at("/");
    let (client, store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_secs(5),
    );

    let handles: Vec<_> = (0..REQUESTS)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.get(&format!("despesas/{i}/")).await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(backend.refresh_calls(), 1, "exactly one refresh call");
    assert_eq!(backend.accepted_auth(), vec!["Bearer T2"; REQUESTS]);
    assert_eq!(store.access_token().await.as_deref(), Some("T2"));
    assert_eq!(client.phase(), RefreshPhase::Idle);
    assert_eq!(client.coordinator().waiting(), 0);
    assert!(nav.redirects().is_empty());
}

#[tokio::test]
async fn later_requests_use_refreshed_token() {
    let backend = Backend::new(
        "T2",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        1,
    );
    let base = start_backend(backend.clone()).await;
    let (client, _store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        RecordingNavigator::at("/"),
        Duration::from_secs(5),
    );

    assert_eq!(client.get("despesas/").await.unwrap().status(), StatusCode::OK);
    assert_eq!(client.get("moradores/").await.unwrap().status(), StatusCode::OK);
    assert_eq!(client.get("users/me/").await.unwrap().status(), StatusCode::OK);

    assert_eq!(backend.refresh_calls(), 1);
    // One 401 for the stale token, then every request carried T2
    assert_eq!(backend.unauthorized.load(Ordering::SeqCst), 1);
    assert_eq!(backend.accepted_auth(), vec!["Bearer T2"; 3]);
}

#[tokio::test]
async fn replayed_401_passes_through_without_second_refresh() {
    let backend = Backend::new(
        "T2",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        1,
    );
    let base = start_backend(backend.clone()).await;
    let nav = RecordingNavigator::at("/");
    let (client, store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_secs(5),
    );

    let response = client.get("always-401/").await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.unauthorized.load(Ordering::SeqCst), 2);
    // Refresh itself succeeded, so the session survives
    assert_eq!(store.access_token().await.as_deref(), Some("T2"));
    assert!(nav.redirects().is_empty());
}

#[tokio::test]
async fn missing_refresh_token_ends_session_without_refresh_call() {
    let backend = Backend::new(
        "T2",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        1,
    );
    let base = start_backend(backend.clone()).await;
    let nav = RecordingNavigator::at("/lancamentos?mes=3");
    let (client, store) = client_for(
        &base,
        CredentialPair {
            access_token: Some("T1".into()),
            refresh_token: None,
        },
        nav.clone(),
        Duration::from_secs(5),
    );

    let err = client.get("despesas/").await.unwrap_err();
    assert_eq!(err, Error::NoRefreshToken);
    assert_eq!(backend.refresh_calls(), 0);
    assert!(store.get().await.is_empty());
    assert_eq!(
        nav.redirects(),
        vec!["/login?redirect=%2Flancamentos%3Fmes%3D3"]
    );
}

#[tokio::test]
async fn refresh_rejection_fails_every_waiter_and_clears_store() {
    let backend = Backend::new("T2", RefreshReply::Fail(StatusCode::BAD_REQUEST), 2);
    let base = start_backend(backend.clone()).await;
    let nav = RecordingNavigator::at("/relatorio");
    let (client, store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_secs(5),
    );

    let (a, b) = tokio::join!(client.get("despesas/"), client.get("categorias/"));
    let a = a.unwrap_err();
    let b = b.unwrap_err();

    assert!(
        matches!(&a, Error::Refresh(session_auth::Error::Rejected { status: 400, .. })),
        "got: {a:?}"
    );
    assert_eq!(a, b, "all callers see the same refresh error");
    assert_eq!(backend.refresh_calls(), 1);
    assert!(store.get().await.is_empty());
    assert_eq!(nav.redirects(), vec!["/login?redirect=%2Frelatorio"]);
    assert_eq!(client.phase(), RefreshPhase::Idle);
}

#[tokio::test]
async fn refresh_timeout_is_session_loss() {
    let backend = Backend::new("T2", RefreshReply::Hang, 1);
    let base = start_backend(backend.clone()).await;
    let nav = RecordingNavigator::at("/modelos");
    let (client, store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_millis(500),
    );

    let err = client.get("despesas/").await.unwrap_err();
    assert!(
        matches!(err, Error::Refresh(session_auth::Error::Http(_))),
        "got: {err:?}"
    );
    assert_eq!(backend.refresh_calls(), 1);
    assert!(store.get().await.is_empty());
    assert_eq!(nav.redirects().len(), 1);
}

#[tokio::test]
async fn rotated_refresh_token_is_stored() {
    let backend = Backend::new(
        "T2",
        RefreshReply::Issue {
            access: "T2",
            rotate: Some("R2"),
        },
        1,
    );
    let base = start_backend(backend.clone()).await;
    let (client, store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        RecordingNavigator::at("/"),
        Duration::from_secs(5),
    );

    assert_eq!(client.get("despesas/").await.unwrap().status(), StatusCode::OK);
    assert_eq!(store.refresh_token().await.as_deref(), Some("R2"));
}

#[tokio::test]
async fn non_401_failures_pass_through() {
    let backend = Backend::new(
        "T1",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        1,
    );
    let base = start_backend(backend.clone()).await;
    let (client, _store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        RecordingNavigator::at("/"),
        Duration::from_secs(5),
    );

    let response = client.get("missing/").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let err = client.get_json::<serde_json::Value>("missing/").await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 404, .. }), "got: {err:?}");
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn transport_failure_never_triggers_refresh() {
    let nav = RecordingNavigator::at("/");
    let (client, store) = client_for(
        "http://127.0.0.1:1/api/",
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_secs(2),
    );

    let err = client.get("despesas/").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    assert_eq!(store.access_token().await.as_deref(), Some("T1"));
    assert!(nav.redirects().is_empty());
}

#[tokio::test]
async fn no_authorization_header_without_token() {
    let backend = Backend::new(
        "T1",
        RefreshReply::Issue {
            access: "T2",
            rotate: None,
        },
        1,
    );
    let base = start_backend(backend).await;
    let (client, _store) = client_for(
        &base,
        CredentialPair::default(),
        RecordingNavigator::at("/"),
        Duration::from_secs(5),
    );

    let json: serde_json::Value = client.get_json("echo/").await.unwrap();
    assert!(json["authorization"].is_null(), "got: {json}");
}

#[tokio::test]
async fn session_loss_on_login_page_does_not_redirect() {
    let backend = Backend::new("T2", RefreshReply::Fail(StatusCode::UNAUTHORIZED), 1);
    let base = start_backend(backend).await;
    let nav = RecordingNavigator::at("/login?redirect=%2F");
    let (client, _store) = client_for(
        &base,
        CredentialPair::new("T1", "R1"),
        nav.clone(),
        Duration::from_secs(5),
    );

    assert!(client.get("users/me/").await.is_err());
    assert!(nav.redirects().is_empty());
}
