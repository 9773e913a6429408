//! HTTP routes for `/s/{id}`, `/s/{id}/meta` and `/s/{id}/blob`

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, Path, State, rejection::PathRejection},
    http::{
        Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES, PRAGMA},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use secret_protocol::{ShareId, ShareMeta};
use share_session::{Lookup, SessionError, SessionRegistry, ShareEvent, ShareSession};
use tokio::sync::mpsc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::body::NotifyingBody;
use crate::page;

/// Headers attached to every response
const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("x-xss-protection", "1; mode=block"),
    (
        "permissions-policy",
        "camera=(), microphone=(), geolocation=(), interest-cohort=()",
    ),
];

const NO_CACHE: &str = "no-store, no-cache, must-revalidate";

/// Shared state behind the delivery routes
#[derive(Clone)]
pub struct DeliveryState {
    registry: Arc<SessionRegistry>,
    events: mpsc::UnboundedSender<ShareEvent>,
    forwarded_headers: Arc<[HeaderName]>,
}

impl DeliveryState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        events: mpsc::UnboundedSender<ShareEvent>,
        forwarded_headers: &[String],
    ) -> Self {
        let forwarded_headers = forwarded_headers
            .iter()
            .filter_map(|name| match HeaderName::try_from(name.as_str()) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!("Ignoring invalid forwarding header {:?}: {}", name, e);
                    None
                }
            })
            .collect();

        Self {
            registry,
            events,
            forwarded_headers,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

/// Build the delivery router
pub fn router(state: DeliveryState) -> Router {
    let router = Router::new()
        .route("/s/{id}", get(page_handler))
        .route("/s/{id}/meta", get(meta_handler))
        // HEAD must not reach the blob handler, which would spend a view
        .route("/s/{id}/blob", get(blob_handler).head(not_found))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state);

    SECURITY_HEADERS
        .iter()
        .fold(router, |router, &(name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
        .layer(TraceLayer::new_for_http())
}

/// Landing page
async fn page_handler(
    State(state): State<DeliveryState>,
    id: Result<Path<String>, PathRejection>,
) -> Response {
    let session = match find(&state, id) {
        Found::Active(session) => session,
        Found::Gone => return gone(),
        Found::Unknown => return not_found().await,
    };

    let html = page::render(session.id(), session.filename());
    (
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CACHE_CONTROL, "no-store, no-cache, must-revalidate, proxy-revalidate"),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        html,
    )
        .into_response()
}

/// Filename lookup; never consumes a view
async fn meta_handler(
    State(state): State<DeliveryState>,
    id: Result<Path<String>, PathRejection>,
) -> Response {
    let session = match find(&state, id) {
        Found::Active(session) => session,
        Found::Gone => return gone(),
        Found::Unknown => return not_found().await,
    };

    let meta = ShareMeta {
        filename: session.filename().map(str::to_string),
    };
    ([(CACHE_CONTROL, NO_CACHE)], Json(meta)).into_response()
}

/// Consume one view and stream the sealed envelope
async fn blob_handler(
    State(state): State<DeliveryState>,
    id: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Response {
    let Some(id) = parse_id(id) else {
        return not_found().await;
    };
    let source = source_address(&headers, &extensions, &state.forwarded_headers);

    let grant = match state.registry.consume_view(&id, source) {
        Ok(grant) => grant,
        Err(SessionError::NotFound) => return not_found().await,
        Err(e) => {
            debug!(share_id = %id, "Blob refused: {}", e);
            return gone();
        }
    };

    info!(
        share_id = %id,
        view = grant.snapshot.current,
        max = grant.snapshot.max,
        "Delivering envelope"
    );

    let len = grant.envelope.len();
    let events = state.events.clone();
    let event = ShareEvent::Viewed {
        id,
        snapshot: grant.snapshot,
        record: grant.record,
    };
    let body = NotifyingBody::new(grant.envelope, move || {
        // the host may already have stopped listening
        let _ = events.send(event);
    });

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (CONTENT_LENGTH, HeaderValue::from(len)),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

enum Found {
    Active(Arc<ShareSession>),
    Gone,
    Unknown,
}

/// Malformed or undecodable ids are treated like unknown ones
fn parse_id(id: Result<Path<String>, PathRejection>) -> Option<ShareId> {
    let Path(id) = id.ok()?;
    ShareId::parse(&id).ok()
}

fn find(state: &DeliveryState, id: Result<Path<String>, PathRejection>) -> Found {
    let Some(id) = parse_id(id) else {
        return Found::Unknown;
    };
    match state.registry.lookup(&id) {
        Lookup::Active(session) => Found::Active(session),
        Lookup::Retired(_) => Found::Gone,
        Lookup::Unknown => Found::Unknown,
    }
}

/// Best-known receiver address: trusted forwarding header, then the peer
fn source_address(
    headers: &HeaderMap,
    extensions: &Extensions,
    forwarded_headers: &[HeaderName],
) -> Option<String> {
    let forwarded = forwarded_headers.iter().find_map(|name| {
        let value = headers.get(name)?.to_str().ok()?;
        let first_hop = value.split(',').next()?.trim();
        first_hop.parse::<IpAddr>().ok()
    });

    forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .map(|ip| ip.to_string())
}

fn gone() -> Response {
    (
        StatusCode::GONE,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Secret already retrieved",
    )
        .into_response()
}

/// Same answer for unknown ids, unknown paths and wrong methods
async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Not found",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use crypto_envelope::{decrypt, encrypt, generate_key};
    use http_body_util::BodyExt;
    use secret_protocol::ShareState;
    use share_session::ShareOptions;
    use tower::ServiceExt;

    use super::*;

    struct Fixture {
        app: Router,
        registry: Arc<SessionRegistry>,
        events: mpsc::UnboundedReceiver<ShareEvent>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let state = DeliveryState::new(
            registry.clone(),
            tx,
            &["cf-connecting-ip".to_string(), "x-forwarded-for".to_string()],
        );
        Fixture {
            app: router(state),
            registry,
            events: rx,
        }
    }

    fn publish(registry: &SessionRegistry, envelope: Vec<u8>, options: ShareOptions) -> ShareId {
        registry
            .register(ShareSession::create(envelope, options).unwrap())
            .id()
            .clone()
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        get_with(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn get_with(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_hello_world_single_view() {
        let mut fx = fixture();
        let key = generate_key();
        let sealed = encrypt(b"hello world", &key).unwrap();
        let id = publish(&fx.registry, sealed.clone(), ShareOptions::default());

        let (status, headers, body) = get(&fx.app, &format!("/s/{}/blob", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[CONTENT_LENGTH], sealed.len().to_string().as_str());
        assert_eq!(headers[CACHE_CONTROL], "no-store");
        assert_eq!(body, sealed);
        assert_eq!(decrypt(&body, &key).unwrap(), b"hello world");

        let (status, _, body) = get(&fx.app, &format!("/s/{}/blob", id)).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body, b"Secret already retrieved");

        match fx.events.recv().await.unwrap() {
            ShareEvent::Viewed { id: seen, snapshot, .. } => {
                assert_eq!(seen, id);
                assert!(snapshot.done);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_three_views_then_gone() {
        let mut fx = fixture();
        let id = publish(
            &fx.registry,
            vec![7u8; 40],
            ShareOptions {
                max_views: 3,
                ..Default::default()
            },
        );

        for _ in 0..3 {
            let (status, _, _) = get(&fx.app, &format!("/s/{}/blob", id)).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _, _) = get(&fx.app, &format!("/s/{}/blob", id)).await;
        assert_eq!(status, StatusCode::GONE);

        let mut snapshots = Vec::new();
        while let Ok(ShareEvent::Viewed { snapshot, .. }) = fx.events.try_recv() {
            snapshots.push((snapshot.current, snapshot.max, snapshot.done));
        }
        assert_eq!(snapshots, vec![(1, 3, false), (2, 3, false), (3, 3, true)]);
    }

    #[tokio::test]
    async fn test_meta_never_consumes_views() {
        let fx = fixture();
        let id = publish(
            &fx.registry,
            vec![1u8; 30],
            ShareOptions {
                filename: Some("report.pdf".into()),
                ..Default::default()
            },
        );

        for _ in 0..5 {
            let (status, headers, body) = get(&fx.app, &format!("/s/{}/meta", id)).await;
            assert_eq!(status, StatusCode::OK);
            assert!(headers[CACHE_CONTROL].to_str().unwrap().contains("no-store"));
            let meta: ShareMeta = serde_json::from_slice(&body).unwrap();
            assert_eq!(meta.filename.as_deref(), Some("report.pdf"));
        }

        let (status, _, _) = get(&fx.app, &format!("/s/{}/blob", id)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_text_share_meta_is_null() {
        let fx = fixture();
        let id = publish(&fx.registry, vec![1u8; 30], ShareOptions::default());

        let (_, _, body) = get(&fx.app, &format!("/s/{}/meta", id)).await;
        assert_eq!(body, br#"{"filename":null}"#);
    }

    #[tokio::test]
    async fn test_page_has_mode_markers_and_headers() {
        let fx = fixture();
        let file_id = publish(
            &fx.registry,
            vec![1u8; 30],
            ShareOptions {
                filename: Some("test.txt".into()),
                ..Default::default()
            },
        );
        let text_id = publish(&fx.registry, vec![1u8; 30], ShareOptions::default());

        let (status, headers, body) = get(&fx.app, &format!("/s/{}", file_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[CONTENT_TYPE].to_str().unwrap().contains("text/html"));
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert!(
            headers["permissions-policy"]
                .to_str()
                .unwrap()
                .contains("camera=()")
        );
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("test.txt"));
        assert!(html.contains("isFile = true"));

        let (_, _, body) = get(&fx.app, &format!("/s/{}", text_id)).await;
        assert!(String::from_utf8(body).unwrap().contains("isFile = false"));

        // viewing the page is free
        assert!(fx.registry.lookup(&file_id).is_active());
    }

    #[tokio::test]
    async fn test_unknown_ids_and_paths_look_identical() {
        let fx = fixture();
        let id = publish(&fx.registry, vec![1u8; 30], ShareOptions::default());
        let stranger = ShareId::generate();

        let uris = [
            format!("/s/{}", stranger),
            format!("/s/{}/meta", stranger),
            format!("/s/{}/blob", stranger),
            "/s/wrongid/blob".to_string(),
            format!("/s/{}/other", id),
            "/unknown".to_string(),
            "/".to_string(),
        ];

        let mut answers = Vec::new();
        for uri in &uris {
            let (status, headers, body) = get(&fx.app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(headers["x-frame-options"], "DENY");
            answers.push(body);
        }
        assert!(answers.windows(2).all(|w| w[0] == w[1]));

        let request = Request::post(format!("/s/{}/blob", id))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = get_with(&fx.app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, answers[0]);

        // probing did not burn the view
        let (status, _, _) = get(&fx.app, &format!("/s/{}/blob", id)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_head_does_not_spend_a_view() {
        let mut fx = fixture();
        let id = publish(&fx.registry, vec![3u8; 30], ShareOptions::default());

        let request = Request::head(format!("/s/{}/blob", id))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = get_with(&fx.app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(fx.events.try_recv().is_err());
        assert!(fx.registry.lookup(&id).is_active());

        let (status, _, body) = get(&fx.app, &format!("/s/{}/blob", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, vec![3u8; 30]);
    }

    #[tokio::test]
    async fn test_undecodable_id_is_not_found() {
        let fx = fixture();
        let (_, _, generic) = get(&fx.app, "/unknown").await;

        for uri in ["/s/%FF", "/s/%FF/meta", "/s/%FF%FE/blob"] {
            let (status, _, body) = get(&fx.app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body, generic);
        }
    }

    #[tokio::test]
    async fn test_retired_share_is_gone_everywhere() {
        let fx = fixture();
        let id = publish(&fx.registry, vec![1u8; 30], ShareOptions::default());
        assert_eq!(fx.registry.retire(&id), Some(ShareState::Cancelled));

        for suffix in ["", "/meta", "/blob"] {
            let (status, _, _) = get(&fx.app, &format!("/s/{}{}", id, suffix)).await;
            assert_eq!(status, StatusCode::GONE);
        }
    }

    #[tokio::test]
    async fn test_forwarded_address_preferred() {
        let mut fx = fixture();
        let id = publish(&fx.registry, vec![1u8; 30], ShareOptions::default());

        let request = Request::get(format!("/s/{}/blob", id))
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = get_with(&fx.app, request).await;
        assert_eq!(status, StatusCode::OK);

        match fx.events.recv().await.unwrap() {
            ShareEvent::Viewed { record, .. } => {
                assert_eq!(record.source.as_deref(), Some("203.0.113.9"));
                assert_eq!(record.ordinal, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_source_address_fallbacks() {
        let names = [HeaderName::from_static("cf-connecting-ip")];
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));

        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("not-an-ip"));
        assert_eq!(
            source_address(&headers, &extensions, &names).as_deref(),
            Some("192.0.2.1")
        );

        headers.insert("cf-connecting-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(
            source_address(&headers, &extensions, &names).as_deref(),
            Some("2001:db8::1")
        );

        assert_eq!(source_address(&HeaderMap::new(), &Extensions::new(), &names), None);
    }
}
