//! HTTP engine client against a fake engine served on loopback.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use bytes::{BufMut, Bytes, BytesMut};
use fleetdeck_control_plane::{
    engine::{Engine, EngineError, HttpEngine, LogsQuery},
    fleet::ContainerState,
};
use fleetdeck_logframe::{demux_lines, FrameDecoder};
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;

fn frame(tag: u8, payload: &str) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(tag);
    buf.put_bytes(0, 3);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload.as_bytes());
    buf.freeze()
}

fn not_found(id: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("No such container: {id}") })),
    )
}

async fn list() -> Json<Value> {
    Json(json!([
        {
            "Id": "c1",
            "Names": ["/billing"],
            "Image": "billing:1.2",
            "State": "running",
            "Status": "Up 2 hours",
            "Ports": [{ "PrivatePort": 8080, "PublicPort": 18080, "Type": "tcp" }],
            "Labels": { "tier": "backend" }
        },
        {
            "Id": "c2",
            "Names": ["/worker"],
            "Image": "worker:latest",
            "State": "restarting",
            "Status": "Restarting (1) 3 seconds ago"
        }
    ]))
}

async fn inspect(Path(id): Path<String>) -> impl IntoResponse {
    if id != "c1" {
        return not_found(&id).into_response();
    }
    Json(json!({
        "Id": "c1",
        "Name": "/billing",
        "Config": { "Env": ["PORT=8080", "URI_DB=http://db:5432"] }
    }))
    .into_response()
}

async fn logs(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if id != "c1" {
        return not_found(&id).into_response();
    }
    if params.get("follow").map(String::as_str) == Some("true") {
        // Split one frame across chunks like a slow writer would.
        let whole = frame(1, "streamed line\n");
        let (head, tail) = whole.split_at(5);
        let chunks = vec![
            Bytes::copy_from_slice(head),
            Bytes::copy_from_slice(tail),
            frame(2, "warning\n"),
        ];
        let body = stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
        return Body::from_stream(body).into_response();
    }

    let mut body = BytesMut::new();
    let prefix = if params.get("timestamps").map(String::as_str) == Some("true") {
        "2024-05-01T10:00:00Z "
    } else {
        ""
    };
    body.extend_from_slice(&frame(1, &format!("{prefix}tail={}\n", params["tail"])));
    body.extend_from_slice(&frame(2, &format!("{prefix}\x1b[33mslow query\x1b[0m\n")));
    body.freeze().into_response()
}

async fn start(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "c1" => StatusCode::NO_CONTENT.into_response(),
        "busy" => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "container is being removed" })),
        )
            .into_response(),
        _ => not_found(&id).into_response(),
    }
}

async fn remove(
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    if id == "c1" && params.get("force").map(String::as_str) == Some("true") {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn serve_fake_engine() -> String {
    let app = Router::new()
        .route("/_ping", get(|| async { "OK" }))
        .route("/info", get(|| async { Json(json!({ "Containers": 2 })) }))
        .route("/containers/json", get(list))
        .route("/containers/{id}/json", get(inspect))
        .route("/containers/{id}/logs", get(logs))
        .route("/containers/{id}/start", post(start))
        .route("/containers/{id}", delete(remove));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

async fn engine() -> HttpEngine {
    let url = serve_fake_engine().await;
    HttpEngine::new(&url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_list_and_inspect() {
    let engine = engine().await;
    engine.ping().await.unwrap();

    let fleet = engine.list_containers().await.unwrap();
    assert_eq!(fleet.len(), 2);
    assert_eq!(fleet[0].identity(), "billing");
    assert_eq!(fleet[0].state, ContainerState::Running);
    assert_eq!(fleet[1].state, ContainerState::Restarting);

    let details = engine.inspect_container("c1").await.unwrap();
    assert_eq!(details.name(), Some("billing"));
    assert_eq!(details.env(), vec!["PORT=8080", "URI_DB=http://db:5432"]);

    let info = engine.info().await.unwrap();
    assert_eq!(info["Containers"], 2);
}

#[tokio::test]
async fn test_error_mapping() {
    let engine = engine().await;

    match engine.inspect_container("ghost").await {
        Err(EngineError::NotFound(message)) => assert_eq!(message, "No such container: ghost"),
        other => panic!("expected not found, got {other:?}"),
    }

    match engine.start_container("busy").await {
        Err(EngineError::Status { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "container is being removed");
        }
        other => panic!("expected status error, got {other:?}"),
    }

    engine.start_container("c1").await.unwrap();
    engine.remove_container("c1").await.unwrap();
}

#[tokio::test]
async fn test_bounded_logs_are_framed() {
    let engine = engine().await;

    let body = engine
        .container_logs(
            "c1",
            LogsQuery {
                tail: 42,
                timestamps: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        demux_lines(&body),
        vec![
            "2024-05-01T10:00:00Z tail=42",
            "2024-05-01T10:00:00Z slow query"
        ]
    );
}

#[tokio::test]
async fn test_follow_reassembles_split_frames() {
    let engine = engine().await;

    let mut stream = engine.follow_logs("c1", 50).await.unwrap();
    let mut decoder = FrameDecoder::new();
    let mut lines = Vec::new();
    while let Some(chunk) = stream.next().await {
        for frame in decoder.push(&chunk.unwrap()).unwrap() {
            lines.push(frame.text());
        }
    }
    assert_eq!(lines, vec!["streamed line\n", "warning\n"]);
    assert_eq!(decoder.pending_len(), 0);

    assert!(matches!(
        engine.follow_logs("ghost", 50).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reserved_characters_stay_in_the_id_segment() {
    let engine = engine().await;

    match engine.inspect_container("c1/../x?all=1").await {
        Err(EngineError::NotFound(message)) => {
            assert_eq!(message, "No such container: c1/../x?all=1")
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(matches!(
        engine.start_container("c1#frag").await,
        Err(EngineError::NotFound(_))
    ));
}
