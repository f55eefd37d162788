use axum::{
    body::Bytes,
    debug_handler,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use thiserror::Error;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_graceful_shutdown::SubsystemHandle;

use lidar_replay::{scheduler::PlaybackStatus, Session, VERSION};

const STATUS_URI: &str = "/v1/api/status";
const FRAMES_URI: &str = "/v1/api/frames";
const STREAM_URI: &str = "/v1/api/stream";

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Socket operation failed")]
    Io(#[from] io::Error),
}

#[derive(Clone)]
pub struct Web {
    session: Session,
    shutdown_tx: broadcast::Sender<()>,
}

impl Web {
    pub fn new(session: Session) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Web {
            session,
            shutdown_tx,
        }
    }

    fn router(self) -> Router {
        Router::new()
            .route(STATUS_URI, get(get_status))
            .route(FRAMES_URI, get(get_frames))
            .route(STREAM_URI, get(stream_handler))
            .layer(middleware::from_fn(no_cache_middleware))
            .with_state(self)
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), WebError> {
        let port = self.session.args().port;
        let listener =
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).await?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let shutdown_tx = self.shutdown_tx.clone();

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        info!("Starting HTTP web server on port {}", port);

        tokio::select! { biased;
            _ = subsys.on_shutdown_requested() => {
                let _ = shutdown_tx.send(());
            },
            r = axum::serve(listener, app)
                    .with_graceful_shutdown(
                        async move {
                            _ = shutdown_rx.recv().await;
                        }
                    ) => {
                return r.map_err(WebError::Io);
            }
        }
        Ok(())
    }
}

/// Middleware to add no-cache headers to API responses
async fn no_cache_middleware(request: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusApi {
    version: &'static str,
    topic: String,
    subscribers: usize,
    #[serde(flatten)]
    playback: PlaybackStatus,
}

#[debug_handler]
async fn get_status(State(state): State<Web>) -> Response {
    let publisher = state.session.publisher();
    Json(StatusApi {
        version: VERSION,
        topic: publisher.topic().to_string(),
        subscribers: publisher.subscriber_count(),
        playback: state.session.playback_status(),
    })
    .into_response()
}

async fn get_frames(State(state): State<Web>) -> Response {
    Json(state.session.frames()).into_response()
}

#[debug_handler]
async fn stream_handler(
    State(state): State<Web>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    debug!("stream request from {}", addr);

    let shutdown_rx = state.shutdown_tx.subscribe();
    let cloud_rx = state.session.publisher().subscribe();
    ws.on_upgrade(move |socket| cloud_stream(socket, cloud_rx, shutdown_rx))
}

/// Forward every published cloud to one websocket client
async fn cloud_stream(
    mut socket: WebSocket,
    mut cloud_rx: broadcast::Receiver<Bytes>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Shutdown of websocket");
                break;
            },
            r = cloud_rx.recv() => {
                match r {
                    Ok(message) => {
                        let len = message.len();
                        if let Err(e) = socket.send(Message::Binary(message)).await {
                            warn!("Error on send to websocket: {}", e);
                            break;
                        }
                        trace!("Sent cloud message {} bytes", len);
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Websocket receiver lagged, skipped {} clouds", n);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Cloud channel closed");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use clap::Parser;
    use http_body_util::BodyExt;
    use lidar_replay::{
        dataset::FramesSummary,
        publisher::CloudPublisher,
        scheduler::{PlaybackConfig, PlaybackScheduler},
        Cli,
    };
    use lidar_replay_core::{FrameSequence, PointCloudMessage, PointXyzi};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_session() -> Session {
        let args = Cli::parse_from(["lidar-replay", "/data/drive", "--topic", "velodyne"]);
        let publisher = CloudPublisher::new("velodyne", 2, false);
        let frames = FramesSummary {
            frame_count: 2,
            skipped: 1,
            first_timestamp_ns: Some(1000),
            last_timestamp_ns: Some(5000),
            capture_duration_ns: 4000,
            total_points: 7,
        };
        Session::new(args, publisher, frames)
    }

    async fn get_json(session: Session, uri: &str) -> (Response, serde_json::Value) {
        let response = Web::new(session)
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap();
        (Response::from_parts(parts, Body::empty()), json)
    }

    #[tokio::test]
    async fn test_status_before_playback() {
        let (response, json) = get_json(create_session(), STATUS_URI).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json["state"], "idle");
        assert_eq!(json["topic"], "velodyne");
        assert_eq!(json["frameCount"], 2);
        assert_eq!(json["boundaryWaitMs"], 100);
        assert_eq!(json["version"], VERSION);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_while_playing() {
        let session = create_session();
        let points = [PointXyzi::new(0.0, 0.0, 0.0, 1.0)];
        let sequence = Arc::new(
            FrameSequence::new(
                vec![0, 100_000_000],
                vec![
                    PointCloudMessage::from_points(&points, 0, "velodyne"),
                    PointCloudMessage::from_points(&points, 100_000_000, "velodyne"),
                ],
            )
            .unwrap(),
        );

        let mut scheduler = PlaybackScheduler::new(PlaybackConfig::default());
        scheduler.start(sequence, session.publisher()).unwrap();
        session.set_playback(scheduler.handle());
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        let (_, json) = get_json(session, STATUS_URI).await;
        assert_eq!(json["state"], "armed");
        assert_eq!(json["emissions"], 1);
        assert_eq!(json["frame"], 1);
        assert_eq!(json["lastTimestampNs"], 0);
    }

    #[tokio::test]
    async fn test_frames_summary() {
        let (response, json) = get_json(create_session(), FRAMES_URI).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json["frameCount"], 2);
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["captureDurationNs"], 4000);
        assert_eq!(json["totalPoints"], 7);
    }

    #[tokio::test]
    async fn test_no_cache_headers() {
        let (response, _) = get_json(create_session(), FRAMES_URI).await;
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = Web::new(create_session())
            .router()
            .oneshot(Request::builder().uri("/v1/api/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
