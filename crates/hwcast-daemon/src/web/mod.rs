//! REST and WebSocket API.

mod ws;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::snapshot::Category;
use crate::state::AppState;

const BANNER: &str =
    "Hardware Monitor Server - Use /api/hardware for REST API or /ws for WebSocket";

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Banner
        .route("/", get(index))
        // Pull API
        .route("/api/hardware", get(hardware))
        .route("/api/hardware/:category", get(hardware_category))
        // Push API
        .route("/ws", get(ws_upgrade))
        .layer(cors)
        .with_state(state)
}

/// GET / - Banner
async fn index() -> &'static str {
    BANNER
}

/// GET /api/hardware - Latest snapshot
async fn hardware(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.store().current();
    json_response(&*snapshot)
}

/// GET /api/hardware/:category - One category of the latest snapshot
async fn hardware_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Response {
    match category.parse::<Category>() {
        Ok(category) => {
            let snapshot = state.store().current();
            json_response(snapshot.category(category))
        }
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

/// GET /ws - Upgrade to a push subscription
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state))
}

fn json_response<T: Serialize + ?Sized>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize snapshot: {}", e),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::poller::Poller;
    use crate::snapshot::{self, Snapshot};
    use crate::testing::{cpu, wait_until, FixedBackend};
    use hwcast_hw::{Device, HardwareClass, SensorKind};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    async fn serve(state: Arc<AppState>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    struct HttpResponse {
        status: u16,
        /// Header block, lowercased
        head: String,
        body: String,
    }

    async fn request(addr: SocketAddr, method: &str, path: &str, headers: &str) -> HttpResponse {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n{}\r\n",
            method, path, headers
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
            .await
            .unwrap()
            .unwrap();
        let text = String::from_utf8(raw).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        HttpResponse {
            status: head.split_whitespace().nth(1).unwrap().parse().unwrap(),
            head: head.to_lowercase(),
            body: body.to_string(),
        }
    }

    async fn get_path(addr: SocketAddr, path: &str) -> HttpResponse {
        request(addr, "GET", path, "").await
    }

    async fn ws_connect(addr: SocketAddr) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /ws HTTP/1.1\r\n\
                  Host: localhost\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                  Sec-WebSocket-Version: 13\r\n\r\n",
            )
            .await
            .unwrap();

        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            let mut byte = [0u8; 1];
            stream.read_exact(&mut byte).await.unwrap();
            head.push(byte[0]);
        }
        let head = String::from_utf8(head).unwrap();
        assert!(head.starts_with("HTTP/1.1 101"), "{}", head);
        stream
    }

    /// Reads one unmasked server frame as (opcode, payload).
    async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await.unwrap();
        let opcode = header[0] & 0x0F;
        let len = match header[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                stream.read_exact(&mut ext).await.unwrap();
                u16::from_be_bytes(ext) as usize
            }
            127 => {
                let mut ext = [0u8; 8];
                stream.read_exact(&mut ext).await.unwrap();
                u64::from_be_bytes(ext) as usize
            }
            n => n as usize,
        };
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.unwrap();
        (opcode, payload)
    }

    /// Reads frames until the next text frame and parses it as a snapshot.
    async fn next_snapshot(stream: &mut TcpStream) -> Snapshot {
        loop {
            let (opcode, payload) = timeout(Duration::from_secs(5), read_frame(stream))
                .await
                .expect("no snapshot pushed");
            if opcode == 0x1 {
                return serde_json::from_slice(&payload).unwrap();
            }
        }
    }

    /// Writes a client frame with a zero masking key.
    async fn write_frame(stream: &mut TcpStream, opcode: u8, payload: &[u8]) {
        assert!(payload.len() < 126);
        let mut frame = vec![0x80 | opcode, 0x80 | payload.len() as u8, 0, 0, 0, 0];
        frame.extend_from_slice(payload);
        stream.write_all(&frame).await.unwrap();
    }

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(&Config::default()))
    }

    fn every_category() -> Vec<Device> {
        vec![
            Device::new("Ryzen", HardwareClass::Cpu).with_sensor(
                "Tctl",
                SensorKind::Temperature,
                Some(55.0),
            ),
            Device::new("amdgpu", HardwareClass::GpuAmd),
            Device::new("nouveau", HardwareClass::GpuNvidia),
            Device::new("Generic Memory", HardwareClass::Memory),
            Device::new("sda", HardwareClass::Storage),
            Device::new("eth0", HardwareClass::Network),
        ]
    }

    #[tokio::test]
    async fn test_end_to_end_pull_and_push() {
        let state = app_state();
        let addr = serve(state.clone()).await;

        let mut client = ws_connect(addr).await;
        wait_until(|| state.broadcaster().len() == 1).await;

        let handle = Poller::new(
            FixedBackend::new(cpu(55.0)),
            state.clone(),
            Duration::from_secs(1),
        )
        .spawn();

        let pushed = next_snapshot(&mut client).await;
        assert_eq!(pushed.cpu.len(), 1);
        assert_eq!(pushed.cpu[0].readings[0].value, Some(55.0));

        let response = get_path(addr, "/api/hardware").await;
        assert_eq!(response.status, 200);
        assert!(response.head.contains("content-type: application/json"));
        let pulled: Snapshot = serde_json::from_str(&response.body).unwrap();
        assert_eq!(pulled, pushed);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_snapshot_before_first_cycle() {
        let addr = serve(app_state()).await;
        let response = get_path(addr, "/api/hardware").await;
        assert_eq!(response.status, 200);
        assert_eq!(
            response.body,
            r#"{"Cpu":[],"Gpu":[],"Memory":[],"Storage":[],"Network":[]}"#
        );
    }

    #[tokio::test]
    async fn test_category_endpoints() {
        let state = app_state();
        state.store().replace(snapshot::build(&every_category()));
        let addr = serve(state).await;

        let expected = [
            ("cpu", vec!["Ryzen"]),
            ("gpu", vec!["amdgpu", "nouveau"]),
            ("memory", vec!["Generic Memory"]),
            ("storage", vec!["sda"]),
            ("network", vec!["eth0"]),
        ];
        for (category, names) in expected {
            let response = get_path(addr, &format!("/api/hardware/{}", category)).await;
            assert_eq!(response.status, 200, "{}", category);
            let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
            let got: Vec<&str> = body
                .as_array()
                .unwrap()
                .iter()
                .map(|d| d["Name"].as_str().unwrap())
                .collect();
            assert_eq!(got, names, "{}", category);
        }

        let cpu: serde_json::Value =
            serde_json::from_str(&get_path(addr, "/api/hardware/cpu").await.body).unwrap();
        assert_eq!(cpu[0]["Sensors"][0]["Type"], "Temperature");
        assert_eq!(cpu[0]["Sensors"][0]["Value"], 55.0);

        let response = get_path(addr, "/api/hardware/motherboard").await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_non_finite_values_over_http() {
        let state = app_state();
        state.store().replace(snapshot::build(&[Device::new(
            "cpu0",
            HardwareClass::Cpu,
        )
        .with_sensor("Tccd1", SensorKind::Temperature, Some(f32::NAN))
        .with_sensor("Bus", SensorKind::Clock, None)]));
        let addr = serve(state).await;

        let body: serde_json::Value =
            serde_json::from_str(&get_path(addr, "/api/hardware/cpu").await.body).unwrap();
        assert_eq!(body[0]["Sensors"][0]["Value"], "NaN");
        assert!(body[0]["Sensors"][1]["Value"].is_null());
    }

    #[tokio::test]
    async fn test_banner() {
        let addr = serve(app_state()).await;
        let response = get_path(addr, "/").await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, BANNER);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let addr = serve(app_state()).await;

        let response = request(
            addr,
            "GET",
            "/api/hardware",
            "Origin: http://dashboard.example\r\n",
        )
        .await;
        assert_eq!(response.status, 200);
        assert!(response.head.contains("access-control-allow-origin: *"));

        let preflight = request(
            addr,
            "OPTIONS",
            "/api/hardware",
            "Origin: http://dashboard.example\r\n\
             Access-Control-Request-Method: GET\r\n\
             Access-Control-Request-Headers: x-requested-with\r\n",
        )
        .await;
        assert_eq!(preflight.status, 200);
        assert!(preflight.head.contains("access-control-allow-origin: *"));
        assert!(preflight.head.contains("access-control-allow-methods: *"));
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let state = app_state();
        let addr = serve(state.clone()).await;
        let response = get_path(addr, "/ws").await;
        assert_eq!(response.status, 400);
        assert!(state.broadcaster().is_empty());
    }

    #[tokio::test]
    async fn test_client_close_unregisters() {
        let state = app_state();
        let addr = serve(state.clone()).await;

        let mut first = ws_connect(addr).await;
        let _second = ws_connect(addr).await;
        wait_until(|| state.broadcaster().len() == 2).await;

        write_frame(&mut first, 0x8, &[]).await;
        wait_until(|| state.broadcaster().len() == 1).await;
    }

    #[tokio::test]
    async fn test_dropped_connection_unregisters() {
        let state = app_state();
        let addr = serve(state.clone()).await;

        let client = ws_connect(addr).await;
        wait_until(|| state.broadcaster().len() == 1).await;
        drop(client);
        wait_until(|| state.broadcaster().is_empty()).await;
    }

    #[tokio::test]
    async fn test_inbound_messages_are_ignored() {
        let state = app_state();
        let addr = serve(state.clone()).await;

        let mut client = ws_connect(addr).await;
        wait_until(|| state.broadcaster().len() == 1).await;
        write_frame(&mut client, 0x1, b"hello").await;

        let snapshot = snapshot::build(&cpu(42.0));
        let report = state.broadcaster().publish(&snapshot).unwrap();
        assert_eq!(report.queued, 1);
        assert_eq!(state.broadcaster().len(), 1);

        let pushed = next_snapshot(&mut client).await;
        assert_eq!(pushed, snapshot);
    }

    #[tokio::test]
    async fn test_keepalive_ping_leaves_connection_responsive() {
        let config = Config {
            keepalive_secs: 1,
            ..Config::default()
        };
        let state = Arc::new(AppState::new(&config));
        let addr = serve(state.clone()).await;

        let mut client = ws_connect(addr).await;
        wait_until(|| state.broadcaster().len() == 1).await;

        let (opcode, _) = timeout(Duration::from_secs(5), read_frame(&mut client))
            .await
            .expect("no keep-alive ping");
        assert_eq!(opcode, 0x9);

        // The connection loop still sees the client's close after pinging
        write_frame(&mut client, 0x8, &[]).await;
        wait_until(|| state.broadcaster().is_empty()).await;
    }
}
