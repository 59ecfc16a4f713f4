//! WebSocket push subscribers.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::future::BoxFuture;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use crate::broadcast::{DeliveryError, Subscriber, SubscriberId, SubscriberState};
use crate::state::AppState;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Send half of a client connection, registered with the broadcaster.
struct WsSubscriber {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    state: RwLock<SubscriberState>,
    /// Signalled when a send fails or the broadcaster gives up on us
    broken: Notify,
}

impl WsSubscriber {
    fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
            state: RwLock::new(SubscriberState::Connecting),
            broken: Notify::new(),
        }
    }

    fn set_state(&self, state: SubscriberState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Marks the transport unusable and wakes the connection loop.
    fn mark_broken(&self) {
        self.set_state(SubscriberState::Closed);
        self.broken.notify_one();
    }

    /// Sends a keep-alive ping on its own task so the connection loop keeps
    /// draining inbound frames. Skipped while a send holds the sink, since
    /// that send already exercises the connection.
    fn ping(self: &Arc<Self>, id: SubscriberId) {
        let subscriber = Arc::clone(self);
        tokio::spawn(async move {
            let mut sink = match subscriber.sink.try_lock() {
                Ok(sink) => sink,
                Err(_) => {
                    debug!("WebSocket client {} busy, skipping ping", id);
                    return;
                }
            };
            if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                debug!("WebSocket client {} ping failed: {}", id, e);
                subscriber.mark_broken();
            }
        });
    }

    /// Completes the close handshake if the transport is still usable.
    async fn close(&self, frame: Option<CloseFrame<'static>>) {
        if self.state() == SubscriberState::Open {
            self.set_state(SubscriberState::Closing);
            let handshake = async move {
                let mut sink = self.sink.lock().await;
                if let Err(e) = sink.send(Message::Close(frame)).await {
                    debug!("Close frame not sent: {}", e);
                }
                if let Err(e) = sink.close().await {
                    debug!("Close failed: {}", e);
                }
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, handshake).await.is_err() {
                debug!("Close handshake timed out");
            }
        }
        self.set_state(SubscriberState::Closed);
    }
}

impl Subscriber for WsSubscriber {
    fn state(&self) -> SubscriberState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, payload: Arc<str>) -> BoxFuture<'_, Result<(), DeliveryError>> {
        Box::pin(async move {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                self.set_state(SubscriberState::Closed);
                return Err(DeliveryError::Transport(e.to_string()));
            }
            Ok(())
        })
    }

    fn on_dropped(&self) {
        self.mark_broken();
    }
}

/// Serves one upgraded connection until the client goes away.
///
/// The connection is push-only: inbound data frames are read and discarded.
pub(super) async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let subscriber = Arc::new(WsSubscriber::new(sink));
    subscriber.set_state(SubscriberState::Open);
    let id = state.broadcaster().register(subscriber.clone());
    info!("WebSocket client {} connected", id);

    let mut keepalive = state.keepalive().map(keepalive_interval);

    let close_frame = loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket client {} sent close", id);
                    break frame;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket client {} error: {}", id, e);
                    subscriber.set_state(SubscriberState::Closed);
                    break None;
                }
                None => {
                    subscriber.set_state(SubscriberState::Closed);
                    break None;
                }
            },
            _ = subscriber.broken.notified() => {
                debug!("WebSocket client {} transport broken", id);
                break None;
            }
            _ = tick(&mut keepalive) => subscriber.ping(id),
        }
    };

    state.broadcaster().unregister(id);
    subscriber.close(close_frame).await;
    info!("WebSocket client {} disconnected", id);
}

fn keepalive_interval(period: Duration) -> Interval {
    tokio::time::interval_at(Instant::now() + period, period)
}

/// Waits for the next keep-alive tick, or forever when disabled.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
