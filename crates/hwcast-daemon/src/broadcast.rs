//! Push subscriber registry and snapshot fan-out.
//!
//! Every subscriber gets its own outbound task fed by a bounded queue.
//! Publishing only enqueues, so a slow or stalled connection holds up nothing
//! but its own task; one that falls a full queue behind is dropped.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use crate::snapshot::Snapshot;

/// Identifier handed out by [`Broadcaster::register`].
pub type SubscriberId = u64;

/// Lifecycle of a push subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Transport handshake in progress, not yet registered.
    Connecting,
    /// Registered and eligible for delivery.
    Open,
    /// Close handshake started.
    Closing,
    /// Unregistered, resources released.
    Closed,
}

/// Why a subscriber stopped receiving broadcasts.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The subscriber's transport reports it is no longer open.
    #[error("Subscriber is no longer open")]
    Closed,

    /// The send did not complete in time.
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    /// The outbound queue was full when a new snapshot arrived.
    #[error("Subscriber fell {0} messages behind")]
    Lagging(usize),

    /// The transport failed while sending.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A long-lived push connection that receives every broadcast.
pub trait Subscriber: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> SubscriberState;

    /// Sends one serialized snapshot.
    fn deliver(&self, payload: Arc<str>) -> BoxFuture<'_, Result<(), DeliveryError>>;

    /// Called once the subscriber has been unregistered after a failed
    /// delivery, so its connection can be torn down.
    fn on_dropped(&self) {}
}

/// Outcome of one publish pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the message was queued for.
    pub queued: usize,
    /// Subscribers unregistered because they were closed or too far behind.
    pub dropped: usize,
}

struct Registration {
    subscriber: Arc<dyn Subscriber>,
    outbox: mpsc::Sender<Arc<str>>,
}

#[derive(Default)]
struct Registry {
    subscribers: Mutex<HashMap<SubscriberId, Registration>>,
}

impl Registry {
    // The lock is never held across an await or a send, so a poisoned map
    // is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Registration>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> Option<Arc<dyn Subscriber>> {
        self.lock().remove(&id).map(|r| r.subscriber)
    }
}

/// Registry of push subscribers.
pub struct Broadcaster {
    registry: Arc<Registry>,
    next_id: AtomicU64,
    send_timeout: Option<Duration>,
    queue_depth: usize,
}

impl Broadcaster {
    /// Creates an empty registry.
    ///
    /// With `send_timeout` set, a send that takes longer counts as a failed
    /// delivery. `queue_depth` is how many snapshots may wait for one
    /// subscriber before it is dropped as lagging.
    pub fn new(send_timeout: Option<Duration>, queue_depth: usize) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            next_id: AtomicU64::new(1),
            send_timeout,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Adds a subscriber and starts its outbound task. It receives
    /// broadcasts from the next publish on.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbox, inbox) = mpsc::channel(self.queue_depth);
        let count = {
            let mut subscribers = self.registry.lock();
            subscribers.insert(
                id,
                Registration {
                    subscriber: Arc::clone(&subscriber),
                    outbox,
                },
            );
            subscribers.len()
        };
        tokio::spawn(outbound(
            id,
            subscriber,
            inbox,
            Arc::downgrade(&self.registry),
            self.send_timeout,
        ));
        debug!("Subscriber {} registered ({} total)", id, count);
        id
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id).is_some();
        if removed {
            debug!("Subscriber {} unregistered", id);
        }
        removed
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    /// Serializes `snapshot` once and queues it for every subscriber
    /// registered when the call begins. Never waits on a send.
    ///
    /// Returns an error only if serialization fails. Subscribers that are
    /// no longer open or whose queue is full are unregistered and counted
    /// as dropped.
    pub fn publish(&self, snapshot: &Snapshot) -> serde_json::Result<PublishReport> {
        if self.is_empty() {
            return Ok(PublishReport::default());
        }
        let payload: Arc<str> = serde_json::to_string(snapshot)?.into();
        Ok(self.enqueue(payload))
    }

    fn enqueue(&self, payload: Arc<str>) -> PublishReport {
        let mut report = PublishReport::default();
        let mut rejected = Vec::new();
        for (id, registration) in self.registry.lock().iter() {
            if registration.subscriber.state() != SubscriberState::Open {
                rejected.push((*id, DeliveryError::Closed));
                continue;
            }
            match registration.outbox.try_send(Arc::clone(&payload)) {
                Ok(()) => report.queued += 1,
                Err(TrySendError::Full(_)) => {
                    rejected.push((*id, DeliveryError::Lagging(self.queue_depth)))
                }
                Err(TrySendError::Closed(_)) => rejected.push((*id, DeliveryError::Closed)),
            }
        }

        for (id, reason) in rejected {
            if let Some(subscriber) = self.registry.remove(id) {
                info!("Dropping subscriber {}: {}", id, reason);
                report.dropped += 1;
                subscriber.on_dropped();
            }
        }
        report
    }
}

/// Delivers queued payloads to one subscriber until it is unregistered or a
/// send fails.
async fn outbound(
    id: SubscriberId,
    subscriber: Arc<dyn Subscriber>,
    mut inbox: mpsc::Receiver<Arc<str>>,
    registry: Weak<Registry>,
    send_timeout: Option<Duration>,
) {
    while let Some(payload) = inbox.recv().await {
        if subscriber.state() != SubscriberState::Open {
            break;
        }
        let result = match send_timeout {
            Some(limit) => tokio::time::timeout(limit, subscriber.deliver(payload))
                .await
                .unwrap_or(Err(DeliveryError::Timeout(limit))),
            None => subscriber.deliver(payload).await,
        };
        if let Err(e) = result {
            let removed = registry
                .upgrade()
                .and_then(|registry| registry.remove(id))
                .is_some();
            if removed {
                info!("Dropping subscriber {}: {}", id, e);
                subscriber.on_dropped();
            } else {
                debug!("Send to departed subscriber {} failed: {}", id, e);
            }
            break;
        }
    }
    debug!("Outbound task for subscriber {} finished", id);
}
