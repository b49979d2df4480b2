//! Job bus port and the in-process reference implementation.
//!
//! The contract is at-least-once delivery with explicit acknowledgement and a
//! prefetch of one per consumer: a delivery that is dropped without being
//! acked goes back to the front of its queue. External broker adapters are
//! wired in outside the core; the in-memory bus keeps single-node
//! deployments and the test suites free of infrastructure.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::errors::PortError;

/// At-least-once job transport.
#[async_trait]
pub trait JobBus: Send + Sync {
    /// Enqueues a payload on the named queue.
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), PortError>;

    /// Waits for the next delivery on the named queue. Returns `None` once
    /// the bus is closed and the queue has drained.
    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>, PortError>;
}

struct QueueState {
    items: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl QueueState {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

/// One in-flight message. Dropping without [`Delivery::ack`] requeues the
/// payload at the front of the queue.
pub struct Delivery {
    payload: Vec<u8>,
    queue: Arc<QueueState>,
    acked: bool,
}

impl Delivery {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledges the message; it will not be redelivered.
    pub fn ack(mut self) {
        self.acked = true;
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.acked {
            warn!("delivery dropped without ack; requeueing");
            let payload = std::mem::take(&mut self.payload);
            if let Ok(mut items) = self.queue.items.lock() {
                items.push_front(payload);
            }
            self.queue.notify.notify_one();
        }
    }
}

/// In-process bus over per-queue deques.
#[derive(Default)]
pub struct MemoryJobBus {
    queues: Mutex<HashMap<String, Arc<QueueState>>>,
}

impl MemoryJobBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every queue closed; consumers drain what is left and then
    /// observe `None`.
    pub fn close(&self) {
        let queues = self.queues.lock().expect("bus lock poisoned");
        for q in queues.values() {
            q.closed.store(true, Ordering::SeqCst);
            q.notify.notify_waiters();
        }
    }

    fn queue(&self, name: &str) -> Arc<QueueState> {
        let mut queues = self.queues.lock().expect("bus lock poisoned");
        queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(QueueState::new()))
            .clone()
    }
}

#[async_trait]
impl JobBus for MemoryJobBus {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), PortError> {
        let q = self.queue(queue);
        {
            let mut items = q
                .items
                .lock()
                .map_err(|_| PortError::Transient("bus queue lock poisoned".into()))?;
            items.push_back(payload);
        }
        debug!(queue, "job published");
        q.notify.notify_one();
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>, PortError> {
        let q = self.queue(queue);
        loop {
            {
                let mut items = q
                    .items
                    .lock()
                    .map_err(|_| PortError::Transient("bus queue lock poisoned".into()))?;
                if let Some(payload) = items.pop_front() {
                    return Ok(Some(Delivery {
                        payload,
                        queue: q.clone(),
                        acked: false,
                    }));
                }
                if q.closed.load(Ordering::SeqCst) {
                    return Ok(None);
                }
            }
            q.notified_or_closed().await;
        }
    }
}

impl QueueState {
    async fn notified_or_closed(&self) {
        // Register interest before re-checking so a concurrent publish between
        // the lock release and this await cannot be missed.
        let notified = self.notify.notified();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_and_ack() {
        let bus = MemoryJobBus::new();
        bus.publish("q", b"one".to_vec()).await.unwrap();
        let d = bus.next_delivery("q").await.unwrap().unwrap();
        assert_eq!(d.payload(), b"one");
        d.ack();

        bus.close();
        assert!(bus.next_delivery("q").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unacked_delivery_is_redelivered() {
        let bus = MemoryJobBus::new();
        bus.publish("q", b"job".to_vec()).await.unwrap();

        {
            let d = bus.next_delivery("q").await.unwrap().unwrap();
            assert_eq!(d.payload(), b"job");
            // Dropped without ack.
        }

        let d2 = bus.next_delivery("q").await.unwrap().unwrap();
        assert_eq!(d2.payload(), b"job");
        d2.ack();
    }

    #[tokio::test]
    async fn redelivery_goes_to_front() {
        let bus = MemoryJobBus::new();
        bus.publish("q", b"first".to_vec()).await.unwrap();
        bus.publish("q", b"second".to_vec()).await.unwrap();

        {
            let d = bus.next_delivery("q").await.unwrap().unwrap();
            assert_eq!(d.payload(), b"first");
        }

        let d = bus.next_delivery("q").await.unwrap().unwrap();
        assert_eq!(d.payload(), b"first");
        d.ack();
        let d = bus.next_delivery("q").await.unwrap().unwrap();
        assert_eq!(d.payload(), b"second");
        d.ack();
    }
}
