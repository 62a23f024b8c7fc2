//! The outbound publish queue (§4.6): LIFO, so that under congestion the
//! worker drains the newest intention first rather than piling up stale
//! traffic. A [`tokio::sync::Notify`] stands in for the spec's internal
//! notification pipe — the worker's readiness select waits on it exactly as
//! it would wait on a pipe becoming readable.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use rumqttc::QoS;
use tokio::sync::Notify;

#[derive(Clone, Debug, PartialEq)]
pub struct OutboundItem {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

pub struct OutboundQueue {
    items: Mutex<VecDeque<OutboundItem>>,
    notify: Notify,
    /// Submission timestamp of the most recently enqueued item, read by the
    /// black-hole monitor as `waiting_time_s` (§4.6, §4.9).
    last_submission: Mutex<Option<Instant>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            last_submission: Mutex::new(None),
        }
    }

    /// Enqueues `item`. Notifies the worker only when the queue was
    /// previously empty — a non-empty queue already has a pending wake-up
    /// (§4.6 "iff the queue was previously empty or previously quiescent").
    pub fn push(&self, item: OutboundItem) {
        let mut items = self.items.lock();
        let was_empty = items.is_empty();
        items.push_back(item);
        *self.last_submission.lock() = Some(Instant::now());
        if was_empty {
            self.notify.notify_one();
        }
    }

    /// Pops the most recently enqueued item (LIFO).
    pub fn pop(&self) -> Option<OutboundItem> {
        self.items.lock().pop_back()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seconds since the most recent submission, `0` if the queue has never
    /// received an item or is currently empty (§4.6 `waiting_time_s`).
    pub fn waiting_time_s(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        match *self.last_submission.lock() {
            Some(at) => at.elapsed().as_secs_f64(),
            None => 0.0,
        }
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(topic: &str) -> OutboundItem {
        OutboundItem {
            topic: topic.to_string(),
            payload: vec![],
            qos: QoS::AtLeastOnce,
            retain: false,
        }
    }

    #[test]
    fn pop_returns_most_recently_pushed_item() {
        let queue = OutboundQueue::new();
        queue.push(item("a"));
        queue.push(item("b"));
        assert_eq!(queue.pop().unwrap().topic, "b");
        assert_eq!(queue.pop().unwrap().topic, "a");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn waiting_time_is_zero_when_empty() {
        let queue = OutboundQueue::new();
        assert_eq!(queue.waiting_time_s(), 0.0);
    }

    #[tokio::test]
    async fn push_on_empty_queue_wakes_the_worker() {
        let queue = OutboundQueue::new();
        let notified = queue.notified();
        queue.push(item("a"));
        tokio::time::timeout(std::time::Duration::from_millis(100), notified)
            .await
            .expect("push on an empty queue must notify");
    }
}
