//! In-process job queue honoring the same contract as the Redis queue,
//! including scheduled delivery. Used by the pipeline tests and for local
//! single-process runs without a broker.

use super::{JobQueue, QueueError};
use crate::jobs::JobEnvelope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
struct QueueState {
    ready: HashMap<String, VecDeque<String>>,
    scheduled: HashMap<String, Vec<(DateTime<Utc>, String)>>,
}

pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn promote_due(state: &mut QueueState, queue: &str) {
        let now = Utc::now();
        if let Some(entries) = state.scheduled.get_mut(queue) {
            let mut due: Vec<(DateTime<Utc>, String)> = Vec::new();
            entries.retain(|(not_before, body)| {
                if *not_before <= now {
                    due.push((*not_before, body.clone()));
                    false
                } else {
                    true
                }
            });
            due.sort_by_key(|(not_before, _)| *not_before);
            let ready = state.ready.entry(queue.to_string()).or_default();
            for (_, body) in due {
                ready.push_back(body);
            }
        }
    }

    /// Number of immediately deliverable jobs on a queue.
    pub fn ready_len(&self, queue: &str) -> usize {
        let mut state = self.state.lock().unwrap();
        Self::promote_due(&mut state, queue);
        state.ready.get(queue).map(VecDeque::len).unwrap_or(0)
    }

    /// Scheduled (not yet due) jobs on a queue, for inspection in tests.
    pub fn scheduled_jobs(&self, queue: &str) -> Vec<(DateTime<Utc>, JobEnvelope)> {
        let state = self.state.lock().unwrap();
        state
            .scheduled
            .get(queue)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(not_before, body)| {
                        serde_json::from_str(body).ok().map(|e| (*not_before, e))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn push(&self, queue: &str, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let body = serde_json::to_string(envelope)?;
        {
            let mut state = self.state.lock().unwrap();
            state.ready.entry(queue.to_string()).or_default().push_back(body);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn push_scheduled(
        &self,
        queue: &str,
        envelope: &JobEnvelope,
        not_before: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let body = serde_json::to_string(envelope)?;
        {
            let mut state = self.state.lock().unwrap();
            state
                .scheduled
                .entry(queue.to_string())
                .or_default()
                .push((not_before, body));
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop_blocking(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobEnvelope>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let popped = {
                let mut state = self.state.lock().unwrap();
                Self::promote_due(&mut state, queue);
                state.ready.get_mut(queue).and_then(VecDeque::pop_front)
            };
            if let Some(body) = popped {
                return Ok(Some(serde_json::from_str(&body)?));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Short wait so scheduled jobs becoming due are picked up
            // without an external notification.
            let wait = (deadline - now).min(Duration::from_millis(20));
            let _ = tokio::time::timeout(wait, self.notify.notified()).await;
        }
    }
}
