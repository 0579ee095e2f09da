use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use super::tracker::{IssueTracker, TicketRequest};
use crate::errors::TrackerError;

/// In-process tracker double. Ticket IDs are handed out from 10001 upward.
pub struct FakeTracker {
    statuses: Mutex<HashMap<String, String>>,
    created: Mutex<Vec<TicketRequest>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(10001),
            failing: AtomicBool::new(false),
        }
    }
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, ticket_id: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(ticket_id.to_string(), status.to_string());
    }

    /// Make every call fail with a 503 until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<TicketRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn create_ticket(&self, ticket: &TicketRequest) -> Result<String, TrackerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::Status { status: 503 });
        }
        self.created.lock().unwrap().push(ticket.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    async fn fetch_status(&self, ticket_id: &str) -> Result<String, TrackerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::Status { status: 503 });
        }
        self.statuses
            .lock()
            .unwrap()
            .get(ticket_id)
            .cloned()
            .ok_or(TrackerError::Status { status: 404 })
    }
}
