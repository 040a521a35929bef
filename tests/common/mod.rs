//! Shared in-process fake of the Kit service for integration tests.
#![allow(dead_code)]
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kit_sync::kit::model::{Broadcast, Subscriber};
use kit_sync::kit::{BroadcastDraft, KitError, KitService};
use kit_sync::model::SubscribeRequest;

pub fn broadcast(id: i64, subject: &str) -> Broadcast {
    Broadcast {
        id,
        subject: subject.to_string(),
        created_at: "2024-05-02T00:00:00Z".to_string(),
        content: None,
        public: true,
        published_at: None,
        thumbnail_url: None,
    }
}

/// Records every call and serves broadcasts from in-memory state, so
/// tests can assert on exactly which remote writes a scenario caused.
#[derive(Default)]
pub struct FakeKit {
    broadcasts: Mutex<Vec<Broadcast>>,
    /// Broadcasts that appear only from the second list call onward,
    /// simulating a concurrent external write.
    late_broadcasts: Mutex<Vec<Broadcast>>,
    /// Subjects whose create call fails.
    failing_subjects: Mutex<HashSet<String>>,
    /// Emails whose subscribe calls fail.
    failing_emails: Mutex<HashSet<String>>,
    next_id: AtomicI64,
    pub list_calls: AtomicUsize,
    pub created_drafts: Mutex<Vec<BroadcastDraft>>,
    pub subscriber_calls: Mutex<Vec<SubscribeRequest>>,
    pub form_calls: Mutex<Vec<(i64, String, String)>>,
}

impl FakeKit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(100),
            ..Default::default()
        })
    }

    pub async fn seed_broadcast(&self, subject: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.broadcasts.lock().await.push(broadcast(id, subject));
    }

    pub async fn seed_late_broadcast(&self, subject: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.late_broadcasts.lock().await.push(broadcast(id, subject));
    }

    pub async fn fail_subject(&self, subject: &str) {
        self.failing_subjects.lock().await.insert(subject.to_string());
    }

    pub async fn fail_email(&self, email: &str) {
        self.failing_emails.lock().await.insert(email.to_string());
    }

    pub async fn created_subjects(&self) -> Vec<String> {
        self.created_drafts
            .lock()
            .await
            .iter()
            .map(|d| d.subject.clone())
            .collect()
    }

    pub async fn created_drafts(&self) -> Vec<BroadcastDraft> {
        self.created_drafts.lock().await.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn subscriber(id: i64, email: &str) -> Subscriber {
    Subscriber {
        id,
        email_address: email.to_string(),
        state: Some("active".to_string()),
        created_at: Some("2024-05-02T00:00:00Z".to_string()),
        fields: serde_json::Map::new(),
    }
}

#[async_trait]
impl KitService for FakeKit {
    async fn list_broadcasts(&self) -> Result<Vec<Broadcast>, KitError> {
        let calls = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut broadcasts = self.broadcasts.lock().await.clone();
        if calls >= 2 {
            broadcasts.extend(self.late_broadcasts.lock().await.iter().cloned());
        }
        Ok(broadcasts)
    }

    async fn create_broadcast(&self, draft: &BroadcastDraft) -> Result<Broadcast, KitError> {
        if self.failing_subjects.lock().await.contains(&draft.subject) {
            return Err(KitError::Api {
                status: 500,
                message: "simulated broadcast outage".to_string(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = broadcast(id, &draft.subject);
        self.broadcasts.lock().await.push(created.clone());
        self.created_drafts.lock().await.push(draft.clone());
        Ok(created)
    }

    async fn create_subscriber(&self, request: &SubscribeRequest) -> Result<Subscriber, KitError> {
        if self.failing_emails.lock().await.contains(&request.email_address) {
            return Err(KitError::Api {
                status: 422,
                message: "Email address is invalid".to_string(),
            });
        }
        self.subscriber_calls.lock().await.push(request.clone());
        Ok(subscriber(1, &request.email_address))
    }

    async fn add_subscriber_to_form(
        &self,
        form_id: i64,
        email_address: &str,
        referrer: &str,
    ) -> Result<Subscriber, KitError> {
        self.form_calls
            .lock()
            .await
            .push((form_id, email_address.to_string(), referrer.to_string()));
        Ok(subscriber(1, email_address))
    }
}
