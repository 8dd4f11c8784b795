//! Shared test doubles for the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grant_coordinator::{CapabilityAuthority, LifecycleAnchor, PromptRequest, RequestCoordinator};

/// Scripted host: answers queries from its sets and records every prompt
#[derive(Default)]
pub struct RecordingAuthority {
    granted: Mutex<HashSet<String>>,
    revoked: Mutex<HashSet<String>>,
    rationale: Mutex<HashSet<String>>,
    prompts: Mutex<Vec<PromptRequest>>,
}

impl RecordingAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grant(&self, name: &str) {
        self.granted.lock().unwrap().insert(name.to_string());
    }

    pub fn revoke(&self, name: &str) {
        self.revoked.lock().unwrap().insert(name.to_string());
    }

    pub fn allow_rationale(&self, name: &str) {
        self.rationale.lock().unwrap().insert(name.to_string());
    }

    pub fn prompts(&self) -> Vec<PromptRequest> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Wait until at least `count` prompts were issued
    pub async fn wait_for_prompts(&self, count: usize) -> Vec<PromptRequest> {
        wait_until(|| self.prompt_count() >= count).await;
        self.prompts()
    }
}

impl CapabilityAuthority for RecordingAuthority {
    fn is_granted(&self, name: &str) -> bool {
        self.granted.lock().unwrap().contains(name)
    }

    fn is_revoked_by_policy(&self, name: &str) -> bool {
        self.revoked.lock().unwrap().contains(name)
    }

    fn should_show_rationale(&self, name: &str) -> bool {
        self.rationale.lock().unwrap().contains(name)
    }

    fn prompt(&self, request: PromptRequest) {
        self.prompts.lock().unwrap().push(request);
    }
}

/// Anchor with a fresh recording host attached, plus a coordinator on it
pub fn setup() -> (RequestCoordinator, Arc<RecordingAuthority>) {
    let anchor = LifecycleAnchor::new();
    let authority = RecordingAuthority::new();
    anchor
        .attach(authority.clone())
        .expect("fresh anchor accepts a host");
    (RequestCoordinator::new(anchor), authority)
}

/// Poll `condition` until it holds, failing the test after one second
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}
