//! Common test utilities shared across integration tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use agekit_core::{LogEntry, Page, RenderTarget, VerificationOptions, View};

/// Everything a target was asked to draw, oldest first.
#[derive(Default)]
pub struct RecordingTarget {
    pub views: Mutex<Vec<View>>,
    pub entries: Mutex<Vec<LogEntry>>,
}

impl RecordingTarget {
    pub fn views(&self) -> Vec<View> {
        self.views.lock().unwrap().clone()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl RenderTarget for RecordingTarget {
    fn replace_content(&self, view: View) {
        self.views.lock().unwrap().push(view);
    }

    fn prepend_entry(&self, entry: LogEntry) {
        self.entries.lock().unwrap().insert(0, entry);
    }
}

/// A page with a fixed set of elements that records navigations.
#[derive(Default)]
pub struct RecordingPage {
    pub targets: HashMap<String, Arc<RecordingTarget>>,
    pub navigations: Mutex<Vec<String>>,
}

impl RecordingPage {
    pub fn with_targets(selectors: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            targets: selectors
                .iter()
                .map(|selector| (selector.to_string(), Arc::new(RecordingTarget::default())))
                .collect(),
            navigations: Mutex::default(),
        })
    }

    pub fn target(&self, selector: &str) -> Arc<RecordingTarget> {
        Arc::clone(&self.targets[selector])
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

impl Page for RecordingPage {
    fn query_selector(&self, selector: &str) -> Option<Arc<dyn RenderTarget>> {
        self.targets
            .get(selector)
            .map(|target| Arc::clone(target) as Arc<dyn RenderTarget>)
    }

    fn navigate(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
    }
}

/// The callbacks fired during a flow, in order.
#[derive(Clone, Default)]
pub struct CallbackLog(Arc<Mutex<Vec<String>>>);

impl CallbackLog {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn recorder(&self, name: &'static str) -> impl Fn() + Send + Sync + 'static {
        let log = self.clone();
        move || log.0.lock().unwrap().push(name.to_string())
    }

    /// Options pointing at `base_url` with every callback recording into this log.
    pub fn options(&self, base_url: &str) -> VerificationOptions {
        let failures = self.clone();
        VerificationOptions::new()
            .with_api_key("test-key")
            .with_qr_container_selector("#qr")
            .with_log_container_selector("#logs")
            .with_api_base_url(base_url)
            .with_poll_interval(POLL_INTERVAL)
            .on_success(self.recorder("success"))
            .on_failure(move |reason| {
                failures
                    .0
                    .lock()
                    .unwrap()
                    .push(format!("failure: {reason}"));
            })
            .on_scanning(self.recorder("scanning"))
            .on_rejected_by_user(self.recorder("rejected_by_user"))
            .on_rejected_by_requirements(self.recorder("rejected_by_requirements"))
            .on_timeout(self.recorder("timeout"))
    }
}

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Body of a successful QR code generation whose status is checked at `status_url`.
pub fn generation_body(status_url: &str) -> String {
    serde_json::json!({
        "qrCodeUrl": "u1",
        "deepLink": "d1",
        "qrCodeStatusCheckUrl": status_url,
    })
    .to_string()
}
