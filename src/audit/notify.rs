//! Immediate alert notification hook.
//!
//! Invoked for critical audit entries and critical alerts, independent of
//! whether the corresponding writes succeeded. Fire-and-forget by design so
//! a slow notification channel can never sit on the request path.

use serde_json::Value;

use crate::observability::metrics;

pub trait AlertNotifier: Send + Sync {
    fn notify(&self, title: &str, details: &Value);
}

/// Default notifier: structured log line plus a metrics counter. Deployments
/// wire a pager or webhook implementation here.
#[derive(Default)]
pub struct TracingNotifier;

impl AlertNotifier for TracingNotifier {
    fn notify(&self, title: &str, details: &Value) {
        tracing::error!(target: "security_alert", alert = %title, details = %details, "SECURITY ALERT");
        metrics::record_notification(title);
    }
}

/// Test doubles shared by unit and integration tests.
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Captures notifications for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub titles: Mutex<Vec<String>>,
    }

    impl AlertNotifier for RecordingNotifier {
        fn notify(&self, title: &str, _details: &Value) {
            self.titles.lock().unwrap().push(title.to_string());
        }
    }
}
