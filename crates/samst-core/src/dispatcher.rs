// ── Command dispatcher ──
//
// Per-device command path to the cloud. One command in flight per device,
// submitted in order, with a fixed backoff schedule for the responses
// SmartThings uses to signal contention.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use samst_api::cloud::DeviceCommand;

use crate::backend::CloudBackend;
use crate::error::CoreError;
use crate::model::{AttributeStore, CommandRequest};
use crate::retry::{RetryPolicy, classify_cloud};

/// Pause between an execute query and the status read that picks it up.
pub const EXECUTE_SETTLE: Duration = Duration::from_millis(500);

pub struct CommandDispatcher {
    device_id: String,
    backend: Arc<dyn CloudBackend>,
    policy: RetryPolicy,
    // Fair mutex: waiters are served in submission order.
    gate: Mutex<()>,
}

impl CommandDispatcher {
    pub fn new(device_id: impl Into<String>, backend: Arc<dyn CloudBackend>) -> Self {
        Self::with_policy(device_id, backend, RetryPolicy::cloud_commands())
    }

    pub fn with_policy(
        device_id: impl Into<String>,
        backend: Arc<dyn CloudBackend>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            backend,
            policy,
            gate: Mutex::new(()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Send one command, retrying on conflict, rate limit and unavailability.
    ///
    /// Does not refresh state; callers request a refresh on success.
    pub async fn send(&self, request: &CommandRequest) -> Result<(), CoreError> {
        let _gate = self.gate.lock().await;
        self.send_locked(request).await
    }

    /// Ask the device to publish `href` and return the resulting payload.
    ///
    /// An empty map means the device answered without data.
    pub async fn execute_query(&self, href: &str) -> Result<Map<String, Value>, CoreError> {
        let _gate = self.gate.lock().await;
        self.send_locked(&CommandRequest::execute_query(href)).await?;
        tokio::time::sleep(EXECUTE_SETTLE).await;

        debug!(device_id = %self.device_id, href, "reading execute payload");
        let status = self.backend.get_status(&self.device_id).await?;
        let store = AttributeStore::from_status(status);
        Ok(store.execute_payload().cloned().unwrap_or_default())
    }

    pub async fn execute_set(&self, href: &str, prop: &str, value: Value) -> Result<(), CoreError> {
        self.send(&CommandRequest::execute_set(href, prop, value)).await
    }

    async fn send_locked(&self, request: &CommandRequest) -> Result<(), CoreError> {
        let commands = [DeviceCommand::from(request)];
        debug!(
            device_id = %self.device_id,
            component = %request.component,
            capability = %request.capability,
            command = %request.command,
            "sending command"
        );

        self.policy
            .run(
                |_| self.backend.send_commands(&self.device_id, &commands),
                classify_cloud,
            )
            .await
            .map_err(|failure| {
                warn!(
                    device_id = %self.device_id,
                    capability = %request.capability,
                    command = %request.command,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "command failed"
                );
                CoreError::from(failure.error)
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::model::execute;
    use crate::testing::{FakeBackend, execute_emulator, soundbar_status};

    fn setup() -> (Arc<FakeBackend>, CommandDispatcher) {
        let backend = Arc::new(FakeBackend::new(soundbar_status(&json!({}))));
        let dispatcher = CommandDispatcher::new("sb-1", backend.clone());
        (backend, dispatcher)
    }

    fn conflict() -> samst_api::Error {
        samst_api::Error::Conflict {
            message: "busy".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_conflict_then_succeeds() {
        let (backend, dispatcher) = setup();
        backend.fail_command(conflict());
        backend.fail_command(conflict());

        let started = tokio::time::Instant::now();
        dispatcher.send(&CommandRequest::new("switch", "on")).await.unwrap();

        assert_eq!(backend.sent().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(2200));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_four_attempts() {
        let (backend, dispatcher) = setup();
        for _ in 0..5 {
            backend.fail_command(samst_api::Error::RateLimited {
                retry_after: None,
                message: String::new(),
            });
        }

        let err = dispatcher
            .send(&CommandRequest::new("switch", "on"))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(backend.sent().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let (backend, dispatcher) = setup();
        backend.fail_command(samst_api::Error::Rejected {
            status: 422,
            message: "bad".into(),
        });

        let err = dispatcher
            .send(&CommandRequest::new("switch", "on"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Rejected { .. }));
        assert_eq!(backend.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_serialized_in_order() {
        let (backend, dispatcher) = setup();
        let dispatcher = Arc::new(dispatcher);
        // The first command sits in its retry schedule while the others queue.
        backend.fail_command(conflict());

        let mut handles = Vec::new();
        for level in 0..3 {
            let d = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                d.send(&CommandRequest::new("audioVolume", "setVolume").with_arguments(vec![json!(level)]))
                    .await
            }));
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let args: Vec<_> = backend
            .sent()
            .into_iter()
            .map(|c| c.arguments.unwrap()[0].clone())
            .collect();
        assert_eq!(args, [json!(0), json!(0), json!(1), json!(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_query_reads_back_payload() {
        let (backend, dispatcher) = setup();
        let mut resources = HashMap::new();
        resources.insert(
            execute::WOOFER.to_owned(),
            json!({ "x.com.samsung.networkaudio.woofer": 2 })
                .as_object()
                .cloned()
                .unwrap(),
        );
        backend.on_command(execute_emulator(resources, &[]));

        let payload = dispatcher.execute_query(execute::WOOFER).await.unwrap();
        assert_eq!(payload.get("x.com.samsung.networkaudio.woofer"), Some(&json!(2)));
        assert_eq!(backend.status_calls(), 1);

        let empty = dispatcher.execute_query(execute::EQ).await.unwrap();
        assert!(empty.is_empty());
    }
}
