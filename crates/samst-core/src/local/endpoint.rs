// ── Multi-port LAN endpoint client ──
//
// Wraps a `LocalTransport` with port discovery, per-operation retries and
// a per-device memory of operations the firmware does not implement.

use std::collections::HashSet;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use samst_api::{LocalConnection, LocalTransport};

use crate::config::EndpointConfig;
use crate::error::CoreError;
use crate::retry::{ErrorClass, RetryPolicy, classify_local};

/// Port and capability knowledge learned at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointState {
    /// Last port that answered successfully.
    pub active_port: Option<u16>,
    /// Operations proven unsupported. Only grows.
    pub unsupported: HashSet<String>,
}

/// Ports to try, in order, without duplicates.
///
/// Last known-good port first, then the configured one. Alternates come
/// after those; they are the whole search space until a port is confirmed
/// and a fallback afterwards.
pub fn candidate_ports(active: Option<u16>, config: &EndpointConfig) -> Vec<u16> {
    let mut ports = Vec::new();
    let mut push = |port: u16| {
        if !ports.contains(&port) {
            ports.push(port);
        }
    };
    if let Some(port) = active {
        push(port);
    }
    push(config.port);
    for port in &config.alternates {
        push(*port);
    }
    ports
}

pub struct LocalEndpointClient<T: LocalTransport> {
    transport: T,
    config: EndpointConfig,
    state: Mutex<EndpointState>,
    // One LAN call at a time per device.
    gate: Mutex<()>,
}

impl<T: LocalTransport> LocalEndpointClient<T> {
    pub fn new(transport: T, config: EndpointConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(EndpointState::default()),
            gate: Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub async fn state(&self) -> EndpointState {
        self.state.lock().await.clone()
    }

    pub async fn active_port(&self) -> Option<u16> {
        self.state.lock().await.active_port
    }

    pub async fn is_unsupported(&self, operation: &str) -> bool {
        self.state.lock().await.unsupported.contains(operation)
    }

    /// Record `operation` as unsupported for the rest of the process.
    pub async fn mark_unsupported(&self, operation: &str) {
        let inserted = self.state.lock().await.unsupported.insert(operation.to_owned());
        if inserted {
            info!(operation, "marking operation unsupported");
        }
    }

    /// Invoke `operation`, walking candidate ports until one answers.
    ///
    /// Connection-class failures move on (after the per-operation retries);
    /// a logical refusal or a known-unsupported code stops immediately.
    pub async fn call(&self, operation: &str, params: Value) -> Result<Value, CoreError> {
        let _gate = self.gate.lock().await;

        let active = {
            let state = self.state.lock().await;
            if state.unsupported.contains(operation) {
                return Err(CoreError::Unsupported {
                    operation: operation.to_owned(),
                });
            }
            state.active_port
        };

        let policy = RetryPolicy::fixed(self.config.attempts_for(operation), self.config.retry_pause);
        let mut last_error = None;
        for port in candidate_ports(active, &self.config) {
            let result = policy
                .run(
                    |attempt| {
                        debug!(operation, port, attempt, "local call");
                        self.call_once(port, operation, params.clone())
                    },
                    |e| classify_local(operation, e),
                )
                .await;

            match result {
                Ok(value) => {
                    let mut state = self.state.lock().await;
                    if state.active_port != Some(port) {
                        info!(port, "local endpoint port confirmed");
                        state.active_port = Some(port);
                    }
                    return Ok(value);
                }
                Err(failure) => match failure.class {
                    ErrorClass::Unsupported => {
                        self.mark_unsupported(operation).await;
                        return Err(CoreError::Unsupported {
                            operation: operation.to_owned(),
                        });
                    }
                    ErrorClass::Fatal => return Err(failure.error.into()),
                    ErrorClass::Transient => {
                        debug!(operation, port, error = %failure.error, "port unreachable, trying next");
                        last_error = Some(failure.error);
                    }
                },
            }
        }

        Err(last_error.map_or_else(
            || CoreError::ConnectionFailed {
                reason: "no candidate ports".into(),
            },
            CoreError::from,
        ))
    }

    async fn call_once(&self, port: u16, operation: &str, params: Value) -> Result<Value, samst_api::Error> {
        let mut conn = self.transport.connect(port).await?;
        let result = conn.invoke(operation, params).await;
        conn.close().await;
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use samst_api::Error as ApiError;

    use super::*;

    type Reply = Result<Value, ApiError>;
    type Responder = Box<dyn FnMut(&str, &Value) -> Reply + Send>;

    /// Scripted transport. Ports listed in `down` refuse connections;
    /// replies for an operation are popped from its queue, then the
    /// responder answers.
    #[derive(Clone)]
    pub(crate) struct FakeTransport {
        pub down: Arc<StdMutex<HashSet<u16>>>,
        pub scripted: Arc<StdMutex<HashMap<String, VecDeque<Reply>>>>,
        pub calls: Arc<StdMutex<Vec<(u16, String, Value)>>>,
        pub connects: Arc<StdMutex<usize>>,
        pub closes: Arc<StdMutex<usize>>,
        responder: Arc<StdMutex<Responder>>,
    }

    impl FakeTransport {
        pub(crate) fn new(responder: impl FnMut(&str, &Value) -> Reply + Send + 'static) -> Self {
            Self {
                down: Arc::default(),
                scripted: Arc::default(),
                calls: Arc::default(),
                connects: Arc::default(),
                closes: Arc::default(),
                responder: Arc::new(StdMutex::new(Box::new(responder))),
            }
        }

        pub(crate) fn script(&self, operation: &str, reply: Reply) {
            self.scripted
                .lock()
                .unwrap()
                .entry(operation.to_owned())
                .or_default()
                .push_back(reply);
        }

        pub(crate) fn calls_to(&self, operation: &str) -> Vec<(u16, Value)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, op, _)| op == operation)
                .map(|(port, _, params)| (*port, params.clone()))
                .collect()
        }
    }

    pub(crate) struct FakeConnection {
        port: u16,
        transport: FakeTransport,
    }

    #[async_trait]
    impl LocalTransport for FakeTransport {
        type Connection = FakeConnection;

        async fn connect(&self, port: u16) -> Result<FakeConnection, ApiError> {
            *self.connects.lock().unwrap() += 1;
            if self.down.lock().unwrap().contains(&port) {
                return Err(ApiError::WebSocketConnect(format!("connection refused on {port}")));
            }
            Ok(FakeConnection {
                port,
                transport: self.clone(),
            })
        }
    }

    #[async_trait]
    impl LocalConnection for FakeConnection {
        async fn invoke(&mut self, method: &str, params: Value) -> Result<Value, ApiError> {
            let t = &self.transport;
            t.calls
                .lock()
                .unwrap()
                .push((self.port, method.to_owned(), params.clone()));
            let scripted = t
                .scripted
                .lock()
                .unwrap()
                .get_mut(method)
                .and_then(VecDeque::pop_front);
            if let Some(reply) = scripted {
                return reply;
            }
            let mut responder = t.responder.lock().unwrap();
            (*responder)(method, &params)
        }

        async fn close(&mut self) {
            *self.transport.closes.lock().unwrap() += 1;
        }
    }

    pub(crate) fn rpc(method: &str, code: Option<i64>, message: &str) -> ApiError {
        ApiError::Rpc {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    fn frame_client(transport: FakeTransport) -> LocalEndpointClient<FakeTransport> {
        LocalEndpointClient::new(transport, EndpointConfig::frame(8002))
    }

    #[test]
    fn candidate_port_order() {
        let cfg = EndpointConfig::frame(9000);
        assert_eq!(candidate_ports(None, &cfg), [9000, 8002, 8001]);
        assert_eq!(candidate_ports(Some(8001), &cfg), [8001, 9000, 8002]);
        assert_eq!(candidate_ports(Some(8002), &EndpointConfig::frame(8002)), [8002, 8001]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_alternate_port_and_remembers_it() {
        let transport = FakeTransport::new(|_, _| Ok(json!({ "version": "4.3.4.0" })));
        transport.down.lock().unwrap().insert(8002);
        let client = frame_client(transport.clone());

        client.call("get_api_version", Value::Null).await.unwrap();
        assert_eq!(client.active_port().await, Some(8001));

        client.call("get_api_version", Value::Null).await.unwrap();
        let ports: Vec<u16> = transport.calls_to("get_api_version").into_iter().map(|(p, _)| p).collect();
        assert_eq!(ports, [8001, 8001]);
    }

    #[tokio::test(start_paused = true)]
    async fn minus_one_marks_operation_unsupported() {
        let transport = FakeTransport::new(|_, _| Ok(json!({})));
        transport.script(
            "set_motion_timer",
            Err(rpc("set_motion_timer", Some(-1), "failed with error number -1")),
        );
        let client = frame_client(transport.clone());

        let err = client.call("set_motion_timer", json!({ "value": "5" })).await.unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
        assert!(client.is_unsupported("set_motion_timer").await);

        // Fails fast without touching the network.
        let connects = *transport.connects.lock().unwrap();
        assert!(client.call("set_motion_timer", json!({ "value": "5" })).await.is_err());
        assert_eq!(*transport.connects.lock().unwrap(), connects);
    }

    #[tokio::test(start_paused = true)]
    async fn logical_error_does_not_try_other_ports() {
        let transport = FakeTransport::new(|_, _| Ok(json!({})));
        transport.script("select_image", Err(rpc("select_image", Some(-7), "error number -7")));
        let client = frame_client(transport.clone());

        let err = client.call("select_image", json!({ "content_id": "MY_F0001" })).await.unwrap_err();
        assert_eq!(err.error_number(), Some(-7));
        assert_eq!(transport.calls_to("select_image").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retried_operations_get_two_attempts_per_port() {
        let transport = FakeTransport::new(|_, _| Ok(json!({})));
        for _ in 0..4 {
            transport.script("set_artmode", Err(ApiError::Timeout { timeout_secs: 10 }));
        }
        let client = frame_client(transport.clone());

        let started = tokio::time::Instant::now();
        let err = client.call("set_artmode", json!({ "value": "on" })).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));

        let ports: Vec<u16> = transport.calls_to("set_artmode").into_iter().map(|(p, _)| p).collect();
        assert_eq!(ports, [8002, 8002, 8001, 8001]);
        assert_eq!(started.elapsed(), Duration::from_millis(700));
        assert_eq!(client.active_port().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_is_closed_on_every_path() {
        let transport = FakeTransport::new(|_, _| Ok(json!({})));
        transport.script("get_brightness", Err(rpc("get_brightness", Some(-3), "error number -3")));
        let client = frame_client(transport.clone());

        let _ = client.call("get_brightness", Value::Null).await;
        client.call("get_brightness", Value::Null).await.unwrap();
        assert_eq!(*transport.closes.lock().unwrap(), 2);
    }
}
