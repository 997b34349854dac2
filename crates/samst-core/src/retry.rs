// ── Retry policy ──
//
// One retry loop shared by the cloud command dispatcher and the local
// endpoint client. Callers supply a classifier that sorts each error into
// transient (retry), unsupported (stop, remember) or fatal (stop).

use std::future::Future;
use std::time::Duration;

use strum::Display;
use tracing::debug;

/// Three-way outcome of classifying a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorClass {
    /// Network trouble or backend pressure; the same call may succeed later.
    Transient,
    /// The device will never accept this operation.
    Unsupported,
    /// Anything else; retrying would not help.
    Fatal,
}

/// A call that failed after the policy gave up.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub class: ErrorClass,
    pub attempts: usize,
}

/// Delay schedule: one entry per attempt, slept before that attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            return Self::once();
        }
        Self { delays }
    }

    /// A single attempt, no retry.
    pub fn once() -> Self {
        Self {
            delays: vec![Duration::ZERO],
        }
    }

    /// Schedule for cloud commands: `0, 600ms, 1.6s, 3.0s`.
    pub fn cloud_commands() -> Self {
        Self {
            delays: vec![
                Duration::ZERO,
                Duration::from_millis(600),
                Duration::from_millis(1600),
                Duration::from_millis(3000),
            ],
        }
    }

    /// `attempts` tries with `pause` between consecutive ones.
    pub fn fixed(attempts: u32, pause: Duration) -> Self {
        let delays = (0..attempts.max(1))
            .map(|i| if i == 0 { Duration::ZERO } else { pause })
            .collect();
        Self { delays }
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Run `op` until it succeeds, fails non-transiently, or the schedule
    /// runs out. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, C>(&self, mut op: F, classify: C) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: std::fmt::Display,
    {
        let total = self.delays.len();
        let mut attempt = 0;
        loop {
            let delay = self.delays.get(attempt).copied().unwrap_or_default();
            attempt += 1;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let class = classify(&error);
                    if class != ErrorClass::Transient || attempt >= total {
                        return Err(RetryFailure {
                            error,
                            class,
                            attempts: attempt,
                        });
                    }
                    debug!(attempt, total, error = %error, "transient failure, retrying");
                }
            }
        }
    }
}

// ── Classifiers ──────────────────────────────────────────────────────

/// Cloud commands retry on conflict, rate limiting, 5xx unavailability,
/// timeouts and dropped or refused connections.
pub fn classify_cloud(err: &samst_api::Error) -> ErrorClass {
    if err.is_retryable_status() || err.is_connection_failure() {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

/// Frame operations that answer `error number -1` when the model lacks them.
pub const UNSUPPORTED_ON_MINUS_ONE: &[&str] = &[
    "set_motion_sensitivity",
    "set_motion_timer",
    "set_brightness_sensor_setting",
];

/// Message fragments that mark an uncoded local error as a logical refusal.
const LOGICAL_REJECTION_MARKERS: &[&str] = &[
    "invalid",
    "not supported",
    "unsupported",
    "not allowed",
    "missing",
    "bad request",
];

/// Classify a LAN call failure for `method`.
///
/// Coded device refusals are fatal unless they are the known unsupported
/// code for this operation. Without a code, anything that does not read as
/// a clear logical rejection counts as connection trouble.
pub fn classify_local(method: &str, err: &samst_api::Error) -> ErrorClass {
    use samst_api::Error as ApiError;

    let code = err.error_number();
    if code == Some(-1) && UNSUPPORTED_ON_MINUS_ONE.contains(&method) {
        return ErrorClass::Unsupported;
    }
    if err.is_connection_failure() {
        return ErrorClass::Transient;
    }
    match err {
        ApiError::Authentication { .. }
        | ApiError::Forbidden { .. }
        | ApiError::InvalidUrl(_)
        | ApiError::Deserialization { .. } => ErrorClass::Fatal,
        _ if code.is_some() => ErrorClass::Fatal,
        ApiError::Rpc { message, .. } => {
            let lower = message.to_lowercase();
            if LOGICAL_REJECTION_MARKERS.iter().any(|m| lower.contains(m)) {
                ErrorClass::Fatal
            } else {
                ErrorClass::Transient
            }
        }
        _ => ErrorClass::Transient,
    }
}
