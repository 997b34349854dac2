// ── Runtime configuration ──
//
// These types describe how the reliability layer talks to SmartThings and
// to LAN devices, and how aggressively it polls. They carry credential data
// and tuning, but never touch disk. The CLI builds a `HubConfig` from the
// on-disk profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;

/// Minimum delay between two polls of the same device.
pub const POLL_FLOOR: Duration = Duration::from_secs(5);

/// Poll interval used when the user configures nothing.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(15);

/// Backoff applied on a rate limit that carries no suggested delay.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(10);

/// Shortest discovery period accepted.
pub const DISCOVERY_FLOOR: Duration = Duration::from_secs(60);

/// Top-level configuration for a [`Hub`](crate::Hub).
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// SmartThings personal access or OAuth token.
    pub token: SecretString,
    /// API root, normally `https://api.smartthings.com/v1`.
    pub api_base: String,
    /// HTTP timeout for cloud calls.
    pub timeout: Duration,
    pub poll: PollConfig,
    pub probe: ProbeConfig,
    /// Keep devices whose manufacturer is not Samsung.
    pub include_non_samsung: bool,
    /// Period of the background discovery scan (clamped to >= 60s).
    pub discovery_interval: Duration,
    /// Delay before the first discovery scan.
    pub discovery_initial_delay: Duration,
    /// Fetch capability definitions at device setup.
    pub fetch_capability_defs: bool,
    /// Spawn poll loops and run the soundbar refresh hook. One-shot tools
    /// turn this off and drive refreshes themselves.
    pub background: bool,
}

impl HubConfig {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            api_base: samst_api::cloud::DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(30),
            poll: PollConfig::default(),
            probe: ProbeConfig::default(),
            include_non_samsung: false,
            discovery_interval: Duration::from_secs(300),
            discovery_initial_delay: Duration::from_secs(10),
            fetch_capability_defs: true,
            background: true,
        }
    }

    /// Discovery period after clamping to the floor.
    pub fn effective_discovery_interval(&self) -> Duration {
        self.discovery_interval.max(DISCOVERY_FLOOR)
    }
}

/// Polling coordinator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Configured interval; never used below [`POLL_FLOOR`].
    pub scan_interval: Duration,
    pub floor: Duration,
    /// Backoff used when a 429 carries no hint.
    pub default_rate_limit_delay: Duration,
    /// Minimum spacing of the soundbar execute-feature poll.
    pub execute_poll_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            floor: POLL_FLOOR,
            default_rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            execute_poll_interval: Duration::from_secs(300),
        }
    }
}

impl PollConfig {
    /// The interval a healthy device polls at.
    pub fn base_interval(&self) -> Duration {
        self.scan_interval.max(self.floor)
    }
}

/// Sound-mode prober tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// How long a completed validation stays fresh.
    pub ttl: Duration,
    /// Minimum spacing between two validation attempts.
    pub min_attempt_interval: Duration,
    /// Pause between setting a candidate and reading it back.
    pub settle_delay: Duration,
    /// Extra candidates supplied by the user, tried after the built-in list.
    pub soundmode_overrides: Vec<String>,
    /// Consecutive rate-limit errors that abort a run.
    pub max_consecutive_rate_limits: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6 * 60 * 60),
            min_attempt_interval: Duration::from_secs(180),
            settle_delay: Duration::from_secs(1),
            soundmode_overrides: Vec::new(),
            max_consecutive_rate_limits: 2,
        }
    }
}

/// LAN endpoint tuning shared by the Frame and soundbar facades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Port the user configured (or the protocol default).
    pub port: u16,
    /// Other ports the same protocol may listen on.
    pub alternates: Vec<u16>,
    /// Pause between two attempts on the same port.
    pub retry_pause: Duration,
    /// Per-operation attempt counts; unlisted operations get one.
    pub attempts: Vec<(String, u32)>,
}

impl EndpointConfig {
    /// Frame TV art channel: TLS on 8002, plain on 8001.
    pub fn frame(port: u16) -> Self {
        Self {
            port,
            alternates: vec![8002, 8001],
            retry_pause: Duration::from_millis(350),
            attempts: ["select_image", "set_artmode", "upload"]
                .into_iter()
                .map(|op| (op.to_owned(), 2))
                .collect(),
        }
    }

    /// Soundbar JSON-RPC: one fixed port.
    pub fn soundbar() -> Self {
        Self {
            port: samst_api::local::SOUNDBAR_PORT,
            alternates: Vec::new(),
            retry_pause: Duration::from_millis(350),
            attempts: Vec::new(),
        }
    }

    pub fn attempts_for(&self, operation: &str) -> u32 {
        self.attempts
            .iter()
            .find(|(op, _)| op == operation)
            .map_or(1, |(_, n)| (*n).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_interval_respects_floor() {
        let cfg = PollConfig {
            scan_interval: Duration::from_secs(1),
            ..PollConfig::default()
        };
        assert_eq!(cfg.base_interval(), POLL_FLOOR);
        assert_eq!(PollConfig::default().base_interval(), Duration::from_secs(15));
    }

    #[test]
    fn frame_attempt_table() {
        let cfg = EndpointConfig::frame(8002);
        assert_eq!(cfg.attempts_for("select_image"), 2);
        assert_eq!(cfg.attempts_for("set_artmode"), 2);
        assert_eq!(cfg.attempts_for("get_brightness"), 1);
    }

    #[test]
    fn discovery_interval_is_clamped() {
        let mut cfg = HubConfig::new(SecretString::from("t".to_owned()));
        cfg.discovery_interval = Duration::from_secs(5);
        assert_eq!(cfg.effective_discovery_interval(), DISCOVERY_FLOOR);
    }
}
