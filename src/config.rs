use std::time::Duration;

/// Tunables for a `Selector` instance. Mirrors the handful of knobs
/// Kafka's `Selector` takes through its constructor overloads: idle expiry,
/// receive-size ceiling, buffer sizing, metrics tagging, and the
/// events-per-wait capacity. Construction-time only, per spec §6 — there is
/// no external config-file format to parse.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Idle time after which an established connection with no pending
    /// work is closed and reported via `disconnected()`.
    pub idle_timeout: Duration,

    /// Largest payload a `Receive` will accumulate before failing the
    /// connection with an `io-error`. `None` leaves frames unbounded
    /// (aside from `framing`'s own overflow guard against a corrupt
    /// length prefix).
    pub max_receive_size: Option<usize>,

    /// Socket-level send buffer size, applied via `setsockopt` on connect.
    /// `None` leaves the OS default in place.
    pub send_buffer_size: Option<usize>,

    /// Socket-level receive buffer size, applied the same way.
    pub recv_buffer_size: Option<usize>,

    /// Capacity of the reusable `epoll_wait` events buffer.
    pub max_events: usize,

    /// Prefix prepended to every metric name (spec §6 `metricGrpPrefix`).
    pub metric_group_prefix: String,

    /// Static tags attached to every metric this selector records (spec §6
    /// `metricTags`).
    pub metric_tags: Vec<(String, String)>,

    /// Whether per-connection sensors (request/response rate, byte rate)
    /// are registered alongside the aggregate ones (spec §6
    /// `metricsPerConnection`).
    pub metrics_per_connection: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            // Kafka's NetworkClient default: 9 minutes.
            idle_timeout: Duration::from_secs(9 * 60),
            max_receive_size: None,
            send_buffer_size: None,
            recv_buffer_size: None,
            max_events: 1024,
            metric_group_prefix: String::from("selector"),
            metric_tags: Vec::new(),
            metrics_per_connection: false,
        }
    }
}
