use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Wraps the `metrics` crate's global recorder with the aggregate sensor
/// set a Kafka-style selector reports, tagged with a group prefix and a
/// fixed set of static tags the way `eriktaubeneck-raw-ipa`'s metrics
/// layer tags its counters.
#[derive(Debug, Clone)]
pub struct SelectorMetrics {
    prefix: String,
    tags: Vec<(String, String)>,
    per_connection: bool,
}

impl SelectorMetrics {
    pub fn new(prefix: impl Into<String>, tags: Vec<(String, String)>, per_connection: bool) -> SelectorMetrics {
        SelectorMetrics {
            prefix: prefix.into(),
            tags,
            per_connection,
        }
    }

    fn name(&self, sensor: &str) -> String {
        if self.prefix.is_empty() {
            sensor.to_owned()
        } else {
            format!("{}.{}", self.prefix, sensor)
        }
    }

    pub fn connection_created(&self) {
        counter!(self.name("connections-created"), &self.tags).increment(1);
    }

    pub fn connection_closed(&self) {
        counter!(self.name("connections-closed"), &self.tags).increment(1);
    }

    pub fn connection_count(&self, count: u64) {
        gauge!(self.name("connection-count"), &self.tags).set(count as f64);
    }

    /// One `select()`/`epoll_wait` call happened this poll, regardless of
    /// how many keys came back ready.
    pub fn select(&self) {
        counter!(self.name("select-rate"), &self.tags).increment(1);
    }

    pub fn io_wait_time(&self, wait: Duration) {
        histogram!(self.name("io-wait-time-ns-avg"), &self.tags).record(wait.as_nanos() as f64);
    }

    pub fn io_time(&self, elapsed: Duration) {
        histogram!(self.name("io-time-ns-avg"), &self.tags).record(elapsed.as_nanos() as f64);
    }

    pub fn request_sent(&self, id: &str, bytes: usize) {
        counter!(self.name("request-rate"), &self.tags).increment(1);
        counter!(self.name("outgoing-byte-rate"), &self.tags).increment(bytes as u64);
        histogram!(self.name("request-size-avg"), &self.tags).record(bytes as f64);
        histogram!(self.name("request-size-max"), &self.tags).record(bytes as f64);

        if self.per_connection {
            counter!(
                self.name("request-rate"),
                &self.with_connection_tag(id)
            )
            .increment(1);
        }
    }

    pub fn response_received(&self, id: &str, bytes: usize) {
        counter!(self.name("response-rate"), &self.tags).increment(1);
        counter!(self.name("incoming-byte-rate"), &self.tags).increment(bytes as u64);

        if self.per_connection {
            counter!(
                self.name("response-rate"),
                &self.with_connection_tag(id)
            )
            .increment(1);
        }
    }

    pub fn network_io(&self) {
        counter!(self.name("network-io-rate"), &self.tags).increment(1);
    }

    /// Builds the per-connection label set lazily: label-based metric
    /// recording is idempotent by nature, so there's no separate
    /// "first sighting" registration call to get wrong or skip.
    fn with_connection_tag(&self, id: &str) -> Vec<(String, String)> {
        let mut tags = self.tags.clone();
        tags.push(("connection-id".to_owned(), id.to_owned()));
        tags
    }
}
