//! Stage timings
//!
//! Each pipeline stage runs under a [`Timer`]. Its duration is logged and
//! handed to a [`MetricSink`]. Delivery is best effort: a sink never fails
//! the build.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex_lite::Regex;

use crate::config::TelemetrySettings;

/// One measured stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Machine-readable stage id
    pub name: String,
    /// Unix seconds at the end of the stage
    pub timestamp: i64,
    pub duration_ms: u64,
}

/// Receives stage metrics
pub trait MetricSink {
    fn record(&self, metric: &Metric);
}

impl<S: MetricSink + ?Sized> MetricSink for &S {
    fn record(&self, metric: &Metric) {
        (**self).record(metric)
    }
}

/// Drops every metric
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MetricSink for NullSink {
    fn record(&self, _metric: &Metric) {}
}

/// OpenTSDB-style line protocol over TCP
#[derive(Debug, Clone)]
pub struct TsdSink {
    address: String,
    timeout: Duration,
    prefix: String,
    host_tag: String,
}

impl TsdSink {
    pub fn new(address: impl Into<String>, timeout: Duration, prefix: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout,
            prefix: prefix.into(),
            host_tag: sanitize_hostname(&local_hostname()),
        }
    }

    /// Sink for the configured endpoint, if any
    pub fn from_settings(settings: &TelemetrySettings) -> Option<Self> {
        let host = settings.host.as_deref().filter(|h| !h.is_empty())?;
        Some(Self::new(
            format!("{host}:{}", settings.port),
            Duration::from_secs(settings.timeout_seconds),
            settings.metric_prefix.clone(),
        ))
    }

    pub fn with_host_tag(mut self, host: &str) -> Self {
        self.host_tag = sanitize_hostname(host);
        self
    }

    pub fn line(&self, metric: &Metric) -> String {
        format!(
            "put {}.{} {} {} host={}\n",
            self.prefix, metric.name, metric.timestamp, metric.duration_ms, self.host_tag
        )
    }

    fn send(&self, line: &str) -> std::io::Result<()> {
        let addr = self
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(line.as_bytes())?;
        stream.flush()
    }
}

impl MetricSink for TsdSink {
    fn record(&self, metric: &Metric) {
        if let Err(e) = self.send(&self.line(metric)) {
            tracing::debug!(address = %self.address, error = %e, "failed to deliver metric");
        }
    }
}

/// Sink for the telemetry settings; [`NullSink`] when no host is set
pub fn sink_from_settings(settings: &TelemetrySettings) -> Box<dyn MetricSink> {
    match TsdSink::from_settings(settings) {
        Some(sink) => Box::new(sink),
        None => Box::new(NullSink),
    }
}

/// Replace characters a metric tag may not contain
pub fn sanitize_hostname(host: &str) -> String {
    match Regex::new(r"[^._a-zA-Z0-9]") {
        Ok(re) => re.replace_all(host, "_").into_owned(),
        Err(_) => host.to_string(),
    }
}

fn local_hostname() -> String {
    Command::new("hostname")
        .arg("-s")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Measures one stage
pub struct Timer<'a> {
    name: String,
    id: String,
    started: Instant,
    sink: &'a dyn MetricSink,
}

impl<'a> Timer<'a> {
    /// `name` is shown in the log, `id` names the metric
    pub fn start(name: impl Into<String>, id: impl Into<String>, sink: &'a dyn MetricSink) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            started: Instant::now(),
            sink,
        }
    }

    pub fn end(self) -> Metric {
        let elapsed = self.started.elapsed();
        tracing::info!("{} took {:.3}s", self.name, elapsed.as_secs_f64());

        let metric = Metric {
            name: self.id,
            timestamp: Utc::now().timestamp(),
            duration_ms: elapsed.as_millis() as u64,
        };
        self.sink.record(&metric);
        metric
    }
}
