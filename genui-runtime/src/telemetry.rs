//! Generation telemetry: per-trace timings published on a broadcast channel.
//! One service per session owner; nothing here is global.

use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

pub mod names {
    pub const TTFT: &str = "TTFT";
    pub const LATENCY: &str = "LATENCY";
    pub const SIZE: &str = "SIZE";
    pub const TOKENS: &str = "TOKENS";

    pub const ERROR: &str = "ERROR";
    pub const HALLUCINATION: &str = "HALLUCINATION";
    pub const STREAM_START: &str = "STREAM_START";
    pub const STREAM_COMPLETE: &str = "STREAM_COMPLETE";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Metric,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub name: String,
    pub value: Value,
}

pub struct Telemetry {
    traces: DashMap<String, Instant>,
    sender: broadcast::Sender<TelemetryEvent>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            traces: DashMap::new(),
            sender,
        }
    }

    /// Open a trace and announce `STREAM_START` with `action` as its value.
    pub fn start_trace(&self, action: &str) -> String {
        let trace_id = format!("trace_{}", Uuid::new_v4().simple());
        self.traces.insert(trace_id.clone(), Instant::now());
        tracing::debug!(trace_id = %trace_id, action, "trace started");
        self.publish(&trace_id, EventKind::Event, names::STREAM_START, Value::from(action));
        trace_id
    }

    /// Milliseconds since the trace started, if it is still open.
    pub fn elapsed_ms(&self, trace_id: &str) -> Option<f64> {
        self.traces
            .get(trace_id)
            .map(|start| start.elapsed().as_secs_f64() * 1000.0)
    }

    pub fn log_metric(&self, trace_id: &str, name: &str, value: f64) {
        tracing::debug!(trace_id, metric = name, value, "metric");
        self.publish(trace_id, EventKind::Metric, name, Value::from(value));
    }

    pub fn log_event(&self, trace_id: &str, name: &str, details: Value) {
        if name == names::ERROR || name == names::HALLUCINATION {
            tracing::warn!(trace_id, event = name, %details, "telemetry event");
        } else {
            tracing::debug!(trace_id, event = name, %details, "telemetry event");
        }
        self.publish(trace_id, EventKind::Event, name, details);
    }

    /// Close a trace, emitting `LATENCY` and `STREAM_COMPLETE`. No-op for unknown ids.
    pub fn end_trace(&self, trace_id: &str) -> Option<f64> {
        let (_, start) = self.traces.remove(trace_id)?;
        let duration = start.elapsed().as_secs_f64() * 1000.0;
        self.log_metric(trace_id, names::LATENCY, duration);
        self.publish(trace_id, EventKind::Event, names::STREAM_COMPLETE, Value::from(duration));
        Some(duration)
    }

    pub fn active_traces(&self) -> usize {
        self.traces.len()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: Some(self.sender.subscribe()),
        }
    }

    fn publish(&self, trace_id: &str, kind: EventKind, name: &str, value: Value) {
        // No subscribers is fine.
        let _ = self.sender.send(TelemetryEvent {
            trace_id: trace_id.to_string(),
            timestamp: Utc::now(),
            kind,
            name: name.to_string(),
            value,
        });
    }
}

/// Live feed of telemetry events. Dropping it unsubscribes.
pub struct Subscription {
    receiver: Option<broadcast::Receiver<TelemetryEvent>>,
}

impl Subscription {
    /// Next event, skipping over any the subscriber lagged behind on.
    /// `None` once unsubscribed or the service is gone.
    pub async fn recv(&mut self) -> Option<TelemetryEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "telemetry subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<TelemetryEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain everything delivered so far.
    pub fn drain(&mut self) -> Vec<TelemetryEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn unsubscribe(&mut self) {
        self.receiver = None;
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

/// Running dashboard figures folded from the event feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub ttft: f64,
    pub latency: f64,
    pub active: bool,
    pub hallucinations: u64,
}

impl Metrics {
    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event.name.as_str() {
            names::STREAM_START => {
                self.active = true;
                self.latency = 0.0;
                self.ttft = 0.0;
            }
            names::STREAM_COMPLETE => {
                self.active = false;
                self.latency = event.value.as_f64().unwrap_or(self.latency);
            }
            names::TTFT => self.ttft = event.value.as_f64().unwrap_or(self.ttft),
            names::HALLUCINATION => self.hallucinations += 1,
            _ => {}
        }
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a TelemetryEvent>) -> Self {
        events.into_iter().fold(Metrics::default(), |mut metrics, event| {
            metrics.apply(event);
            metrics
        })
    }
}
