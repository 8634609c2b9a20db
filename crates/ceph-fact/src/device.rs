//! Device health collection: the device list with the newest health-metrics
//! sample of every device attached.

use crate::catalog::{run_command, Limits};
use crate::error::QueryError;
use crate::session::{MonCommand, Session};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Newest sample of a `device get-health-metrics` answer. Samples are keyed
/// by timestamp strings, which sort chronologically.
pub fn latest_sample(metrics: &Value) -> Map<String, Value> {
    let mut latest = Map::new();
    if let Some((stamp, sample)) = metrics.as_object().and_then(|m| m.iter().next_back()) {
        latest.insert(stamp.clone(), sample.clone());
    }
    latest
}

/// Lists devices and attaches their latest health metrics.
///
/// Every command gets `limits.command_timeout` to itself and up to
/// `limits.in_flight` metric reads run at once. A device whose metrics cannot
/// be read keeps an empty `metrics` object; only a failing `device ls` fails
/// the whole collection.
pub async fn collect(session: &Session, limits: &Limits) -> Result<Value, QueryError> {
    let timeout = limits.command_timeout;
    let listing = run_command(session, &MonCommand::new("device ls"), timeout).await?;
    let devices = match listing {
        Value::Array(devices) => devices,
        _ => {
            return Err(QueryError::MalformedResponse {
                reason: "device ls did not return a list".to_string(),
            })
        }
    };

    let mut devices: Vec<Value> = stream::iter(devices)
        .map(move |device| async move { attach_metrics(session, device, timeout).await })
        .buffered(limits.in_flight.max(1))
        .collect()
        .await;

    devices.sort_by(|a, b| {
        let key = |v: &Value| v.get("devid").and_then(Value::as_str).unwrap_or("").to_string();
        key(a).cmp(&key(b))
    });
    Ok(Value::Array(devices))
}

async fn attach_metrics(session: &Session, mut device: Value, timeout: Duration) -> Value {
    let devid = match device.get("devid").and_then(Value::as_str) {
        Some(devid) => devid.to_string(),
        None => return device,
    };
    let cmd = MonCommand::new("device get-health-metrics").arg("devid", &devid);
    let metrics = match run_command(session, &cmd, timeout).await {
        Ok(metrics) => latest_sample(&metrics),
        Err(e) => {
            debug!("No health metrics for device {}: {}", devid, e);
            Map::new()
        }
    };
    if let Some(fields) = device.as_object_mut() {
        fields.insert("metrics".to_string(), Value::Object(metrics));
    }
    device
}
