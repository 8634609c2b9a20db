//! Scripted in-process cluster shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ceph_fact::{ControlPlane, FactsConfig, MonCommand, QueryError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FSID: &str = "3f1b6a1e-5c2d-4e0b-9a55-1c0e2f7a9d10";

/// How the scripted cluster answers one command.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    Raw(String),
    Fail(QueryError),
    Hang,
    /// Answers after the given delay.
    Slow(Duration, Value),
}

/// A cluster that answers from a table keyed by the command words.
pub struct ScriptedCluster {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCluster {
    fn with(replies: Vec<(&str, Reply)>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|(words, reply)| (words.to_string(), reply))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Three monitors in quorum, two managers, three OSDs, HEALTH_OK.
    pub fn healthy() -> Self {
        Self::with(vec![
            ("fsid", Reply::Json(json!({ "fsid": FSID }))),
            ("status", Reply::Json(status("HEALTH_OK"))),
            (
                "versions",
                Reply::Json(json!({"overall": {"ceph version 18.2.2 reef (stable)": 8}})),
            ),
            ("features", Reply::Json(json!({"mon": [], "osd": [], "client": []}))),
            (
                "config dump",
                Reply::Json(json!([
                    {"section": "global", "name": "mon_host", "value": "10.0.0.1,10.0.0.2,10.0.0.3"},
                    {"section": "client.rgw", "name": "rgw_s3_secret_key", "value": "AKIAEXAMPLESECRET"},
                    {"section": "global", "name": "osd_pool_default_size", "value": "3"}
                ])),
            ),
            ("health", Reply::Json(json!({"status": "HEALTH_OK", "checks": {}, "mutes": []}))),
            (
                "health detail",
                Reply::Json(json!({"status": "HEALTH_OK", "checks": {}, "mutes": []})),
            ),
            (
                "df",
                Reply::Json(json!({
                    "stats": {"total_bytes": 3_221_225_472_000u64, "total_used_bytes": 42_949_672_960u64},
                    "pools": [{"name": "rbd", "id": 1}]
                })),
            ),
            ("mon stat", Reply::Json(json!({"epoch": 3, "min_mon_release_name": "reef"}))),
            ("mon dump", Reply::Json(json!({"epoch": 3, "mons": [{"rank": 0, "name": "a"}]}))),
            ("mon metadata", Reply::Json(json!([{"name": "a"}, {"name": "b"}, {"name": "c"}]))),
            (
                "mgr metadata",
                Reply::Json(json!([
                    {"name": "mgr-a", "hostname": "node1", "ceph_release": "reef"},
                    {"name": "mgr-b", "hostname": "node2", "ceph_release": "reef"}
                ])),
            ),
            (
                "mgr stat",
                Reply::Json(json!({"epoch": 40, "available": true, "active_name": "mgr-a", "num_standby": 1})),
            ),
            ("osd tree", Reply::Json(json!({"nodes": [], "stray": []}))),
            ("osd df", Reply::Json(json!({"nodes": [], "summary": {}}))),
            ("osd dump", Reply::Json(json!({"epoch": 120, "pools": []}))),
            ("osd stat", Reply::Json(json!({"epoch": 120, "num_osds": 3, "num_up_osds": 3, "num_in_osds": 3}))),
            (
                "osd metadata",
                Reply::Json(json!([{"id": 0, "hostname": "node1"}, {"id": 1, "hostname": "node2"}, {"id": 2, "hostname": "node3"}])),
            ),
            ("osd perf", Reply::Json(json!({"osdstats": {"osd_perf_infos": []}}))),
            ("pg stat", Reply::Json(json!({"num_pgs": 129, "num_pg_by_state": [{"name": "active+clean", "num": 129}]}))),
            ("pg dump summary", Reply::Json(json!({"pg_map": {"version": 881}}))),
            // Nothing stuck: the client prints "ok" on stderr and no JSON.
            ("pg dump_stuck", Reply::Raw(String::new())),
            ("mds metadata", Reply::Json(json!([]))),
            ("mds stat", Reply::Json(json!({"fsmap": {"epoch": 1, "filesystems": []}}))),
            ("fs dump", Reply::Json(json!({"epoch": 1, "filesystems": []}))),
            ("fs status", Reply::Json(json!({"clients": [], "mds_version": []}))),
            (
                "device ls",
                Reply::Json(json!([{"devid": "SAMSUNG_MZ7LH_S1"}, {"devid": "INTEL_SSDPE_P2"}])),
            ),
            (
                "device get-health-metrics SAMSUNG_MZ7LH_S1",
                Reply::Json(json!({
                    "20261001-000000": {"nvme_smart_health_information_add_log": {}},
                    "20261018-000000": {"temperature": {"current": 31}}
                })),
            ),
        ])
    }

    /// The probe itself fails, as when no monitor answers.
    pub fn unreachable() -> Self {
        Self::with(vec![(
            "fsid",
            Reply::Fail(QueryError::CommandFailed {
                code: 110,
                stderr: "[errno 110] RADOS timed out (error connecting to the cluster)".to_string(),
            }),
        )])
    }

    pub fn set(self, words: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(words.to_string(), reply);
        self
    }

    pub fn fail(self, words: &str, err: QueryError) -> Self {
        self.set(words, Reply::Fail(err))
    }

    pub fn hang(self, words: &str) -> Self {
        self.set(words, Reply::Hang)
    }

    /// `count` devices whose list and metrics each take `delay` to answer.
    pub fn with_slow_devices(self, count: usize, delay: Duration) -> Self {
        let devices: Vec<Value> = (0..count)
            .map(|i| json!({ "devid": format!("DISK_{:02}", i) }))
            .collect();
        let mut cluster = self.set("device ls", Reply::Slow(delay, Value::Array(devices)));
        for i in 0..count {
            cluster = cluster.set(
                &format!("device get-health-metrics DISK_{:02}", i),
                Reply::Slow(delay, json!({"20261018-000000": {"wear_level": i}})),
            );
        }
        cluster
    }

    pub fn into_plane(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlPlane for ScriptedCluster {
    async fn mon_command(&self, cmd: &MonCommand) -> Result<Vec<u8>, QueryError> {
        let words = cmd.to_string();
        self.calls.lock().unwrap().push(words.clone());
        let reply = self.replies.lock().unwrap().get(&words).cloned();

        match reply {
            Some(Reply::Json(value)) => Ok(serde_json::to_vec(&value).unwrap()),
            Some(Reply::Raw(text)) => Ok(text.into_bytes()),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Slow(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(serde_json::to_vec(&value).unwrap())
            }
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(QueryError::EmptyResponse)
            }
            None => Err(QueryError::Unsupported {
                reason: format!("unrecognized command: {}", words),
            }),
        }
    }
}

pub fn status(health: &str) -> Value {
    json!({
        "fsid": FSID,
        "health": {"status": health, "checks": {}, "mutes": []},
        "election_epoch": 12,
        "quorum": [0, 1, 2],
        "quorum_names": ["a", "b", "c"],
        "quorum_age": 86400
    })
}

/// Fast defaults for in-process runs.
pub fn test_config() -> FactsConfig {
    FactsConfig {
        timeout_secs: 2,
        ..FactsConfig::default()
    }
}
