//! Command handler for the RESP server

use std::sync::Arc;

use meshcache::{Group, Registry};
use serde::Serialize;

use crate::resp::Frame;

/// Snapshot returned by `STATS <group>`
#[derive(Debug, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub cache_items: usize,
    pub cache_bytes: usize,
    pub cache_capacity: usize,
    pub cache_evictions: u64,
    pub gets: u64,
    pub hits: u64,
    pub hit_ratio: f64,
    pub loads: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
}

impl GroupReport {
    pub fn of(group: &Group) -> Self {
        let stats = group.stats();
        Self {
            name: group.name().to_string(),
            cache_items: group.cache_len(),
            cache_bytes: group.cache_bytes(),
            cache_capacity: group.capacity_bytes(),
            cache_evictions: group.cache_evictions(),
            gets: stats.gets(),
            hits: stats.hits(),
            hit_ratio: stats.hit_ratio(),
            loads: stats.loads(),
            peer_loads: stats.peer_loads(),
            peer_errors: stats.peer_errors(),
            local_loads: stats.local_loads(),
            local_load_errors: stats.local_load_errors(),
        }
    }
}

/// Dispatches decoded commands against the group registry
///
/// `GET` may block on a load, so `handle` must run on the blocking pool.
#[derive(Clone)]
pub struct CommandHandler {
    registry: Arc<Registry>,
}

impl CommandHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn handle(&self, cmd: Frame) -> Frame {
        let args = match cmd {
            Frame::Array(args) if !args.is_empty() => args,
            _ => return Frame::err("invalid command format"),
        };

        let mut words = Vec::with_capacity(args.len());
        for arg in &args {
            match arg {
                Frame::Bulk(bytes) => match std::str::from_utf8(bytes) {
                    Ok(word) => words.push(word),
                    Err(_) => return Frame::err("arguments must be UTF-8"),
                },
                _ => return Frame::err("arguments must be bulk strings"),
            }
        }

        let command = words[0].to_uppercase();
        match (command.as_str(), &words[1..]) {
            ("PING", []) => Frame::Simple("PONG".to_string()),
            ("PING", [msg]) => Frame::bulk(msg.as_bytes()),
            ("GET", [group, key]) => self.handle_get(group, key),
            ("STATS", [group]) => self.handle_stats(group),
            ("COMMAND", _) => Frame::Array(Vec::new()),
            ("PING" | "GET" | "STATS", _) => Frame::err(format!(
                "wrong number of arguments for '{}' command",
                command.to_lowercase()
            )),
            _ => Frame::err(format!("unknown command '{}'", words[0])),
        }
    }

    fn handle_get(&self, group: &str, key: &str) -> Frame {
        let Some(group) = self.registry.get_group(group) else {
            return Frame::err(format!("no such group '{}'", group));
        };

        match group.get(key) {
            Ok(value) => Frame::Bulk(value.byte_slice()),
            Err(e) => Frame::err(e),
        }
    }

    fn handle_stats(&self, group: &str) -> Frame {
        let Some(group) = self.registry.get_group(group) else {
            return Frame::err(format!("no such group '{}'", group));
        };

        match serde_json::to_vec(&GroupReport::of(&group)) {
            Ok(json) => Frame::Bulk(json),
            Err(e) => Frame::err(e),
        }
    }
}
