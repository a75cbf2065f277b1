//! Per-user rate limiter
//!
//! Counts hits per key over a fixed window anchored at the key's first
//! hit. Rules use the `"count/period"` shape the configuration carries,
//! e.g. `"3000/day"` for the download quota.

use crate::error::{ArcError, ArcResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

const SECONDS_PER_DAY: i64 = 24 * 3600;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: i64,
    count: u32,
}

/// Fixed-window limiter keyed by an arbitrary string (user id here)
#[derive(Debug)]
pub struct ArcLimiter {
    name: String,
    limit: u32,
    window_secs: i64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl ArcLimiter {
    /// Parse a `"count/period"` rule, where period is one of `second`,
    /// `minute`, `hour`, `day`.
    pub fn new(rule: &str, name: &str) -> ArcResult<Self> {
        let (count, period) = rule
            .split_once('/')
            .ok_or_else(|| ArcError::input(format!("Invalid rate limit rule: `{rule}`")))?;
        let limit: u32 = count
            .trim()
            .parse()
            .map_err(|_| ArcError::input(format!("Invalid rate limit rule: `{rule}`")))?;
        let window_secs = match period.trim() {
            "second" => 1,
            "minute" => 60,
            "hour" => 3600,
            "day" => SECONDS_PER_DAY,
            _ => return Err(ArcError::input(format!("Invalid rate limit rule: `{rule}`"))),
        };
        Ok(Self {
            name: name.to_string(),
            limit,
            window_secs,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    /// Daily limiter, the shape the download quota uses
    pub fn per_day(limit: u32, name: &str) -> Self {
        Self {
            name: name.to_string(),
            limit,
            window_secs: SECONDS_PER_DAY,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Does `key` still have quota? Does not consume.
    pub fn test(&self, key: &str) -> bool {
        self.test_at(key, Utc::now().timestamp())
    }

    /// Consume one unit for `key`; returns whether it was granted.
    pub fn hit(&self, key: &str) -> bool {
        self.hit_at(key, Utc::now().timestamp())
    }

    fn test_at(&self, key: &str, now: i64) -> bool {
        let buckets = self.buckets.lock().unwrap();
        match buckets.get(key) {
            Some(bucket) if now - bucket.window_start < self.window_secs => {
                bucket.count < self.limit
            }
            _ => self.limit > 0,
        }
    }

    fn hit_at(&self, key: &str, now: i64) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });
        if now - bucket.window_start >= self.window_secs {
            bucket.window_start = now;
            bucket.count = 0;
        }
        if bucket.count >= self.limit {
            return false;
        }
        bucket.count += 1;
        true
    }
}
