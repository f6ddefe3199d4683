use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct CacheEntry {
    pub namespace: String,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    inserted: Instant,
    pub ttl: Duration,
    hit_count: AtomicU64,
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(namespace: &str, key: &str, value: Value, ttl: Duration) -> Self {
        let size_bytes = key.len() + serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
            created_at: Utc::now(),
            inserted: Instant::now(),
            ttl,
            hit_count: AtomicU64::new(0),
            size_bytes,
        }
    }

    /// Stale once strictly past `created_at + ttl`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn age(&self) -> Duration {
        self.inserted.elapsed()
    }

    pub fn record_hit(&self) -> u64 {
        self.hit_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            namespace: self.namespace.clone(),
            key: self.key.clone(),
            created_at: self.created_at,
            age_ms: self.age().as_millis() as u64,
            ttl_ms: self.ttl.as_millis() as u64,
            hit_count: self.hit_count(),
            size_bytes: self.size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub namespace: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub age_ms: u64,
    pub ttl_ms: u64,
    pub hit_count: u64,
    pub size_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expiry_boundary() {
        let entry = CacheEntry::new("workload", "all", json!({"agent001": 2}), Duration::from_secs(5));
        let start = entry.inserted;
        assert!(!entry.is_expired_at(start));
        assert!(!entry.is_expired_at(start + Duration::from_secs(5)));
        assert!(entry.is_expired_at(start + Duration::from_secs(5) + Duration::from_nanos(1)));
    }

    #[test]
    fn test_hits_and_size() {
        let entry = CacheEntry::new("capabilities", "ai", json!(["ml-engineer"]), Duration::from_secs(60));
        assert_eq!(entry.size_bytes, "ai".len() + r#"["ml-engineer"]"#.len());
        assert_eq!(entry.record_hit(), 1);
        assert_eq!(entry.record_hit(), 2);
        assert_eq!(entry.info().hit_count, 2);
    }
}
