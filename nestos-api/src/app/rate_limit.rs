use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 简单的滑动窗口限流器（基于内存，按 key 计数）。
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
    sweep_threshold: usize,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: Mutex::new(HashMap::new()),
            sweep_threshold: 1024,
        }
    }

    /// 窗口内记录数是否仍低于限额（不记录）
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let buckets = self.buckets.lock().await;
        buckets.get(key).map_or(true, |times| {
            times
                .iter()
                .filter(|t| now.duration_since(**t) < self.window)
                .count()
                < self.limit
        })
    }

    /// 记录一次（不检查限额）
    pub async fn record(&self, key: &str) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let entry = buckets.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        entry.push(now);
        // bucket 过多时全量清理过期记录
        if buckets.len() > self.sweep_threshold {
            buckets.retain(|_, times| {
                times.retain(|t| now.duration_since(*t) < self.window);
                !times.is_empty()
            });
        }
    }
}
