//! 按来源限速
//!
//! SYN 防护与 DNS 请求限速共用的计数器：每个来源地址记录一个窗口内
//! 的计数和最近一次出现时间。服务器用 [`RateLimiter::sweep`] 按 60 秒
//! TTL 清理；路由器与 DNS 用 [`RateLimiter::reset`] 每秒整体清零。

use crate::net::Addr;
use crate::sim::SimTime;
use std::collections::HashMap;

/// 记录保留时长：60 秒未再出现的来源被清理。
pub const RECORD_TTL: SimTime = SimTime(60_000_000_000);
/// 清扫/清零周期：1 秒。
pub const SWEEP_INTERVAL: SimTime = SimTime(1_000_000_000);

#[derive(Debug, Clone, Copy)]
struct SourceRecord {
    count: u32,
    last_seen: SimTime,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: f64,
    counts: HashMap<Addr, SourceRecord>,
}

impl RateLimiter {
    pub fn new(limit: f64) -> RateLimiter {
        RateLimiter {
            limit,
            counts: HashMap::new(),
        }
    }

    /// 登记一次出现；窗口内超限时返回 `false`（调用方应静默丢弃）。
    pub fn register(&mut self, src: Addr, now: SimTime) -> bool {
        let rec = self.counts.entry(src).or_insert(SourceRecord {
            count: 0,
            last_seen: now,
        });
        rec.count += 1;
        rec.last_seen = now;
        (rec.count as f64) <= self.limit
    }

    /// 清理 60 秒没有出现过的来源。
    pub fn sweep(&mut self, now: SimTime) {
        self.counts
            .retain(|_, rec| now.since(rec.last_seen) <= RECORD_TTL);
    }

    /// 整体清零（1 秒窗口限速用）。
    pub fn reset(&mut self) {
        self.counts.clear();
    }

    /// 当前追踪的来源数量。
    pub fn tracked_sources(&self) -> usize {
        self.counts.len()
    }
}
