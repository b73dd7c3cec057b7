//! 轨迹日志
//!
//! 记录协议里程碑事件，序列化为 JSON 供 CLI 与集成测试消费。

use super::addr::Addr;
use crate::sim::SimTime;
use serde::{Deserialize, Serialize};

/// 轨迹事件类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceKind {
    SynSent { peer: u32 },
    SynAckSent { peer: u32 },
    TcpEstablished { peer: u32 },
    TcpClosed { peer: u32 },
    DnsResolved { answer: u32 },
    HttpCompleted { bytes: u64 },
    DbCompleted { bytes: u64 },
    ChainCompleted,
    SynRateDropped { src: u32 },
    RouteInstalled { dest: u32, gate: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub t_ns: u64,
    pub node: u32,
    #[serde(flatten)]
    pub kind: TraceKind,
}

/// 事件收集器。挂在 [`super::Network`] 上，未启用时记录为 no-op。
#[derive(Debug, Default)]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn record(&mut self, t: SimTime, node: Addr, kind: TraceKind) {
        self.events.push(TraceEvent {
            t_ns: t.0,
            node: node.0,
            kind,
        });
    }

    /// 统计某类事件的数量（测试用）。
    pub fn count(&self, pred: impl Fn(&TraceKind) -> bool) -> usize {
        self.events.iter().filter(|e| pred(&e.kind)).count()
    }
}
