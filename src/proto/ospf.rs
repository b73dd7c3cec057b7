//! 链路状态数据库与最短路计算
//!
//! 数据库按 (origin 路由器, link id) 记录每条链路的 TE 代价；时间戳
//! 按源端单调递增，旧通告被忽略。路由计算在代价加权的有向图上跑
//! Dijkstra，给出到每个路由器的首跳与总代价。

use crate::net::{Addr, LsaFields};
use crate::sim::SimTime;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// 一条链路的状态记录。
#[derive(Debug, Clone)]
pub struct LinkStateRecord {
    pub origin: Addr,
    pub link_id: u32,
    pub cost: f64,
    pub bandwidth: f64,
    pub delay: f64,
    /// 链路对端路由器；尚未从 Hello 学到对端时为广播地址，建图时跳过。
    pub neighbor: Addr,
    pub timestamp: SimTime,
}

impl LinkStateRecord {
    pub fn from_lsa(origin: Addr, fields: &LsaFields) -> LinkStateRecord {
        LinkStateRecord {
            origin,
            link_id: fields.link_id,
            cost: fields.cost,
            bandwidth: fields.bandwidth,
            delay: fields.delay,
            neighbor: fields.neighbor,
            timestamp: fields.timestamp,
        }
    }
}

/// Dijkstra 的结果：到某路由器的首跳、总代价与跳数。
#[derive(Debug, Clone, PartialEq)]
pub struct SpfResult {
    pub first_hop: Addr,
    pub cost: f64,
    pub hops: u32,
}

#[derive(Debug, Default)]
pub struct LinkStateDb {
    records: HashMap<(Addr, u32), LinkStateRecord>,
}

// BinaryHeap 是 max-heap，比较取反得到最小代价优先。
struct SpfState {
    cost: f64,
    router: Addr,
}

impl PartialEq for SpfState {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.router == other.router
    }
}

impl Eq for SpfState {}

impl Ord for SpfState {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.router.cmp(&self.router))
    }
}

impl PartialOrd for SpfState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl LinkStateDb {
    /// 更新一条记录。时间戳不比已存记录新时忽略并返回 `false`
    /// （忽略的通告也不应再被洪泛）。
    pub fn update(&mut self, rec: LinkStateRecord) -> bool {
        let key = (rec.origin, rec.link_id);
        if let Some(existing) = self.records.get(&key) {
            if rec.timestamp <= existing.timestamp {
                return false;
            }
        }
        self.records.insert(key, rec);
        true
    }

    pub fn get(&self, origin: Addr, link_id: u32) -> Option<&LinkStateRecord> {
        self.records.get(&(origin, link_id))
    }

    pub fn records(&self) -> impl Iterator<Item = &LinkStateRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 以 TE 代价为边权，从 `source` 计算到每个可达路由器的最短路。
    pub fn shortest_paths(&self, source: Addr) -> HashMap<Addr, SpfResult> {
        // 邻接表：origin -> [(对端, 代价)]
        let mut adj: HashMap<Addr, Vec<(Addr, f64)>> = HashMap::new();
        for rec in self.records.values() {
            if rec.neighbor == Addr::BROADCAST {
                continue;
            }
            adj.entry(rec.origin)
                .or_default()
                .push((rec.neighbor, rec.cost));
        }

        let mut dist: HashMap<Addr, f64> = HashMap::new();
        let mut prev: HashMap<Addr, Addr> = HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(source, 0.0);
        heap.push(SpfState {
            cost: 0.0,
            router: source,
        });

        while let Some(SpfState { cost, router }) = heap.pop() {
            if cost > *dist.get(&router).unwrap_or(&f64::INFINITY) {
                continue;
            }
            let Some(edges) = adj.get(&router) else {
                continue;
            };
            for &(next, edge_cost) in edges {
                let new_cost = cost + edge_cost;
                if new_cost < *dist.get(&next).unwrap_or(&f64::INFINITY) {
                    dist.insert(next, new_cost);
                    prev.insert(next, router);
                    heap.push(SpfState {
                        cost: new_cost,
                        router: next,
                    });
                }
            }
        }

        // 回溯 prev 找首跳与跳数。
        let mut out = HashMap::new();
        for (&dest, &cost) in &dist {
            if dest == source {
                continue;
            }
            let mut hops = 0u32;
            let mut cur = dest;
            let mut first = dest;
            while let Some(&p) = prev.get(&cur) {
                hops += 1;
                if p == source {
                    first = cur;
                    break;
                }
                cur = p;
            }
            out.insert(
                dest,
                SpfResult {
                    first_hop: first,
                    cost,
                    hops,
                },
            );
        }
        out
    }
}
