//! 路由表与距离向量合并
//!
//! 转发平面按目的地址查表得到下一跳门；表项来自静态配置、RIP 合并
//! 或 OSPF 的最短路计算。跳数达到 16 视为不可达（距离向量无穷大）。

use crate::net::{Addr, RipRoute};
use crate::sim::SimTime;
use std::collections::HashMap;
use thiserror::Error;

/// 距离向量的"无穷"：跳数 >= 16 不可达。
pub const RIP_INFINITY: u32 = 16;

/// 一条路由：目的地址 -> 下一跳门与度量。
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub dest: Addr,
    /// 本地输出门编号。
    pub next_hop: usize,
    pub metric: f64,
    pub bandwidth: f64,
    pub delay: f64,
    pub hop_count: u32,
    pub last_update: SimTime,
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: HashMap<Addr, RouteEntry>,
}

impl RoutingTable {
    pub fn lookup(&self, dest: Addr) -> Option<&RouteEntry> {
        self.entries.get(&dest)
    }

    pub fn install(&mut self, entry: RouteEntry) {
        self.entries.insert(entry.dest, entry);
    }

    pub fn remove(&mut self, dest: Addr) -> Option<RouteEntry> {
        self.entries.remove(&dest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    /// 导出为距离向量通告载荷。
    pub fn rip_export(&self) -> Vec<RipRoute> {
        self.entries
            .values()
            .map(|e| RipRoute {
                dest: e.dest,
                metric: e.metric,
                hops: e.hop_count,
            })
            .collect()
    }

    /// 合并一份来自 `arrival_gate` 的距离向量通告。
    ///
    /// 每条通告加一跳；跳数达到 16 的路由丢弃；只有目的未知或度量
    /// 严格更优时才安装。返回是否有表项变化。
    pub fn merge_rip(&mut self, routes: &[RipRoute], arrival_gate: usize, now: SimTime) -> bool {
        let mut changed = false;
        for r in routes {
            let new_metric = r.metric + 1.0;
            let new_hops = r.hops + 1;
            if new_hops >= RIP_INFINITY {
                continue;
            }
            let better = match self.entries.get(&r.dest) {
                None => true,
                Some(cur) => new_metric < cur.metric,
            };
            if better {
                self.entries.insert(
                    r.dest,
                    RouteEntry {
                        dest: r.dest,
                        next_hop: arrival_gate,
                        metric: new_metric,
                        bandwidth: 0.0,
                        delay: 0.0,
                        hop_count: new_hops,
                        last_update: now,
                    },
                );
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteParseError {
    #[error("invalid static route entry '{0}', expected dest:gate")]
    BadEntry(String),
}

/// 解析静态路由配置 `dest:gate,dest:gate,...`（空串为无路由）。
pub fn parse_static_routes(s: &str) -> Result<Vec<(Addr, usize)>, RouteParseError> {
    let mut out = Vec::new();
    for item in s.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let parsed = item.split_once(':').and_then(|(d, g)| {
            Some((
                Addr(d.trim().parse::<u32>().ok()?),
                g.trim().parse::<usize>().ok()?,
            ))
        });
        match parsed {
            Some(pair) => out.push(pair),
            None => return Err(RouteParseError::BadEntry(item.to_string())),
        }
    }
    Ok(out)
}
