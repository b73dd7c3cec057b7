//! 路由器
//!
//! 转发平面：SYN 限速（每秒清零）、按目的查表、按门累计利用率、
//! 优先级分流（高优先级直达发送器，普通帧在门忙时进优先级队列，
//! 门空闲时按优先级排空）、查不到路由时洪泛。
//!
//! 控制平面按配置三选一：带 TE 代价的链路状态协议（Hello 学邻居、
//! LSA 洪泛、Dijkstra 装路由）、距离向量协议（周期全表通告、16 跳
//! 无穷大）、或纯静态路由。

use super::Node;
use crate::config::{RouterConfig, RoutingProtocol};
use crate::net::{
    Addr, Frame, Kind, LsaFields, Network, NodeIdx, NodeTimer, Priority, RipUpdateFields, Timer,
    TraceKind,
};
use crate::proto::limit::{RateLimiter, SWEEP_INTERVAL};
use crate::proto::ospf::{LinkStateDb, LinkStateRecord};
use crate::proto::routing::{parse_static_routes, RouteEntry, RoutingTable};
use crate::queue::FramePriorityQueue;
use crate::sim::{EventId, SimTime, Simulator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct Router {
    idx: NodeIdx,
    name: String,
    cfg: RouterConfig,
    table: RoutingTable,
    lsdb: LinkStateDb,
    /// 门 -> 从 Hello 学到的邻居路由器。
    neighbors: HashMap<usize, Addr>,
    /// 每门链路带宽（Mbps），初始化时从信道读出。
    bandwidth_mbps: Vec<f64>,
    /// 每门累计利用率（Mbps 当量）。
    utilization: Vec<f64>,
    /// 每门的优先级输出队列，门空闲时排空。
    out_queues: Vec<FramePriorityQueue>,
    guard: RateLimiter,
    rng: StdRng,
    hello_ev: Option<EventId>,
    lsa_ev: Option<EventId>,
    rip_ev: Option<EventId>,
    reset_ev: Option<EventId>,
}

impl Router {
    pub fn new(idx: NodeIdx, cfg: RouterConfig) -> Router {
        let addr = cfg.address;
        Router {
            idx,
            name: format!("router{}", addr.0),
            guard: RateLimiter::new(cfg.syn_rate_limit),
            rng: StdRng::seed_from_u64(addr.0 as u64),
            cfg,
            table: RoutingTable::default(),
            lsdb: LinkStateDb::default(),
            neighbors: HashMap::new(),
            bandwidth_mbps: Vec::new(),
            utilization: Vec::new(),
            out_queues: Vec::new(),
            hello_ev: None,
            lsa_ev: None,
            rip_ev: None,
            reset_ev: None,
        }
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn routing_table_mut(&mut self) -> &mut RoutingTable {
        &mut self.table
    }

    pub fn link_state_db(&self) -> &LinkStateDb {
        &self.lsdb
    }

    pub fn gate_utilization(&self, gate: usize) -> f64 {
        self.utilization.get(gate).copied().unwrap_or(0.0)
    }

    pub fn queued_on_gate(&self, gate: usize) -> usize {
        self.out_queues.get(gate).map(|q| q.len()).unwrap_or(0)
    }

    pub fn neighbor_on_gate(&self, gate: usize) -> Option<Addr> {
        self.neighbors.get(&gate).copied()
    }

    fn gate_count(&self) -> usize {
        self.out_queues.len()
    }

    fn schedule(&self, sim: &mut Simulator, delay: SimTime, timer: Timer) -> EventId {
        sim.schedule(
            sim.now().after(delay),
            NodeTimer {
                node: self.idx,
                timer,
            },
        )
    }

    /// 数据平面转发。
    fn forward(&mut self, frame: Frame, arrival_gate: usize, sim: &mut Simulator, net: &mut Network) {
        let dst = frame.dst;
        let next_hop = self.table.lookup(dst).map(|e| e.next_hop);
        if let Some(g) = next_hop {
            if g < self.gate_count() {
                // 利用率按 Mbps 当量累计
                self.utilization[g] += frame.byte_length as f64 / 1_000_000.0;

                let gate_id = net.gate_id(self.idx, g);
                let busy = net.gate(gate_id).is_busy(sim.now());
                if frame.priority >= Priority::High || (self.out_queues[g].is_empty() && !busy) {
                    debug!(router = %self.cfg.address, gate = g, priority = ?frame.priority, "直接转发");
                    net.transmit(gate_id, frame, sim);
                } else {
                    debug!(router = %self.cfg.address, gate = g, "门忙，帧进优先级队列");
                    self.out_queues[g].push(frame);
                }
                return;
            }
        }

        // 未知目的：除到达门外全部洪泛（N−1 份克隆，原帧随后销毁）
        warn!(router = %self.cfg.address, dst = %dst, "无路由，洪泛");
        net.stats.flooded_frames += 1;
        for g in 0..self.gate_count() {
            if g != arrival_gate {
                let gate_id = net.gate_id(self.idx, g);
                net.transmit(gate_id, frame.clone(), sim);
            }
        }
        drop(frame);
    }

    // ---------- 链路状态控制平面 ----------

    fn send_hellos(&mut self, sim: &mut Simulator, net: &mut Network) {
        for g in 0..self.gate_count() {
            let hello = Frame::new(self.cfg.address, Addr::BROADCAST, Kind::Hello)
                .with_priority(Priority::High);
            let gate_id = net.gate_id(self.idx, g);
            net.transmit(gate_id, hello, sim);
        }
        debug!(router = %self.cfg.address, "发送 OSPF Hello");
    }

    fn send_lsas(&mut self, sim: &mut Simulator, net: &mut Network) {
        let now = sim.now();
        for link in 0..self.gate_count() {
            let available = self.bandwidth_mbps[link] - self.utilization[link];
            let fields = LsaFields {
                link_id: link as u32,
                // TE 代价：可用带宽越低代价越高
                cost: 1.0 / (available + 1.0),
                bandwidth: available,
                delay: 1.0,
                neighbor: self.neighbors.get(&link).copied().unwrap_or(Addr::BROADCAST),
                timestamp: now,
            };
            // 自己的链路也进自己的数据库，最短路才有出边
            self.lsdb
                .update(LinkStateRecord::from_lsa(self.cfg.address, &fields));

            // 洪泛到除链路本门之外的所有门
            for g in 0..self.gate_count() {
                if g != link {
                    let lsa =
                        Frame::new(self.cfg.address, Addr::BROADCAST, Kind::TeUpdate(fields.clone()))
                            .with_priority(Priority::High);
                    let gate_id = net.gate_id(self.idx, g);
                    net.transmit(gate_id, lsa, sim);
                }
            }
        }
        self.recompute_routes(now, net);
        info!(router = %self.cfg.address, "发送 OSPF-TE LSA");
    }

    fn handle_lsa(
        &mut self,
        origin: Addr,
        fields: LsaFields,
        te: bool,
        arrival_gate: usize,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        if origin == self.cfg.address {
            // 自己的通告绕回来了
            return;
        }
        let rec = LinkStateRecord::from_lsa(origin, &fields);
        if !self.lsdb.update(rec) {
            debug!(router = %self.cfg.address, %origin, link = fields.link_id, "LSA 时间戳不新，忽略");
            return;
        }
        self.recompute_routes(sim.now(), net);

        // 再洪泛：除到达门外的所有门，保持原 kind
        for g in 0..self.gate_count() {
            if g != arrival_gate {
                let kind = if te {
                    Kind::TeUpdate(fields.clone())
                } else {
                    Kind::Lsa(fields.clone())
                };
                let mut copy = Frame::new(origin, Addr::BROADCAST, kind);
                copy.priority = Priority::High;
                let gate_id = net.gate_id(self.idx, g);
                net.transmit(gate_id, copy, sim);
            }
        }
        debug!(router = %self.cfg.address, %origin, link = fields.link_id, "LSA 已入库并转发");
    }

    /// 在链路状态库上跑 Dijkstra，把首跳映射回门装进路由表。
    fn recompute_routes(&mut self, now: SimTime, net: &mut Network) {
        let spf = self.lsdb.shortest_paths(self.cfg.address);
        for (dest, result) in spf {
            let gate = self
                .neighbors
                .iter()
                .find(|(_, &n)| n == result.first_hop)
                .map(|(&g, _)| g);
            let Some(gate) = gate else {
                // 首跳邻居还没从 Hello 学到对应门
                continue;
            };
            self.table.install(RouteEntry {
                dest,
                next_hop: gate,
                metric: result.cost,
                bandwidth: self.bandwidth_mbps.get(gate).copied().unwrap_or(0.0),
                delay: 1.0,
                hop_count: result.hops,
                last_update: now,
            });
            net.record(
                now,
                self.cfg.address,
                TraceKind::RouteInstalled { dest: dest.0, gate },
            );
        }
    }

    // ---------- 距离向量控制平面 ----------

    fn send_rip_update(&mut self, sim: &mut Simulator, net: &mut Network) {
        let routes = self.table.rip_export();
        for g in 0..self.gate_count() {
            let update = Frame::new(
                self.cfg.address,
                Addr::BROADCAST,
                Kind::RipUpdate(RipUpdateFields {
                    routes: routes.clone(),
                }),
            );
            let gate_id = net.gate_id(self.idx, g);
            net.transmit(gate_id, update, sim);
        }
        debug!(router = %self.cfg.address, entries = routes.len(), "发送 RIP 更新");
    }

    fn handle_rip(
        &mut self,
        neighbor: Addr,
        fields: RipUpdateFields,
        arrival_gate: usize,
        sim: &mut Simulator,
    ) {
        let changed = self
            .table
            .merge_rip(&fields.routes, arrival_gate, sim.now());
        if changed {
            info!(router = %self.cfg.address, %neighbor, "从 RIP 邻居学到新路由");
        }
    }
}

impl Node for Router {
    fn addr(&self) -> Addr {
        self.cfg.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, sim: &mut Simulator, net: &mut Network) {
        let n = net.gate_count(self.idx);
        self.bandwidth_mbps = (0..n)
            .map(|g| net.gate(net.gate_id(self.idx, g)).channel.bandwidth_bps as f64 / 1e6)
            .collect();
        self.utilization = vec![0.0; n];
        self.out_queues = (0..n).map(|_| FramePriorityQueue::new()).collect();

        // 静态路由兜底；OSPF/RIP 在其上增量更新
        match parse_static_routes(&self.cfg.routes) {
            Ok(routes) => {
                for (dest, gate) in routes {
                    self.table.install(RouteEntry {
                        dest,
                        next_hop: gate,
                        metric: 1.0,
                        bandwidth: 100.0,
                        delay: 1.0,
                        hop_count: 1,
                        last_update: SimTime::ZERO,
                    });
                }
            }
            Err(e) => warn!(router = %self.cfg.address, error = %e, "静态路由解析失败"),
        }

        self.reset_ev = Some(self.schedule(sim, SWEEP_INTERVAL, Timer::RateLimitReset));

        match self.cfg.routing_protocol {
            RoutingProtocol::OspfTe => {
                let hello_at = SimTime::from_secs_f64(self.rng.gen_range(0.0..1.0));
                let lsa_at = SimTime::from_secs_f64(self.rng.gen_range(0.0..2.0));
                self.hello_ev = Some(self.schedule(sim, hello_at, Timer::OspfHello));
                self.lsa_ev = Some(self.schedule(sim, lsa_at, Timer::OspfLsa));
                info!(router = %self.cfg.address, gates = n, "路由器初始化完成（OSPF-TE）");
            }
            RoutingProtocol::Rip => {
                let at =
                    SimTime::from_secs_f64(self.rng.gen_range(0.0..self.cfg.rip_update_interval));
                self.rip_ev = Some(self.schedule(sim, at, Timer::RipUpdate));
                info!(router = %self.cfg.address, gates = n, "路由器初始化完成（RIP）");
            }
            RoutingProtocol::Static => {
                info!(router = %self.cfg.address, gates = n, routes = self.table.len(), "路由器初始化完成（静态路由）");
            }
        }
    }

    fn on_frame(
        &mut self,
        frame: Frame,
        arrival_gate: usize,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let src = frame.src;

        if frame.kind.is_routing_control() {
            match frame.kind {
                Kind::Hello => {
                    self.neighbors.insert(arrival_gate, src);
                    debug!(router = %self.cfg.address, neighbor = %src, gate = arrival_gate, "收到 Hello");
                }
                Kind::Lsa(f) => self.handle_lsa(src, f, false, arrival_gate, sim, net),
                Kind::TeUpdate(f) => self.handle_lsa(src, f, true, arrival_gate, sim, net),
                Kind::RipUpdate(f) => self.handle_rip(src, f, arrival_gate, sim),
                Kind::RipRequest => self.send_rip_update(sim, net),
                _ => unreachable!("is_routing_control 已筛选"),
            }
            return;
        }

        // SYN 限速：超限的 SYN 在转发前丢弃
        if matches!(frame.kind, Kind::Syn(_)) && !self.guard.register(src, sim.now()) {
            warn!(router = %self.cfg.address, %src, "SYN 超过限速，丢弃");
            net.stats.syn_rate_dropped += 1;
            net.record(sim.now(), self.cfg.address, TraceKind::SynRateDropped { src: src.0 });
            return;
        }

        self.forward(frame, arrival_gate, sim, net);
    }

    fn on_timer(&mut self, timer: Timer, sim: &mut Simulator, net: &mut Network) {
        match timer {
            Timer::OspfHello => {
                self.send_hellos(sim, net);
                let d = SimTime::from_secs_f64(self.cfg.ospf_hello_interval);
                self.hello_ev = Some(self.schedule(sim, d, Timer::OspfHello));
            }
            Timer::OspfLsa => {
                self.send_lsas(sim, net);
                let d = SimTime::from_secs_f64(self.cfg.ospf_lsa_interval);
                self.lsa_ev = Some(self.schedule(sim, d, Timer::OspfLsa));
            }
            Timer::RipUpdate => {
                self.send_rip_update(sim, net);
                let d = SimTime::from_secs_f64(self.cfg.rip_update_interval);
                self.rip_ev = Some(self.schedule(sim, d, Timer::RipUpdate));
            }
            Timer::RateLimitReset => {
                self.guard.reset();
                self.reset_ev = Some(self.schedule(sim, SWEEP_INTERVAL, Timer::RateLimitReset));
            }
            other => debug!(router = %self.cfg.address, timer = ?other, "忽略不相关的定时器"),
        }
    }

    /// 门空闲：从该门的优先级队列取最高优先级的一帧续传。
    fn on_gate_idle(&mut self, gate: usize, sim: &mut Simulator, net: &mut Network) {
        if let Some(frame) = self.out_queues.get_mut(gate).and_then(|q| q.pop()) {
            debug!(router = %self.cfg.address, gate, "门空闲，优先级队列出队");
            let gate_id = net.gate_id(self.idx, gate);
            net.transmit(gate_id, frame, sim);
        }
    }

    fn finish(&mut self, sim: &mut Simulator, _net: &mut Network) {
        for ev in [
            self.hello_ev.take(),
            self.lsa_ev.take(),
            self.rip_ev.take(),
            self.reset_ev.take(),
        ]
        .into_iter()
        .flatten()
        {
            sim.cancel(ev);
        }
        for q in &mut self.out_queues {
            q.clear();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
