//! 网络拓扑与链路发送器
//!
//! 持有全部节点与门，实现帧的序列化上线（每门 FIFO + busy-until）、
//! 到达分发与节点定时器分发。发送器是唯一合法的发包路径：节点只能
//! 通过 [`Network::transmit`] 把帧交给信道。

use std::collections::HashMap;

use super::addr::{Addr, GateId, NodeIdx};
use super::deliver_frame::DeliverFrame;
use super::end_of_tx::EndOfTx;
use super::frame::Frame;
use super::gate::{Channel, Gate};
use super::stats::Stats;
use super::timer::Timer;
use super::trace::{TraceKind, TraceLog};
use crate::node::Node;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

/// 网络拓扑
pub struct Network {
    nodes: Vec<Option<Box<dyn Node>>>,
    addr_index: HashMap<Addr, NodeIdx>,
    gates: Vec<Gate>,
    node_gates: Vec<Vec<GateId>>,
    pub stats: Stats,
    pub trace: Option<TraceLog>,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            addr_index: HashMap::new(),
            gates: Vec::new(),
            node_gates: Vec::new(),
            stats: Stats::default(),
            trace: None,
        }
    }
}

impl Network {
    /// 添加一个节点。构造闭包拿到分配好的索引，节点自己保存它
    /// 以便调度定时器。
    pub fn add_node(&mut self, build: impl FnOnce(NodeIdx) -> Box<dyn Node>) -> NodeIdx {
        let idx = NodeIdx(self.nodes.len());
        let node = build(idx);
        let addr = node.addr();
        self.addr_index.insert(addr, idx);
        self.nodes.push(Some(node));
        self.node_gates.push(Vec::new());
        idx
    }

    /// 连接两个节点：创建一对反向的单向门。
    pub fn connect(
        &mut self,
        a: NodeIdx,
        b: NodeIdx,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> (GateId, GateId) {
        let ab = GateId(self.gates.len());
        let ba = GateId(self.gates.len() + 1);
        self.gates.push(Gate {
            from: a,
            to: b,
            reverse: ba,
            local_index: self.node_gates[a.0].len(),
            channel: Channel::new(latency, bandwidth_bps),
            tx_fifo: Default::default(),
            end_tx_scheduled: false,
        });
        self.gates.push(Gate {
            from: b,
            to: a,
            reverse: ab,
            local_index: self.node_gates[b.0].len(),
            channel: Channel::new(latency, bandwidth_bps),
            tx_fifo: Default::default(),
            end_tx_scheduled: false,
        });
        self.node_gates[a.0].push(ab);
        self.node_gates[b.0].push(ba);
        (ab, ba)
    }

    pub fn gate_count(&self, node: NodeIdx) -> usize {
        self.node_gates[node.0].len()
    }

    /// 节点局部门编号 -> 全局门。
    pub fn gate_id(&self, node: NodeIdx, local: usize) -> GateId {
        self.node_gates[node.0][local]
    }

    pub fn gate(&self, id: GateId) -> &Gate {
        &self.gates[id.0]
    }

    pub fn node_idx(&self, addr: Addr) -> Option<NodeIdx> {
        self.addr_index.get(&addr).copied()
    }

    /// 只读访问节点（统计/测试下钻用）。
    pub fn node(&self, idx: NodeIdx) -> &dyn Node {
        self.nodes[idx.0].as_deref().expect("node exists")
    }

    /// 可变访问节点（场景驱动，例如撤销一条路由）。
    pub fn node_mut(&mut self, idx: NodeIdx) -> &mut dyn Node {
        self.nodes[idx.0].as_deref_mut().expect("node exists")
    }

    /// 记录一条轨迹事件（未启用轨迹时为 no-op）。
    pub fn record(&mut self, t: SimTime, node: Addr, kind: TraceKind) {
        if let Some(log) = self.trace.as_mut() {
            log.record(t, node, kind);
        }
    }

    /// 拓扑建好后调用：让每个节点安排自己的初始定时器。
    pub fn initialize_all(&mut self, sim: &mut Simulator) {
        for i in 0..self.nodes.len() {
            let mut node = self.nodes[i].take().expect("node exists");
            node.initialize(sim, self);
            self.nodes[i] = Some(node);
        }
    }

    /// 仿真收尾：节点清理定时器，随后清空所有发送队列。
    pub fn finish_all(&mut self, sim: &mut Simulator) {
        for i in 0..self.nodes.len() {
            let mut node = self.nodes[i].take().expect("node exists");
            node.finish(sim, self);
            self.nodes[i] = Some(node);
        }
        for g in &mut self.gates {
            g.tx_fifo.clear();
        }
    }

    /// 把帧交给某个门的发送器。
    ///
    /// 信道忙或已有发送结束事件在途时入 FIFO，否则立即上线。
    pub fn transmit(&mut self, gate: GateId, frame: Frame, sim: &mut Simulator) {
        let now = sim.now();
        let g = &mut self.gates[gate.0];
        if g.channel.busy_until > now || g.end_tx_scheduled {
            trace!(
                gate = gate.0,
                kind = frame.kind.name(),
                fifo_len = g.tx_fifo.len() + 1,
                busy_until = ?g.channel.busy_until,
                "信道忙，帧入发送队列"
            );
            g.tx_fifo.push_back(frame);
            return;
        }
        self.start_transmission(gate, frame, sim);
    }

    /// 帧上线：占住信道到 depart，调度到达事件与发送结束事件。
    fn start_transmission(&mut self, gate: GateId, frame: Frame, sim: &mut Simulator) {
        let now = sim.now();
        let (to, latency, depart) = {
            let g = &mut self.gates[gate.0];
            let tx_time = g.channel.tx_time(frame.byte_length);
            let depart = now.after(tx_time);
            g.channel.busy_until = depart;
            g.end_tx_scheduled = true;
            (g.to, g.channel.latency, depart)
        };
        let arrival_gate = {
            let rev = self.gates[gate.0].reverse;
            self.gates[rev.0].local_index
        };
        let arrive = depart.after(latency);

        self.stats.transmitted_frames += 1;
        self.stats.transmitted_bytes += frame.byte_length;

        trace!(
            gate = gate.0,
            kind = frame.kind.name(),
            src = %frame.src,
            dst = %frame.dst,
            depart = ?depart,
            arrive = ?arrive,
            "门发送队头帧"
        );

        sim.schedule(
            arrive,
            DeliverFrame {
                to,
                arrival_gate,
                frame,
            },
        );
        sim.schedule(depart, EndOfTx { gate });
    }

    /// depart 时刻触发：发送结束，续传 FIFO 队头；队空则通知属主门已空闲。
    pub(crate) fn on_end_tx(&mut self, gate: GateId, sim: &mut Simulator) {
        let next = {
            let g = &mut self.gates[gate.0];
            g.end_tx_scheduled = false;
            g.tx_fifo.pop_front()
        };
        match next {
            Some(frame) => self.start_transmission(gate, frame, sim),
            None => {
                let (owner, local) = {
                    let g = &self.gates[gate.0];
                    (g.from, g.local_index)
                };
                debug!(gate = gate.0, "发送队列排空，门空闲");
                let mut node = self.nodes[owner.0].take().expect("node exists");
                node.on_gate_idle(local, sim, self);
                self.nodes[owner.0] = Some(node);
            }
        }
    }

    /// 把到达的帧交付给节点反应器。
    pub(crate) fn deliver(
        &mut self,
        to: NodeIdx,
        arrival_gate: usize,
        frame: Frame,
        sim: &mut Simulator,
    ) {
        self.stats.delivered_frames += 1;
        // 暂时把节点取出来，避免 &mut self 与 &mut node 的重叠借用。
        let mut node = self.nodes[to.0].take().expect("node exists");
        trace!(node = node.name(), kind = frame.kind.name(), "交付帧");
        node.on_frame(frame, arrival_gate, sim, self);
        self.nodes[to.0] = Some(node);
    }

    /// 把到期的自事件交给节点。
    pub(crate) fn dispatch_timer(&mut self, node_idx: NodeIdx, timer: Timer, sim: &mut Simulator) {
        let mut node = self.nodes[node_idx.0].take().expect("node exists");
        node.on_timer(timer, sim, self);
        self.nodes[node_idx.0] = Some(node);
    }
}
