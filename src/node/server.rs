//! 服务器公共骨架
//!
//! HTTP/Mail/Database 三个服务器共享的状态与处理：TCP 端点、密钥
//! 交换、SYN 防护（60 秒 TTL、每秒清扫）、优先级响应队列与延迟发送。
//! 各服务器只保留自己的应用处理与服务时间参数。

use crate::net::{Addr, Frame, Network, NodeIdx, NodeTimer, Priority, Timer, TraceKind};
use crate::proto::limit::{RateLimiter, SWEEP_INTERVAL};
use crate::proto::secure::KeyStore;
use crate::proto::tcp::{FinOutcome, TcpEndpoint};
use crate::queue::FramePriorityQueue;
use crate::sim::{EventId, SimTime, Simulator};
use tracing::{debug, info, warn};

pub(crate) struct ServerCore {
    pub idx: NodeIdx,
    pub addr: Addr,
    /// 日志里的节点名。
    pub label: &'static str,
    pub tcp: TcpEndpoint,
    pub keys: KeyStore,
    pub guard: RateLimiter,
    pub queue: FramePriorityQueue,
    /// 低优先级响应的出队间隔。
    pub drain_interval: SimTime,
    queue_armed: bool,
    queue_ev: Option<EventId>,
    sweep_ev: Option<EventId>,
}

impl ServerCore {
    pub fn new(
        idx: NodeIdx,
        addr: Addr,
        label: &'static str,
        syn_rate_limit: f64,
        drain_interval: SimTime,
        tcp: TcpEndpoint,
    ) -> ServerCore {
        ServerCore {
            idx,
            addr,
            label,
            tcp,
            keys: KeyStore::new(addr),
            guard: RateLimiter::new(syn_rate_limit),
            queue: FramePriorityQueue::new(),
            drain_interval,
            queue_armed: false,
            queue_ev: None,
            sweep_ev: None,
        }
    }

    /// 端点只有一个门。
    pub fn send(&self, frame: Frame, sim: &mut Simulator, net: &mut Network) {
        let gate = net.gate_id(self.idx, 0);
        net.transmit(gate, frame, sim);
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

    pub fn initialize(&mut self, sim: &mut Simulator) {
        self.sweep_ev = Some(self.schedule(sim, SWEEP_INTERVAL, Timer::SynFloodSweep));
        info!(server = self.label, addr = %self.addr, "服务器初始化完成");
    }

    pub fn on_sweep(&mut self, sim: &mut Simulator) {
        self.guard.sweep(sim.now());
        self.sweep_ev = Some(self.schedule(sim, SWEEP_INTERVAL, Timer::SynFloodSweep));
    }

    pub fn handle_key_exchange(
        &mut self,
        src: Addr,
        public_key: &str,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        // 只有首次交换才回我们的公钥；重复交换静默更新密钥。
        if self.keys.accept(src, public_key) {
            let reply = self.keys.exchange_frame(src);
            self.send(reply, sim, net);
        }
        info!(server = self.label, peer = %src, "密钥交换完成");
    }

    pub fn handle_syn(
        &mut self,
        src: Addr,
        seq: u64,
        fields: &crate::net::SynFields,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let now = sim.now();
        if !self.guard.register(src, now) {
            warn!(server = self.label, src = %src, "SYN 超过限速，丢弃");
            net.stats.syn_flood_dropped += 1;
            net.record(now, self.addr, TraceKind::SynRateDropped { src: src.0 });
            return;
        }
        match self.tcp.on_syn(src, seq, fields, now) {
            Some(syn_ack) => {
                net.record(now, self.addr, TraceKind::SynAckSent { peer: src.0 });
                self.send(syn_ack, sim, net);
            }
            None => {
                net.stats.bad_cookie_dropped += 1;
            }
        }
    }

    pub fn handle_ack(&mut self, src: Addr, sim: &mut Simulator, net: &mut Network) {
        match self.tcp.on_ack(src) {
            Some(true) => {
                info!(server = self.label, peer = %src, "TCP 连接建立");
                net.record(sim.now(), self.addr, TraceKind::TcpEstablished { peer: src.0 });
            }
            Some(false) => {
                if let Some(conn) = self.tcp.get(src) {
                    debug!(server = self.label, peer = %src, cwnd = conn.cwnd, "收到 ACK");
                }
            }
            None => debug!(server = self.label, src = %src, "未知对端的 ACK，丢弃"),
        }
    }

    pub fn handle_fin(&mut self, src: Addr, sim: &mut Simulator, net: &mut Network) {
        match self.tcp.on_fin(src) {
            FinOutcome::Reply(fin) => {
                self.send(fin, sim, net);
                info!(server = self.label, peer = %src, "连接关闭");
                net.record(sim.now(), self.addr, TraceKind::TcpClosed { peer: src.0 });
            }
            FinOutcome::Closed => {
                net.record(sim.now(), self.addr, TraceKind::TcpClosed { peer: src.0 });
            }
            FinOutcome::Unknown => debug!(server = self.label, src = %src, "未知对端的 FIN，丢弃"),
        }
    }

    /// 按优先级分发响应：高优先级在缩短后的服务时间之后直接发送，
    /// 其余进队列，由 process 定时器每个出队间隔取一条。
    pub fn dispatch_response(
        &mut self,
        resp: Frame,
        service_time_secs: f64,
        fast_factor: f64,
        sim: &mut Simulator,
    ) {
        if resp.priority >= Priority::High {
            let delay = SimTime::from_secs_f64(service_time_secs * fast_factor);
            self.schedule(sim, delay, Timer::SendDeferred(Box::new(resp)));
        } else {
            self.queue.push(resp);
            if !self.queue_armed {
                let delay = SimTime::from_secs_f64(service_time_secs);
                self.queue_ev = Some(self.schedule(sim, delay, Timer::ProcessQueue));
                self.queue_armed = true;
            }
        }
    }

    /// 无条件延迟发送（UDP 快速路径等）。
    pub fn send_after(&mut self, resp: Frame, delay: SimTime, sim: &mut Simulator) {
        self.schedule(sim, delay, Timer::SendDeferred(Box::new(resp)));
    }

    pub fn on_process_queue(&mut self, sim: &mut Simulator, net: &mut Network) {
        self.queue_armed = false;
        self.queue_ev = None;
        if let Some(frame) = self.queue.pop() {
            self.send(frame, sim, net);
            if !self.queue.is_empty() {
                self.queue_ev = Some(self.schedule(sim, self.drain_interval, Timer::ProcessQueue));
                self.queue_armed = true;
            }
        }
    }

    pub fn finish(&mut self, sim: &mut Simulator) {
        if let Some(ev) = self.sweep_ev.take() {
            sim.cancel(ev);
        }
        if let Some(ev) = self.queue_ev.take() {
            sim.cancel(ev);
        }
        self.queue.clear();
    }
}
