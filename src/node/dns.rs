//! DNS 服务器
//!
//! 解析查询名并返回配置的 `answerAddr`。应答沿查询来的传输方式原路
//! 返回（UDP 数据报 / TCP 数据段 / 裸响应帧）。每来源的查询限速按
//! 1 秒窗口计数，只对查询生效，不把密钥交换和握手帧算进去。

use super::Node;
use crate::config::DnsConfig;
use crate::net::{
    Addr, AppData, DnsQueryFields, DnsResponseFields, Frame, Kind, Network, NodeIdx, NodeTimer,
    Priority, Timer, TraceKind, WireProto,
};
use crate::proto::limit::{RateLimiter, SWEEP_INTERVAL};
use crate::proto::secure::KeyStore;
use crate::proto::tcp::{FinOutcome, TcpEndpoint};
use crate::sim::{EventId, Simulator};
use std::any::Any;
use tracing::{debug, info, warn};

/// 应答走哪条路回去。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyVia {
    TcpData,
    UdpDatagram,
    Bare,
}

pub struct DnsServer {
    idx: NodeIdx,
    name: String,
    cfg: DnsConfig,
    tcp: TcpEndpoint,
    keys: KeyStore,
    limiter: RateLimiter,
    reset_ev: Option<EventId>,
}

impl DnsServer {
    pub fn new(idx: NodeIdx, cfg: DnsConfig) -> DnsServer {
        let addr = cfg.address;
        DnsServer {
            idx,
            name: format!("dns{}", addr.0),
            tcp: TcpEndpoint::new(addr),
            keys: KeyStore::new(addr),
            limiter: RateLimiter::new(cfg.rate_limit),
            cfg,
            reset_ev: None,
        }
    }

    fn send(&self, frame: Frame, sim: &mut Simulator, net: &mut Network) {
        let gate = net.gate_id(self.idx, 0);
        net.transmit(gate, frame, sim);
    }

    fn answer_query(
        &mut self,
        src: Addr,
        priority: Priority,
        query: DnsQueryFields,
        via: ReplyVia,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        // 限速只作用于查询本身
        if !self.limiter.register(src, sim.now()) {
            warn!(dns = %self.cfg.address, %src, "查询超过限速，丢弃");
            return;
        }

        let qname = if query.encrypted {
            self.keys
                .decrypt_from(src, &query.qname)
                .unwrap_or(query.qname)
        } else {
            query.qname
        };
        info!(dns = %self.cfg.address, %qname, %src, via = ?via, "收到 DNS 查询");

        let (qname_out, encrypted) = match self.keys.encrypt_for(src, &qname) {
            Some(cipher) => (cipher, true),
            None => (qname, false),
        };
        let fields = DnsResponseFields {
            qname: qname_out,
            answer: self.cfg.answer_addr,
            encrypted,
        };

        let mut resp = match via {
            ReplyVia::TcpData => Frame::new(
                self.cfg.address,
                src,
                Kind::Data(AppData::DnsResponse(fields)),
            ),
            ReplyVia::UdpDatagram => Frame::new(
                self.cfg.address,
                src,
                Kind::UdpData(AppData::DnsResponse(fields)),
            ),
            ReplyVia::Bare => Frame::new(self.cfg.address, src, Kind::DnsResponse(fields)),
        };
        resp.priority = priority;
        if via == ReplyVia::TcpData {
            self.tcp.stamp(src, &mut resp);
        }
        self.send(resp, sim, net);
    }
}

impl Node for DnsServer {
    fn addr(&self) -> Addr {
        self.cfg.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, sim: &mut Simulator, _net: &mut Network) {
        self.reset_ev = Some(sim.schedule(
            sim.now().after(SWEEP_INTERVAL),
            NodeTimer {
                node: self.idx,
                timer: Timer::RateLimitReset,
            },
        ));
        info!(dns = %self.cfg.address, rate_limit = self.cfg.rate_limit, "DNS 服务器初始化完成");
    }

    fn on_frame(
        &mut self,
        frame: Frame,
        _arrival_gate: usize,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        if frame.dst != self.cfg.address && frame.dst != Addr::BROADCAST {
            debug!(dns = %self.cfg.address, dst = %frame.dst, "帧目的地址不是本机，丢弃");
            return;
        }
        let src = frame.src;
        let seq = frame.seq;
        let priority = frame.priority;

        match frame.kind {
            Kind::KeyExchange(kx) => {
                if self.keys.accept(src, &kx.public_key) {
                    let reply = self.keys.exchange_frame(src);
                    self.send(reply, sim, net);
                }
                info!(dns = %self.cfg.address, peer = %src, "密钥交换完成");
            }
            Kind::Syn(fields) => match self.tcp.on_syn(src, seq, &fields, sim.now()) {
                Some(syn_ack) => {
                    net.record(sim.now(), self.cfg.address, TraceKind::SynAckSent { peer: src.0 });
                    self.send(syn_ack, sim, net);
                }
                None => net.stats.bad_cookie_dropped += 1,
            },
            Kind::Ack => {
                if self.tcp.on_ack(src) == Some(true) {
                    info!(dns = %self.cfg.address, peer = %src, "TCP 连接建立");
                    net.record(
                        sim.now(),
                        self.cfg.address,
                        TraceKind::TcpEstablished { peer: src.0 },
                    );
                }
            }
            Kind::Data(AppData::DnsQuery(q)) => {
                self.answer_query(src, priority, q, ReplyVia::TcpData, sim, net);
            }
            Kind::DnsQuery(q) => {
                let via = match q.proto {
                    WireProto::Udp => ReplyVia::UdpDatagram,
                    WireProto::Tcp => ReplyVia::Bare,
                };
                self.answer_query(src, priority, q, via, sim, net);
            }
            Kind::UdpData(AppData::DnsQuery(q)) => {
                self.answer_query(src, priority, q, ReplyVia::UdpDatagram, sim, net);
            }
            Kind::Fin => match self.tcp.on_fin(src) {
                FinOutcome::Reply(fin) => {
                    self.send(fin, sim, net);
                    net.record(sim.now(), self.cfg.address, TraceKind::TcpClosed { peer: src.0 });
                }
                FinOutcome::Closed => {
                    net.record(sim.now(), self.cfg.address, TraceKind::TcpClosed { peer: src.0 });
                }
                FinOutcome::Unknown => debug!(dns = %self.cfg.address, %src, "未知对端的 FIN"),
            },
            other => {
                warn!(dns = %self.cfg.address, kind = other.name(), "预期外的帧，丢弃");
                net.stats.malformed_dropped += 1;
            }
        }
    }

    fn on_timer(&mut self, timer: Timer, sim: &mut Simulator, _net: &mut Network) {
        if let Timer::RateLimitReset = timer {
            self.limiter.reset();
            self.reset_ev = Some(sim.schedule(
                sim.now().after(SWEEP_INTERVAL),
                NodeTimer {
                    node: self.idx,
                    timer: Timer::RateLimitReset,
                },
            ));
        }
    }

    fn finish(&mut self, sim: &mut Simulator, _net: &mut Network) {
        if let Some(ev) = self.reset_ev.take() {
            sim.cancel(ev);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
