//! 邮件服务器
//!
//! 结构与 HTTP 服务器相同，差别在服务时间系数（高优先级 0.7）与
//! 2ms 的队列出队间隔。

use super::server::ServerCore;
use super::Node;
use crate::config::MailConfig;
use crate::net::{
    Addr, AppData, Frame, Kind, MailRequestFields, MailResponseFields, Network, NodeIdx, Priority,
    Timer,
};
use crate::proto::tcp::TcpEndpoint;
use crate::sim::{SimTime, Simulator};
use std::any::Any;
use tracing::{debug, info, warn};

const DRAIN_INTERVAL: SimTime = SimTime(2_000_000);

pub struct MailServer {
    name: String,
    cfg: MailConfig,
    core: ServerCore,
}

impl MailServer {
    pub fn new(idx: NodeIdx, cfg: MailConfig) -> MailServer {
        let addr = cfg.address;
        MailServer {
            name: format!("mail{}", addr.0),
            core: ServerCore::new(
                idx,
                addr,
                "mail",
                cfg.syn_rate_limit,
                DRAIN_INTERVAL,
                TcpEndpoint::new(addr),
            ),
            cfg,
        }
    }

    pub fn tcp(&self) -> &TcpEndpoint {
        &self.core.tcp
    }

    fn handle_request(
        &mut self,
        src: Addr,
        priority: Priority,
        req: MailRequestFields,
        sim: &mut Simulator,
        _net: &mut Network,
    ) {
        info!(mail = %self.cfg.address, %src, encrypted = req.encrypted, "收到邮件请求");

        let fields = MailResponseFields {
            bytes: self.cfg.mail_size_bytes,
            enc_data: self.core.keys.encrypt_for(src, "MAIL_CONTENT"),
        };
        let mut resp = Frame::new(
            self.cfg.address,
            src,
            Kind::Data(AppData::MailResponse(fields)),
        );
        resp.priority = priority;
        self.core.tcp.stamp(src, &mut resp);
        self.core
            .dispatch_response(resp, self.cfg.service_time, 0.7, sim);
    }
}

impl Node for MailServer {
    fn addr(&self) -> Addr {
        self.cfg.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, sim: &mut Simulator, _net: &mut Network) {
        self.core.initialize(sim);
    }

    fn on_frame(
        &mut self,
        frame: Frame,
        _arrival_gate: usize,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        if frame.dst != self.cfg.address && frame.dst != Addr::BROADCAST {
            debug!(mail = %self.cfg.address, dst = %frame.dst, "帧目的地址不是本机，丢弃");
            return;
        }
        let src = frame.src;
        let seq = frame.seq;
        let priority = frame.priority;

        match frame.kind {
            Kind::KeyExchange(kx) => self.core.handle_key_exchange(src, &kx.public_key, sim, net),
            Kind::Syn(fields) => self.core.handle_syn(src, seq, &fields, sim, net),
            Kind::Ack => self.core.handle_ack(src, sim, net),
            Kind::Data(AppData::MailRequest(req)) => {
                self.handle_request(src, priority, req, sim, net);
            }
            Kind::MailRequest(req) => {
                self.handle_request(src, priority, req, sim, net);
            }
            Kind::Data(_) => {
                let mut ack =
                    Frame::new(self.cfg.address, src, Kind::Ack).with_priority(Priority::High);
                ack.ack = seq + 1;
                self.core.send(ack, sim, net);
            }
            Kind::Fin => self.core.handle_fin(src, sim, net),
            other => {
                warn!(mail = %self.cfg.address, kind = other.name(), "预期外的帧，丢弃");
                net.stats.malformed_dropped += 1;
            }
        }
    }

    fn on_timer(&mut self, timer: Timer, sim: &mut Simulator, net: &mut Network) {
        match timer {
            Timer::SynFloodSweep => self.core.on_sweep(sim),
            Timer::ProcessQueue => self.core.on_process_queue(sim, net),
            Timer::SendDeferred(frame) => self.core.send(*frame, sim, net),
            other => debug!(mail = %self.cfg.address, timer = ?other, "忽略不相关的定时器"),
        }
    }

    fn finish(&mut self, sim: &mut Simulator, _net: &mut Network) {
        self.core.finish(sim);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
