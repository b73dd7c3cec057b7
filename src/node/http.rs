//! HTTP 服务器
//!
//! GET 请求按优先级分流：高优先级在 serviceTime×0.5 后直接发送，
//! 其余进优先级队列按 1ms 一条出队；UDP 快速路径固定 serviceTime×0.3。

use super::server::ServerCore;
use super::Node;
use crate::config::HttpConfig;
use crate::net::{
    Addr, AppData, Frame, HttpGetFields, HttpResponseFields, Kind, Network, NodeIdx, Priority,
    Timer,
};
use crate::proto::tcp::TcpEndpoint;
use crate::sim::{SimTime, Simulator};
use std::any::Any;
use tracing::{debug, info, warn};

/// 低优先级响应的出队间隔：1 毫秒。
const DRAIN_INTERVAL: SimTime = SimTime(1_000_000);

/// 请求进来的路径，决定响应帧的形态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestVia {
    TcpData,
    UdpDatagram,
    Bare,
}

pub struct HttpServer {
    name: String,
    cfg: HttpConfig,
    core: ServerCore,
}

impl HttpServer {
    pub fn new(idx: NodeIdx, cfg: HttpConfig) -> HttpServer {
        let addr = cfg.address;
        HttpServer {
            name: format!("http{}", addr.0),
            core: ServerCore::new(
                idx,
                addr,
                "http",
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

    /// SYN 防护当前追踪的来源数（清扫观测用）。
    pub fn tracked_syn_sources(&self) -> usize {
        self.core.guard.tracked_sources()
    }

    fn handle_get(
        &mut self,
        src: Addr,
        priority: Priority,
        get: HttpGetFields,
        via: RequestVia,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let path = if get.encrypted {
            self.core.keys.decrypt_from(src, &get.path).unwrap_or(get.path)
        } else {
            get.path
        };
        info!(http = %self.cfg.address, %path, %src, via = ?via, "收到 GET 请求");

        let fields = HttpResponseFields {
            bytes: self.cfg.page_size_bytes,
            enc_data: self.core.keys.encrypt_for(src, "HTTP_DATA"),
        };
        let mut resp = match via {
            RequestVia::TcpData => Frame::new(
                self.cfg.address,
                src,
                Kind::Data(AppData::HttpResponse(fields)),
            ),
            RequestVia::UdpDatagram => Frame::new(
                self.cfg.address,
                src,
                Kind::UdpData(AppData::HttpResponse(fields)),
            ),
            RequestVia::Bare => Frame::new(self.cfg.address, src, Kind::HttpResponse(fields)),
        };
        resp.priority = priority;
        if via == RequestVia::TcpData {
            self.core.tcp.stamp(src, &mut resp);
        }

        if via == RequestVia::UdpDatagram {
            // UDP 快速路径：不排队，缩短到 0.3 倍服务时间
            let delay = SimTime::from_secs_f64(self.cfg.service_time * 0.3);
            self.core.send_after(resp, delay, sim);
        } else {
            self.core
                .dispatch_response(resp, self.cfg.service_time, 0.5, sim);
        }
    }
}

impl Node for HttpServer {
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
            debug!(http = %self.cfg.address, dst = %frame.dst, "帧目的地址不是本机，丢弃");
            return;
        }
        let src = frame.src;
        let seq = frame.seq;
        let priority = frame.priority;

        match frame.kind {
            Kind::KeyExchange(kx) => self.core.handle_key_exchange(src, &kx.public_key, sim, net),
            Kind::Syn(fields) => self.core.handle_syn(src, seq, &fields, sim, net),
            Kind::Ack => self.core.handle_ack(src, sim, net),
            Kind::Data(AppData::HttpGet(get)) => {
                self.handle_get(src, priority, get, RequestVia::TcpData, sim, net);
            }
            Kind::Data(_) => {
                // 非 GET 的数据段只做确认
                let mut ack =
                    Frame::new(self.cfg.address, src, Kind::Ack).with_priority(Priority::High);
                ack.ack = seq + 1;
                self.core.send(ack, sim, net);
            }
            Kind::HttpGet(get) => {
                self.handle_get(src, priority, get, RequestVia::Bare, sim, net);
            }
            Kind::UdpData(AppData::HttpGet(get)) => {
                self.handle_get(src, priority, get, RequestVia::UdpDatagram, sim, net);
            }
            Kind::Fin => self.core.handle_fin(src, sim, net),
            other => {
                warn!(http = %self.cfg.address, kind = other.name(), "预期外的帧，丢弃");
                net.stats.malformed_dropped += 1;
            }
        }
    }

    fn on_timer(&mut self, timer: Timer, sim: &mut Simulator, net: &mut Network) {
        match timer {
            Timer::SynFloodSweep => self.core.on_sweep(sim),
            Timer::ProcessQueue => self.core.on_process_queue(sim, net),
            Timer::SendDeferred(frame) => self.core.send(*frame, sim, net),
            other => debug!(http = %self.cfg.address, timer = ?other, "忽略不相关的定时器"),
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
