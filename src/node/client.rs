//! 客户端反应器
//!
//! 由启动定时器驱动的确定性请求链：先与 DNS 交换密钥并发出 DNS 查询
//! （按配置走 TCP 握手或 UDP），拿到应答后与 HTTP/数据库服务器交换
//! 密钥并依次发出 HTTP GET 与数据库查询；三步都完成后主动拆除所有
//! TCP 连接。SYN 发出 3 秒后重传检查会真正重发未确认的 SYN。

use super::Node;
use crate::config::{ClientConfig, ClientProtocol};
use crate::net::{
    Addr, AppData, DbQueryFields, DnsQueryFields, DnsResponseFields, Frame, HttpGetFields,
    HttpResponseFields, Kind, Network, NodeIdx, NodeTimer, Priority, Timer, TraceKind, WireProto,
};
use crate::proto::secure::KeyStore;
use crate::proto::tcp::{FinOutcome, TcpEndpoint, HANDSHAKE_TIMEOUT};
use crate::sim::{EventId, SimTime, Simulator};
use std::any::Any;
use tracing::{debug, info, warn};

const DB_QUERY_TEXT: &str = "SELECT * FROM users";

pub struct Client {
    idx: NodeIdx,
    name: String,
    cfg: ClientConfig,
    tcp: TcpEndpoint,
    keys: KeyStore,
    /// DNS 应答得到的 HTTP 服务器地址。
    http_addr: Option<Addr>,
    db_opened: bool,
    chain_done_at: Option<SimTime>,
    start_ev: Option<EventId>,
    retransmit_ev: Option<EventId>,
}

impl Client {
    pub fn new(idx: NodeIdx, cfg: ClientConfig) -> Client {
        let addr = cfg.address;
        Client {
            idx,
            name: format!("pc{}", addr.0),
            cfg,
            tcp: TcpEndpoint::new(addr),
            keys: KeyStore::new(addr),
            http_addr: None,
            db_opened: false,
            chain_done_at: None,
            start_ev: None,
            retransmit_ev: None,
        }
    }

    /// 请求链是否已完成（DB 响应已到）。
    pub fn chain_completed(&self) -> bool {
        self.chain_done_at.is_some()
    }

    pub fn chain_done_at(&self) -> Option<SimTime> {
        self.chain_done_at
    }

    pub fn resolved_http_addr(&self) -> Option<Addr> {
        self.http_addr
    }

    pub fn tcp(&self) -> &TcpEndpoint {
        &self.tcp
    }

    fn send(&self, frame: Frame, sim: &mut Simulator, net: &mut Network) {
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

    fn arm_retransmit(&mut self, sim: &mut Simulator) {
        if self.retransmit_ev.is_none() {
            self.retransmit_ev = Some(self.schedule(sim, HANDSHAKE_TIMEOUT, Timer::Retransmit));
        }
    }

    fn open_tcp(&mut self, peer: Addr, priority: Priority, sim: &mut Simulator, net: &mut Network) {
        let syn = self.tcp.active_open(peer, priority, sim.now());
        net.record(sim.now(), self.cfg.address, TraceKind::SynSent { peer: peer.0 });
        self.send(syn, sim, net);
        self.arm_retransmit(sim);
    }

    /// 把应用报文作为 TCP 数据段发出（打上 seq/ack 戳）。
    fn send_data(
        &mut self,
        peer: Addr,
        app: AppData,
        priority: Priority,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let mut frame = Frame::new(self.cfg.address, peer, Kind::Data(app)).with_priority(priority);
        self.tcp.stamp(peer, &mut frame);
        self.tcp.touch(peer, sim.now());
        self.send(frame, sim, net);
    }

    fn dns_query_fields(&self, proto: WireProto) -> DnsQueryFields {
        let (qname, encrypted) = match self.keys.encrypt_for(self.cfg.dns_addr, &self.cfg.dns_query)
        {
            Some(cipher) => (cipher, true),
            None => (self.cfg.dns_query.clone(), false),
        };
        DnsQueryFields {
            qname,
            proto,
            encrypted,
        }
    }

    fn http_get_fields(&self, peer: Addr) -> HttpGetFields {
        let (path, encrypted) = match self.keys.encrypt_for(peer, "/") {
            Some(cipher) => (cipher, true),
            None => ("/".to_string(), false),
        };
        HttpGetFields { path, encrypted }
    }

    fn db_query_fields(&self) -> DbQueryFields {
        let (query, encrypted) = match self.keys.encrypt_for(self.cfg.db_addr, DB_QUERY_TEXT) {
            Some(cipher) => (cipher, true),
            None => (DB_QUERY_TEXT.to_string(), false),
        };
        DbQueryFields { query, encrypted }
    }

    fn handle_start(&mut self, sim: &mut Simulator, net: &mut Network) {
        info!(client = %self.cfg.address, protocol = ?self.cfg.protocol, "请求链启动");
        // 第一步：与 DNS 交换密钥
        let kx = self.keys.exchange_frame(self.cfg.dns_addr);
        self.send(kx, sim, net);

        // 第二步：按协议发 DNS 查询
        match self.cfg.protocol {
            ClientProtocol::Udp | ClientProtocol::Auto => {
                let fields = self.dns_query_fields(WireProto::Udp);
                let frame = Frame::new(self.cfg.address, self.cfg.dns_addr, Kind::DnsQuery(fields))
                    .with_priority(Priority::High);
                self.send(frame, sim, net);
            }
            ClientProtocol::Tcp => {
                self.open_tcp(self.cfg.dns_addr, Priority::High, sim, net);
            }
        }
    }

    /// 握手完成：向对端发送本阶段的应用请求。
    fn on_connected(&mut self, peer: Addr, sim: &mut Simulator, net: &mut Network) {
        info!(client = %self.cfg.address, peer = %peer, "TCP 连接建立");
        net.record(
            sim.now(),
            self.cfg.address,
            TraceKind::TcpEstablished { peer: peer.0 },
        );
        if peer == self.cfg.dns_addr {
            let app = AppData::DnsQuery(self.dns_query_fields(WireProto::Tcp));
            self.send_data(peer, app, Priority::Normal, sim, net);
        } else if peer == self.cfg.db_addr {
            let app = AppData::DbQuery(self.db_query_fields());
            self.send_data(peer, app, Priority::Normal, sim, net);
        } else {
            let app = AppData::HttpGet(self.http_get_fields(peer));
            self.send_data(peer, app, Priority::Normal, sim, net);
        }
    }

    fn handle_dns_response(
        &mut self,
        src: Addr,
        fields: DnsResponseFields,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let qname = if fields.encrypted {
            self.keys
                .decrypt_from(src, &fields.qname)
                .unwrap_or(fields.qname)
        } else {
            fields.qname
        };
        let http_addr = fields.answer;
        info!(client = %self.cfg.address, %qname, answer = %http_addr, "DNS 解析完成");
        net.record(
            sim.now(),
            self.cfg.address,
            TraceKind::DnsResolved {
                answer: http_addr.0,
            },
        );
        self.http_addr = Some(http_addr);

        // 与 HTTP 服务器和数据库服务器交换密钥
        let kx_http = self.keys.exchange_frame(http_addr);
        self.send(kx_http, sim, net);
        let kx_db = self.keys.exchange_frame(self.cfg.db_addr);
        self.send(kx_db, sim, net);

        // 协议选择只影响 DNS 阶段；HTTP 与数据库都走可靠路径
        self.open_tcp(http_addr, Priority::Normal, sim, net);
    }

    fn handle_http_response(
        &mut self,
        src: Addr,
        fields: HttpResponseFields,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        if let Some(enc) = &fields.enc_data {
            if let Some(plain) = self.keys.decrypt_from(src, enc) {
                debug!(client = %self.cfg.address, %plain, "HTTP 载荷解密完成");
            }
        }
        info!(client = %self.cfg.address, bytes = fields.bytes, "收到 HTTP 响应");
        net.record(
            sim.now(),
            self.cfg.address,
            TraceKind::HttpCompleted {
                bytes: fields.bytes,
            },
        );

        // 链条第三步：打开数据库连接（只开一次）
        if !self.db_opened {
            self.db_opened = true;
            self.open_tcp(self.cfg.db_addr, Priority::Normal, sim, net);
        }
    }

    fn handle_db_response(
        &mut self,
        src: Addr,
        fields: crate::net::DbResponseFields,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let result = if fields.encrypted {
            self.keys
                .decrypt_from(src, &fields.result)
                .unwrap_or(fields.result)
        } else {
            fields.result
        };
        info!(
            client = %self.cfg.address,
            bytes = fields.bytes,
            transaction = fields.transaction_id,
            %result,
            "收到数据库响应，请求链完成"
        );
        net.record(
            sim.now(),
            self.cfg.address,
            TraceKind::DbCompleted {
                bytes: fields.bytes,
            },
        );
        net.record(sim.now(), self.cfg.address, TraceKind::ChainCompleted);
        self.chain_done_at = Some(sim.now());

        // 链条完成：主动拆除所有已建立的连接
        let peers: Vec<Addr> = self
            .tcp
            .connections()
            .filter(|c| c.state == crate::proto::tcp::TcpState::Established)
            .map(|c| c.remote)
            .collect();
        for peer in peers {
            if let Some(fin) = self.tcp.close(peer) {
                self.send(fin, sim, net);
            }
        }
    }

    fn handle_app(&mut self, src: Addr, app: AppData, sim: &mut Simulator, net: &mut Network) {
        match app {
            AppData::DnsResponse(f) => self.handle_dns_response(src, f, sim, net),
            AppData::HttpResponse(f) => self.handle_http_response(src, f, sim, net),
            AppData::DbResponse(f) => self.handle_db_response(src, f, sim, net),
            AppData::MailResponse(f) => {
                info!(client = %self.cfg.address, bytes = f.bytes, "收到邮件响应");
            }
            other => {
                warn!(client = %self.cfg.address, kind = ?other, "客户端收到预期外的应用报文");
                net.stats.malformed_dropped += 1;
            }
        }
    }
}

impl Node for Client {
    fn addr(&self) -> Addr {
        self.cfg.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, sim: &mut Simulator, _net: &mut Network) {
        let at = SimTime::from_secs_f64(self.cfg.start_at);
        self.start_ev = Some(sim.schedule(
            at,
            NodeTimer {
                node: self.idx,
                timer: Timer::Start,
            },
        ));
        info!(client = %self.cfg.address, start_at = self.cfg.start_at, "客户端初始化完成");
    }

    fn on_frame(
        &mut self,
        frame: Frame,
        _arrival_gate: usize,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        if frame.dst != self.cfg.address && frame.dst != Addr::BROADCAST {
            debug!(client = %self.cfg.address, dst = %frame.dst, "帧目的地址不是本机，丢弃");
            return;
        }
        let src = frame.src;
        let seq = frame.seq;

        match frame.kind {
            Kind::KeyExchange(kx) => {
                if self.keys.accept(src, &kx.public_key) {
                    let reply = self.keys.exchange_frame(src);
                    self.send(reply, sim, net);
                }
                info!(client = %self.cfg.address, peer = %src, "密钥交换完成");
            }
            Kind::SynAck(fields) => {
                if let Some(ack) = self.tcp.on_syn_ack(src, seq, &fields) {
                    self.send(ack, sim, net);
                    self.on_connected(src, sim, net);
                } else {
                    net.stats.bad_cookie_dropped += 1;
                }
            }
            Kind::Ack => {
                if self.tcp.on_ack(src).is_none() {
                    debug!(client = %self.cfg.address, %src, "未知对端的 ACK，丢弃");
                } else if let Some(conn) = self.tcp.get(src) {
                    debug!(client = %self.cfg.address, %src, cwnd = conn.cwnd, "收到 ACK");
                }
            }
            Kind::Data(app) => {
                // 可靠路径：先回 ACK 再处理载荷
                let mut ack =
                    Frame::new(self.cfg.address, src, Kind::Ack).with_priority(Priority::High);
                ack.ack = seq + 1;
                self.send(ack, sim, net);
                self.handle_app(src, app, sim, net);
            }
            Kind::UdpData(app) => self.handle_app(src, app, sim, net),
            Kind::DnsResponse(f) => self.handle_dns_response(src, f, sim, net),
            Kind::HttpResponse(f) => self.handle_http_response(src, f, sim, net),
            Kind::Fin => match self.tcp.on_fin(src) {
                FinOutcome::Reply(fin) => {
                    self.send(fin, sim, net);
                    net.record(sim.now(), self.cfg.address, TraceKind::TcpClosed { peer: src.0 });
                }
                FinOutcome::Closed => {
                    info!(client = %self.cfg.address, peer = %src, "连接拆除完成");
                    net.record(sim.now(), self.cfg.address, TraceKind::TcpClosed { peer: src.0 });
                }
                FinOutcome::Unknown => {
                    debug!(client = %self.cfg.address, %src, "未知对端的 FIN，丢弃");
                }
            },
            Kind::EncryptedData(f) => match self.keys.decrypt_from(src, &f.enc_data) {
                Some(plain) => info!(client = %self.cfg.address, %src, %plain, "收到并解密数据"),
                None => debug!(client = %self.cfg.address, %src, "无密钥，密文原样保留"),
            },
            other => {
                warn!(client = %self.cfg.address, kind = other.name(), "客户端收到预期外的帧");
                net.stats.malformed_dropped += 1;
            }
        }
    }

    fn on_timer(&mut self, timer: Timer, sim: &mut Simulator, net: &mut Network) {
        match timer {
            Timer::Start => {
                self.start_ev = None;
                self.handle_start(sim, net);
            }
            Timer::Retransmit => {
                self.retransmit_ev = None;
                for peer in self.tcp.syn_sent_peers() {
                    warn!(client = %self.cfg.address, %peer, "握手超时，重发 SYN");
                    if let Some(syn) = self.tcp.rebuild_syn(peer) {
                        self.send(syn, sim, net);
                    }
                }
                if self.tcp.any_syn_sent() {
                    self.arm_retransmit(sim);
                }
            }
            Timer::CongestionTimeout => {
                self.tcp.on_congestion_timeout();
                info!(client = %self.cfg.address, "拥塞超时，窗口回到慢启动");
            }
            other => debug!(client = %self.cfg.address, timer = ?other, "忽略不相关的定时器"),
        }
    }

    fn finish(&mut self, sim: &mut Simulator, _net: &mut Network) {
        if let Some(ev) = self.start_ev.take() {
            sim.cancel(ev);
        }
        if let Some(ev) = self.retransmit_ev.take() {
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
