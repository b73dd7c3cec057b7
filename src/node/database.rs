//! 数据库服务器
//!
//! 初始窗口比其他服务器大（cwnd=2.0 / ssthresh=128.0，既定策略），
//! 按客户端维护活跃事务计数并打进响应。高优先级查询在 queryTime×0.5
//! 之后发出（单次派发），其余排队按 1ms 一条出队。

use super::server::ServerCore;
use super::Node;
use crate::config::DbConfig;
use crate::net::{
    Addr, AppData, DbQueryFields, DbResponseFields, Frame, Kind, Network, NodeIdx, Priority, Timer,
};
use crate::proto::tcp::TcpEndpoint;
use crate::sim::{SimTime, Simulator};
use std::any::Any;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const DRAIN_INTERVAL: SimTime = SimTime(1_000_000);

pub struct DbServer {
    name: String,
    cfg: DbConfig,
    core: ServerCore,
    /// 客户端 -> 活跃事务计数。
    transactions: HashMap<Addr, u64>,
}

impl DbServer {
    pub fn new(idx: NodeIdx, cfg: DbConfig) -> DbServer {
        let addr = cfg.address;
        DbServer {
            name: format!("db{}", addr.0),
            core: ServerCore::new(
                idx,
                addr,
                "db",
                cfg.syn_rate_limit,
                DRAIN_INTERVAL,
                TcpEndpoint::with_initial_window(addr, 2.0, 128.0),
            ),
            cfg,
            transactions: HashMap::new(),
        }
    }

    pub fn tcp(&self) -> &TcpEndpoint {
        &self.core.tcp
    }

    pub fn active_transactions(&self, client: Addr) -> u64 {
        self.transactions.get(&client).copied().unwrap_or(0)
    }

    fn handle_query(
        &mut self,
        src: Addr,
        priority: Priority,
        query: DbQueryFields,
        sim: &mut Simulator,
        _net: &mut Network,
    ) {
        let text = if query.encrypted {
            self.core
                .keys
                .decrypt_from(src, &query.query)
                .unwrap_or(query.query)
        } else {
            query.query
        };
        let txn = self.transactions.entry(src).or_insert(0);
        *txn += 1;
        let txn = *txn;
        info!(db = %self.cfg.address, %src, %text, transaction = txn, "收到数据库查询");

        let (result, encrypted) = match self.core.keys.encrypt_for(src, "DATABASE_QUERY_RESULT") {
            Some(cipher) => (cipher, true),
            None => ("DATABASE_QUERY_RESULT".to_string(), false),
        };
        let fields = DbResponseFields {
            bytes: self.cfg.response_bytes,
            result,
            transaction_id: txn,
            encrypted,
        };
        let mut resp = Frame::new(
            self.cfg.address,
            src,
            Kind::Data(AppData::DbResponse(fields)),
        );
        resp.priority = priority;
        self.core.tcp.stamp(src, &mut resp);

        // 高优先级查询只派发一次：在缩短后的 queryTime 之后发送
        self.core
            .dispatch_response(resp, self.cfg.query_time, 0.5, sim);
    }
}

impl Node for DbServer {
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
            debug!(db = %self.cfg.address, dst = %frame.dst, "帧目的地址不是本机，丢弃");
            return;
        }
        let src = frame.src;
        let seq = frame.seq;
        let priority = frame.priority;

        match frame.kind {
            Kind::KeyExchange(kx) => self.core.handle_key_exchange(src, &kx.public_key, sim, net),
            Kind::Syn(fields) => self.core.handle_syn(src, seq, &fields, sim, net),
            Kind::Ack => self.core.handle_ack(src, sim, net),
            Kind::Data(AppData::DbQuery(query)) => {
                self.handle_query(src, priority, query, sim, net);
            }
            Kind::DbQuery(query) => {
                self.handle_query(src, priority, query, sim, net);
            }
            Kind::Data(_) => {
                let mut ack =
                    Frame::new(self.cfg.address, src, Kind::Ack).with_priority(Priority::High);
                ack.ack = seq + 1;
                self.core.send(ack, sim, net);
            }
            Kind::Fin => {
                self.transactions.remove(&src);
                self.core.handle_fin(src, sim, net);
            }
            other => {
                warn!(db = %self.cfg.address, kind = other.name(), "预期外的帧，丢弃");
                net.stats.malformed_dropped += 1;
            }
        }
    }

    fn on_timer(&mut self, timer: Timer, sim: &mut Simulator, net: &mut Network) {
        match timer {
            Timer::SynFloodSweep => self.core.on_sweep(sim),
            Timer::ProcessQueue => self.core.on_process_queue(sim, net),
            Timer::SendDeferred(frame) => self.core.send(*frame, sim, net),
            other => debug!(db = %self.cfg.address, timer = ?other, "忽略不相关的定时器"),
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
