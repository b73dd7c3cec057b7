//! TCP（简化版）端点状态机
//!
//! 每个端点维护一张 按对端地址 的连接表：三次握手（带 SYN cookie）、
//! 建立后的数据收发与 AIMD 拥塞窗口、FIN 拆除。序列号按帧递增而不是
//! 按字节（仿真简化，场景以此为准）。
//!
//! cookie 是 (src, dst, 初始序列号, 进程级密钥) 混合后的低 24 位，
//! 高位偷放序列号本身；校验只比较低 24 位。校验失败静默丢弃。

use crate::net::{Addr, Frame, Kind, Priority, SynAckFields, SynFields};
use crate::sim::SimTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 进程级 cookie 密钥。
const COOKIE_SECRET: u64 = 0x5EED;

/// 握手重传检查间隔：SYN 之后 3 秒。
pub const HANDSHAKE_TIMEOUT: SimTime = SimTime(3_000_000_000);

/// 生成 SYN cookie：XOR 折叠取低 24 位，高位偷放 seq。
pub fn syn_cookie(src: Addr, dst: Addr, seq: u64) -> u64 {
    ((src.0 as u64 ^ dst.0 as u64 ^ seq ^ COOKIE_SECRET) & 0xFF_FFFF) | (seq << 24)
}

/// 校验：低 24 位必须与重新计算的 cookie 一致。
pub fn validate_syn_cookie(cookie: u64, src: Addr, dst: Addr, seq: u64) -> bool {
    (cookie & 0xFF_FFFF) == (syn_cookie(src, dst, seq) & 0xFF_FFFF)
}

/// 连接状态机的状态集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait,
    CloseWait,
    Closing,
    TimeWait,
}

/// 每个对端一条记录。拥塞窗口存在连接里，没有旁路副本。
#[derive(Debug, Clone)]
pub struct Connection {
    pub remote: Addr,
    pub state: TcpState,
    pub send_seq: u64,
    pub recv_seq: u64,
    /// 主动打开时的初始序列号，握手重传要原样重发。
    pub initial_seq: u64,
    pub cwnd: f64,
    pub ssthresh: f64,
    pub dup_acks: u32,
    pub last_sent: SimTime,
}

/// 收到 FIN 的处理结果。
#[derive(Debug)]
pub enum FinOutcome {
    /// 被动关闭：回一个 FIN，连接已删除。
    Reply(Frame),
    /// 主动关闭方收到对端 FIN：连接删除，不再回帧。
    Closed,
    /// 没有这个对端的连接（记录后丢弃）。
    Unknown,
}

/// 一个节点的 TCP 端点：连接表 + 初始窗口参数 + 确定性随机源。
#[derive(Debug)]
pub struct TcpEndpoint {
    local: Addr,
    init_cwnd: f64,
    init_ssthresh: f64,
    conns: HashMap<Addr, Connection>,
    rng: StdRng,
}

impl TcpEndpoint {
    pub fn new(local: Addr) -> TcpEndpoint {
        TcpEndpoint::with_initial_window(local, 1.0, 64.0)
    }

    /// 数据库服务器用更大的初始窗口（cwnd=2.0 / ssthresh=128.0）。
    pub fn with_initial_window(local: Addr, init_cwnd: f64, init_ssthresh: f64) -> TcpEndpoint {
        TcpEndpoint {
            local,
            init_cwnd,
            init_ssthresh,
            conns: HashMap::new(),
            rng: StdRng::seed_from_u64(local.0 as u64),
        }
    }

    pub fn local(&self) -> Addr {
        self.local
    }

    pub fn get(&self, peer: Addr) -> Option<&Connection> {
        self.conns.get(&peer)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.conns.values()
    }

    pub fn established(&self, peer: Addr) -> bool {
        matches!(
            self.conns.get(&peer),
            Some(c) if c.state == TcpState::Established
        )
    }

    pub fn any_syn_sent(&self) -> bool {
        self.conns.values().any(|c| c.state == TcpState::SynSent)
    }

    fn draw_iss(&mut self) -> u64 {
        self.rng.gen_range(1000..=9999)
    }

    /// 主动打开：closed -> syn_sent，返回要发出的 SYN 帧。
    pub fn active_open(&mut self, peer: Addr, priority: Priority, now: SimTime) -> Frame {
        let iss = self.draw_iss();
        let mut syn = Frame::new(
            self.local,
            peer,
            Kind::Syn(SynFields {
                cookie: syn_cookie(self.local, peer, iss),
            }),
        )
        .with_priority(priority);
        syn.seq = iss;

        self.conns.insert(
            peer,
            Connection {
                remote: peer,
                state: TcpState::SynSent,
                send_seq: iss + 1,
                recv_seq: 0,
                initial_seq: iss,
                cwnd: self.init_cwnd,
                ssthresh: self.init_ssthresh,
                dup_acks: 0,
                last_sent: now,
            },
        );
        debug!(local = %self.local, peer = %peer, iss, "主动打开，发送 SYN");
        syn
    }

    /// 为仍处于 syn_sent 的连接重建同一个 SYN（握手重传）。
    pub fn rebuild_syn(&self, peer: Addr) -> Option<Frame> {
        let conn = self.conns.get(&peer)?;
        if conn.state != TcpState::SynSent {
            return None;
        }
        let iss = conn.initial_seq;
        let mut syn = Frame::new(
            self.local,
            peer,
            Kind::Syn(SynFields {
                cookie: syn_cookie(self.local, peer, iss),
            }),
        )
        .with_priority(Priority::High);
        syn.seq = iss;
        Some(syn)
    }

    /// 处于 syn_sent 的连接集合（重传定时器遍历用）。
    pub fn syn_sent_peers(&self) -> Vec<Addr> {
        self.conns
            .values()
            .filter(|c| c.state == TcpState::SynSent)
            .map(|c| c.remote)
            .collect()
    }

    /// 被动端收到 SYN：listen -> syn_received。
    ///
    /// cookie 校验失败返回 `None`（调用方静默丢弃，不回帧）。
    pub fn on_syn(&mut self, src: Addr, seq: u64, fields: &SynFields, now: SimTime) -> Option<Frame> {
        if !validate_syn_cookie(fields.cookie, src, self.local, seq) {
            warn!(local = %self.local, src = %src, "SYN cookie 无效，丢弃");
            return None;
        }

        let iss = self.draw_iss();
        let mut syn_ack = Frame::new(
            self.local,
            src,
            Kind::SynAck(SynAckFields {
                cookie: syn_cookie(self.local, src, iss),
            }),
        )
        .with_priority(Priority::High);
        syn_ack.seq = iss;
        syn_ack.ack = seq + 1;

        self.conns.insert(
            src,
            Connection {
                remote: src,
                state: TcpState::SynReceived,
                send_seq: iss + 1,
                recv_seq: seq + 1,
                initial_seq: iss,
                cwnd: self.init_cwnd,
                ssthresh: self.init_ssthresh,
                dup_acks: 0,
                last_sent: now,
            },
        );
        Some(syn_ack)
    }

    /// 主动端收到 SYN-ACK：syn_sent -> established，返回要发出的 ACK。
    /// cookie 无效或状态不符时返回 `None`。
    pub fn on_syn_ack(&mut self, src: Addr, seq: u64, fields: &SynAckFields) -> Option<Frame> {
        let conn = self.conns.get_mut(&src)?;
        if conn.state != TcpState::SynSent {
            debug!(local = %self.local, peer = %src, state = ?conn.state, "忽略状态不符的 SYN-ACK");
            return None;
        }
        if !validate_syn_cookie(fields.cookie, src, self.local, seq) {
            warn!(local = %self.local, src = %src, "SYN-ACK cookie 无效，丢弃");
            return None;
        }

        conn.state = TcpState::Established;
        conn.recv_seq = seq + 1;

        let mut ack = Frame::new(self.local, src, Kind::Ack).with_priority(Priority::High);
        ack.seq = conn.send_seq;
        ack.ack = seq + 1;
        Some(ack)
    }

    /// 收到 ACK：syn_received 的连接转入 established；已建立的连接按
    /// 慢启动（翻倍）/ 拥塞避免（+1/cwnd）增窗。返回是否刚刚建立；
    /// 未知对端返回 `None`。
    pub fn on_ack(&mut self, peer: Addr) -> Option<bool> {
        let conn = self.conns.get_mut(&peer)?;
        let mut newly_established = false;
        if conn.state == TcpState::SynReceived {
            conn.state = TcpState::Established;
            newly_established = true;
        }
        if conn.state == TcpState::Established {
            if conn.cwnd < conn.ssthresh {
                conn.cwnd *= 2.0;
            } else {
                conn.cwnd += 1.0 / conn.cwnd;
            }
            conn.dup_acks = 0;
        }
        Some(newly_established)
    }

    /// 拥塞超时：所有连接 ssthresh 减半、cwnd 回 1.0。
    pub fn on_congestion_timeout(&mut self) {
        for conn in self.conns.values_mut() {
            conn.ssthresh = conn.cwnd / 2.0;
            conn.cwnd = 1.0;
            conn.dup_acks = 0;
        }
    }

    /// 给数据帧打戳：seq=当前发送序号（随后 +1）、ack=当前接收序号。
    /// 没有对应连接时帧保持原样并返回 `false`。
    pub fn stamp(&mut self, peer: Addr, frame: &mut Frame) -> bool {
        let Some(conn) = self.conns.get_mut(&peer) else {
            return false;
        };
        frame.seq = conn.send_seq;
        frame.ack = conn.recv_seq;
        conn.send_seq += 1;
        true
    }

    /// 记录一次发送时刻。
    pub fn touch(&mut self, peer: Addr, now: SimTime) {
        if let Some(conn) = self.conns.get_mut(&peer) {
            conn.last_sent = now;
        }
    }

    /// 主动关闭：established -> fin_wait，返回要发出的 FIN。
    pub fn close(&mut self, peer: Addr) -> Option<Frame> {
        let conn = self.conns.get_mut(&peer)?;
        if conn.state != TcpState::Established {
            return None;
        }
        conn.state = TcpState::FinWait;
        let mut fin = Frame::new(self.local, peer, Kind::Fin);
        fin.seq = conn.send_seq;
        conn.send_seq += 1;
        Some(fin)
    }

    /// 收到 FIN：被动方回 FIN 并删除连接；fin_wait 的主动方删除连接
    /// 不再回帧（避免 FIN 往返不止）。
    pub fn on_fin(&mut self, peer: Addr) -> FinOutcome {
        match self.conns.remove(&peer) {
            None => FinOutcome::Unknown,
            Some(conn) if conn.state == TcpState::FinWait => FinOutcome::Closed,
            Some(_) => {
                let fin = Frame::new(self.local, peer, Kind::Fin);
                FinOutcome::Reply(fin)
            }
        }
    }
}
