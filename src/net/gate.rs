//! 门与信道
//!
//! 每个门对应一条单向点对点信道，并带有自己的发送序列化状态：
//! FIFO 发送队列加上至多一个"发送结束"定时事件。

use super::addr::{GateId, NodeIdx};
use super::frame::Frame;
use crate::sim::SimTime;
use std::collections::VecDeque;

/// 单向信道：传播时延、带宽与 busy-until 时刻。
#[derive(Debug)]
pub struct Channel {
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    pub busy_until: SimTime,
}

impl Channel {
    pub fn new(latency: SimTime, bandwidth_bps: u64) -> Channel {
        Channel {
            latency,
            bandwidth_bps,
            busy_until: SimTime::ZERO,
        }
    }

    /// 一帧在此信道上的序列化时延，向上取整到纳秒。
    ///
    /// 帧长是 u64 字节，`bits * 1e9` 最大约 2^97，中间量放在 u128
    /// 里不会溢出（2^67 位 × 2^30 纳秒/秒，再加一个 u64 的带宽）。
    /// 带宽为 0 的信道视为永远发不完。
    pub(crate) fn tx_time(&self, bytes: u64) -> SimTime {
        let Some(bps) = std::num::NonZeroU64::new(self.bandwidth_bps) else {
            return SimTime(u64::MAX / 2);
        };
        let bps = u128::from(bps.get());
        let bits = u128::from(bytes) * 8;
        let nanos = (bits * 1_000_000_000 + bps - 1) / bps;
        SimTime(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// 一个输出门：属主节点、对端、信道与发送器状态。
#[derive(Debug)]
pub struct Gate {
    pub from: NodeIdx,
    pub to: NodeIdx,
    /// 对端节点上与本门成对的反向门（用于确定到达门编号）。
    pub reverse: GateId,
    /// 本门在属主节点上的局部编号。
    pub local_index: usize,
    pub channel: Channel,
    /// 等待信道空闲的帧，严格按 FIFO 顺序上线。
    pub(crate) tx_fifo: VecDeque<Frame>,
    /// 是否已有一个在途的发送结束事件。不变式：每门同一时刻至多一帧在线。
    pub(crate) end_tx_scheduled: bool,
}

impl Gate {
    pub fn queued_frames(&self) -> usize {
        self.tx_fifo.len()
    }

    /// 发送器是否仍在忙：信道被占、发送结束事件在途或 FIFO 非空。
    pub fn is_busy(&self, now: SimTime) -> bool {
        self.channel.busy_until > now || self.end_tx_scheduled || !self.tx_fifo.is_empty()
    }
}
