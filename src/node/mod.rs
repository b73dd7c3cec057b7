//! 节点反应器
//!
//! 每个节点是一个单线程反应器：收到定时自事件或到达的帧后运行到完成，
//! 发送只能经过网络的链路发送器。节点之间不共享状态。

use crate::net::{Frame, Network, Timer};
use crate::sim::Simulator;
use std::any::Any;

mod client;
mod database;
mod dns;
mod http;
mod mail;
mod router;
mod server;

pub use client::Client;
pub use database::DbServer;
pub use dns::DnsServer;
pub use http::HttpServer;
pub use mail::MailServer;
pub use router::Router;

/// 节点接口
pub trait Node: Send {
    /// 节点逻辑地址
    fn addr(&self) -> crate::net::Addr;

    /// 获取节点名称
    fn name(&self) -> &str;

    /// 拓扑建好后调用一次：安排初始定时器。
    fn initialize(&mut self, _sim: &mut Simulator, _net: &mut Network) {}

    /// 处理到达的帧。`arrival_gate` 是帧进来的局部门编号。
    fn on_frame(&mut self, frame: Frame, arrival_gate: usize, sim: &mut Simulator, net: &mut Network);

    /// 处理到期的自事件。
    fn on_timer(&mut self, _timer: Timer, _sim: &mut Simulator, _net: &mut Network) {}

    /// 某个输出门的发送器空闲（FIFO 已排空）时回调。
    fn on_gate_idle(&mut self, _gate: usize, _sim: &mut Simulator, _net: &mut Network) {}

    /// 仿真收尾：取消自己的定时器、释放持有的帧。
    fn finish(&mut self, _sim: &mut Simulator, _net: &mut Network) {}

    /// 测试/统计下钻用的动态类型访问。
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
