//! 节点自事件（定时器）
//!
//! 反应器里的"等待"都表达为将来的自事件；到期后由 [`NodeTimer`]
//! 送回属主节点。处理函数自己判断操作是否仍然有效。

use super::addr::NodeIdx;
use super::frame::Frame;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 各节点用到的定时器种类。
#[derive(Debug)]
pub enum Timer {
    /// 客户端：按 startAt 启动请求链
    Start,
    /// 客户端：握手重传检查（SYN 后 3 秒）
    Retransmit,
    /// 拥塞超时
    CongestionTimeout,
    /// 每秒清零计数（路由器 SYN 限速、DNS 请求限速）
    RateLimitReset,
    /// 服务器：每秒清理 60 秒前的 SYN 记录
    SynFloodSweep,
    /// 服务器：从优先级响应队列取一条发送
    ProcessQueue,
    /// 延迟发送一帧（缩短后的服务时间到期）
    SendDeferred(Box<Frame>),
    /// 路由器：周期性 Hello
    OspfHello,
    /// 路由器：周期性 LSA 洪泛
    OspfLsa,
    /// 路由器：周期性 RIP 全表更新
    RipUpdate,
}

/// 事件：把到期的定时器交回节点。
#[derive(Debug)]
pub struct NodeTimer {
    pub node: NodeIdx,
    pub timer: Timer,
}

impl Event for NodeTimer {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let NodeTimer { node, timer } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.dispatch_timer(node, timer, sim);
    }
}
