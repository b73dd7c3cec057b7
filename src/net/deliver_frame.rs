//! 帧交付事件
//!
//! 帧经过传输时延 + 传播时延后到达对端节点。

use super::addr::NodeIdx;
use super::frame::Frame;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：把一帧交给某个节点处理。
#[derive(Debug)]
pub struct DeliverFrame {
    pub to: NodeIdx,
    /// 帧在接收节点上的到达门（局部编号）。
    pub arrival_gate: usize,
    pub frame: Frame,
}

impl Event for DeliverFrame {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverFrame {
            to,
            arrival_gate,
            frame,
        } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.deliver(to, arrival_gate, frame, sim);
    }
}
