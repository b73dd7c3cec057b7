//! 发送结束事件（驱动发送队列出队）

use super::addr::GateId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：某门完成一次序列化发送，在 depart 时刻触发，续传队头帧。
#[derive(Debug)]
pub struct EndOfTx {
    pub gate: GateId,
}

impl Event for EndOfTx {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let EndOfTx { gate } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_end_tx(gate, sim);
    }
}
