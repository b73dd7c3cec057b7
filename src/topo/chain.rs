//! 四路由器链式拓扑（距离向量场景）
//!
//! r20 - r21 - r22 - r23 依次相连，全部跑 RIP；最远端的 r23 挂一条
//! 指向目的地址 999 的静态路由（下游没有真实节点，场景只关心表项
//! 的传播与跳数上限）。

use crate::config::{RouterConfig, RoutingProtocol};
use crate::net::{Addr, NetWorld, NodeIdx};
use crate::node::Router;
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy)]
pub struct RipChain {
    pub routers: [NodeIdx; 4],
    pub addrs: [Addr; 4],
    /// 远端通告的目的地址。
    pub far_dest: Addr,
}

pub fn build_rip_chain(world: &mut NetWorld, update_interval: f64) -> RipChain {
    let far_dest = Addr(999);
    let mut routers = Vec::with_capacity(4);
    let mut addrs = Vec::with_capacity(4);
    for i in 0..4u32 {
        let addr = Addr(20 + i);
        let cfg = RouterConfig {
            address: addr,
            routing_protocol: RoutingProtocol::Rip,
            // r23 有一条通往 999 的本地路由（门 1 在只有一条上游链路时
            // 并不存在，表项只用于通告传播）
            routes: if i == 3 {
                format!("{}:1", far_dest.0)
            } else {
                String::new()
            },
            rip_update_interval: update_interval,
            ..RouterConfig::default()
        };
        let idx = world.net.add_node(|idx| Box::new(Router::new(idx, cfg)));
        routers.push(idx);
        addrs.push(addr);
    }
    let lat = SimTime::from_millis(1);
    let bw = 100_000_000;
    world.net.connect(routers[0], routers[1], lat, bw);
    world.net.connect(routers[1], routers[2], lat, bw);
    world.net.connect(routers[2], routers[3], lat, bw);

    RipChain {
        routers: [routers[0], routers[1], routers[2], routers[3]],
        addrs: [addrs[0], addrs[1], addrs[2], addrs[3]],
        far_dest,
    }
}
