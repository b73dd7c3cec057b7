//! 三路由器三角拓扑（链路状态收敛场景）
//!
//! r10 - r11 - r12 两两相连；其中一条链路带宽可以压低，用来观察
//! TE 代价在各路由器数据库里的差异。

use crate::config::{RouterConfig, RoutingProtocol};
use crate::net::{Addr, NetWorld, NodeIdx};
use crate::node::Router;
use crate::sim::SimTime;

#[derive(Debug, Clone)]
pub struct OspfTriangleOpts {
    pub hello_interval: f64,
    pub lsa_interval: f64,
    /// r10-r11 链路带宽（bps）；压低它来制造高代价链路。
    pub slow_link_bps: u64,
    /// 其余链路带宽（bps）。
    pub fast_link_bps: u64,
    pub latency: SimTime,
}

impl Default for OspfTriangleOpts {
    fn default() -> Self {
        OspfTriangleOpts {
            hello_interval: 1.0,
            lsa_interval: 2.0,
            slow_link_bps: 10_000_000,
            fast_link_bps: 100_000_000,
            latency: SimTime::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OspfTriangle {
    pub r1: NodeIdx,
    pub r2: NodeIdx,
    pub r3: NodeIdx,
    pub r1_addr: Addr,
    pub r2_addr: Addr,
    pub r3_addr: Addr,
}

/// 门编号：r10: 0=r11(慢) 1=r12；r11: 0=r10(慢) 1=r12；r12: 0=r10 1=r11。
pub fn build_ospf_triangle(world: &mut NetWorld, opts: &OspfTriangleOpts) -> OspfTriangle {
    let mk_cfg = |addr: u32| RouterConfig {
        address: Addr(addr),
        routing_protocol: RoutingProtocol::OspfTe,
        routes: String::new(),
        ospf_hello_interval: opts.hello_interval,
        ospf_lsa_interval: opts.lsa_interval,
        ..RouterConfig::default()
    };

    let cfg1 = mk_cfg(10);
    let cfg2 = mk_cfg(11);
    let cfg3 = mk_cfg(12);
    let r1 = world.net.add_node(|idx| Box::new(Router::new(idx, cfg1)));
    let r2 = world.net.add_node(|idx| Box::new(Router::new(idx, cfg2)));
    let r3 = world.net.add_node(|idx| Box::new(Router::new(idx, cfg3)));

    world.net.connect(r1, r2, opts.latency, opts.slow_link_bps);
    world.net.connect(r1, r3, opts.latency, opts.fast_link_bps);
    world.net.connect(r2, r3, opts.latency, opts.fast_link_bps);

    OspfTriangle {
        r1,
        r2,
        r3,
        r1_addr: Addr(10),
        r2_addr: Addr(11),
        r3_addr: Addr(12),
    }
}
