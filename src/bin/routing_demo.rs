//! 路由控制平面演示
//!
//! ospf 模式：三角拓扑上跑 OSPF-TE，打印各路由器链路状态库与路由表。
//! rip 模式：四路由器链上跑 RIP，打印距离向量传播后的路由表。

use clap::Parser;
use hybsim_rs::net::{NetWorld, NodeIdx};
use hybsim_rs::node::{Node, Router};
use hybsim_rs::sim::{SimTime, Simulator};
use hybsim_rs::topo::{build_ospf_triangle, build_rip_chain, OspfTriangleOpts};

#[derive(Debug, Parser)]
#[command(name = "routing-demo", about = "路由协议演示：OSPF-TE 三角 / RIP 链")]
struct Args {
    /// 控制平面：ospf / rip
    #[arg(long, default_value = "ospf")]
    mode: String,

    /// 仿真运行到多少秒
    #[arg(long, default_value_t = 10)]
    until_secs: u64,
}

fn dump_router(world: &NetWorld, idx: NodeIdx) {
    let router = world
        .net
        .node(idx)
        .as_any()
        .downcast_ref::<Router>()
        .expect("router node");
    println!("router {}:", router.addr());
    for rec in router.link_state_db().records() {
        println!(
            "  lsa origin={} link={} cost={:.4} bw={:.1} neighbor={}",
            rec.origin, rec.link_id, rec.cost, rec.bandwidth, rec.neighbor
        );
    }
    for entry in router.routing_table().iter() {
        println!(
            "  route dest={} gate={} metric={:.4} hops={}",
            entry.dest, entry.next_hop, entry.metric, entry.hop_count
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();

    match args.mode.as_str() {
        "rip" => {
            let chain = build_rip_chain(&mut world, 1.0);
            world.net.initialize_all(&mut sim);
            sim.run_until(SimTime::from_secs(args.until_secs), &mut world);
            world.net.finish_all(&mut sim);
            for idx in chain.routers {
                dump_router(&world, idx);
            }
        }
        _ => {
            let tri = build_ospf_triangle(&mut world, &OspfTriangleOpts::default());
            world.net.initialize_all(&mut sim);
            sim.run_until(SimTime::from_secs(args.until_secs), &mut world);
            world.net.finish_all(&mut sim);
            for idx in [tri.r1, tri.r2, tri.r3] {
                dump_router(&world, idx);
            }
        }
    }
    println!("done @ {:?}", sim.now());
}
