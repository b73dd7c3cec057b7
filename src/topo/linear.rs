//! 请求链场景拓扑
//!
//! 拓扑结构：pc1 - r100 - r101 - {dns2, http3, db601}
//! 客户端的每一帧都要跨过两台路由器；两台路由器用静态路由，
//! 地址与场景描述一致（客户端 1、DNS 2、HTTP 3、数据库 601）。

use crate::config::{
    ClientConfig, ClientProtocol, DbConfig, DnsConfig, HttpConfig, RouterConfig, RoutingProtocol,
};
use crate::net::{Addr, NetWorld, NodeIdx};
use crate::node::{Client, DbServer, DnsServer, HttpServer, Router};
use crate::sim::SimTime;

#[derive(Debug, Clone)]
pub struct RequestChainOpts {
    pub protocol: ClientProtocol,
    pub start_at: f64,
    pub dns_query: String,
    /// 链路带宽（bps）。
    pub bandwidth_bps: u64,
    /// 单向传播时延。
    pub latency: SimTime,
}

impl Default for RequestChainOpts {
    fn default() -> Self {
        RequestChainOpts {
            protocol: ClientProtocol::Udp,
            start_at: 0.1,
            dns_query: "www.example".to_string(),
            bandwidth_bps: 100_000_000,
            latency: SimTime::from_millis(1),
        }
    }
}

/// 构建好的请求链拓扑的各节点索引。
#[derive(Debug, Clone, Copy)]
pub struct RequestChainTopo {
    pub client: NodeIdx,
    pub r1: NodeIdx,
    pub r2: NodeIdx,
    pub dns: NodeIdx,
    pub http: NodeIdx,
    pub db: NodeIdx,
    pub client_addr: Addr,
    pub dns_addr: Addr,
    pub http_addr: Addr,
    pub db_addr: Addr,
}

/// 构建请求链场景。连线顺序决定门编号：
/// r100: 0=客户端 1=r101；r101: 0=r100 1=dns 2=http 3=db。
pub fn build_request_chain(world: &mut NetWorld, opts: &RequestChainOpts) -> RequestChainTopo {
    let client_addr = Addr(1);
    let dns_addr = Addr(2);
    let http_addr = Addr(3);
    let db_addr = Addr(601);

    let client_cfg = ClientConfig {
        address: client_addr,
        dns_addr,
        dns_query: opts.dns_query.clone(),
        protocol: opts.protocol,
        start_at: opts.start_at,
        db_addr,
    };
    let client = world.net.add_node(|idx| Box::new(Client::new(idx, client_cfg)));

    let r1_cfg = RouterConfig {
        address: Addr(100),
        routing_protocol: RoutingProtocol::Static,
        routes: "1:0,2:1,3:1,601:1".to_string(),
        ..RouterConfig::default()
    };
    let r1 = world.net.add_node(|idx| Box::new(Router::new(idx, r1_cfg)));

    let r2_cfg = RouterConfig {
        address: Addr(101),
        routing_protocol: RoutingProtocol::Static,
        routes: "1:0,2:1,3:2,601:3".to_string(),
        ..RouterConfig::default()
    };
    let r2 = world.net.add_node(|idx| Box::new(Router::new(idx, r2_cfg)));

    let dns = world.net.add_node(|idx| {
        Box::new(DnsServer::new(
            idx,
            DnsConfig {
                address: dns_addr,
                answer_addr: http_addr,
                ..DnsConfig::default()
            },
        ))
    });
    let http = world.net.add_node(|idx| {
        Box::new(HttpServer::new(
            idx,
            HttpConfig {
                address: http_addr,
                ..HttpConfig::default()
            },
        ))
    });
    let db = world.net.add_node(|idx| {
        Box::new(DbServer::new(
            idx,
            DbConfig {
                address: db_addr,
                ..DbConfig::default()
            },
        ))
    });

    let lat = opts.latency;
    let bw = opts.bandwidth_bps;
    world.net.connect(client, r1, lat, bw);
    world.net.connect(r1, r2, lat, bw);
    world.net.connect(r2, dns, lat, bw);
    world.net.connect(r2, http, lat, bw);
    world.net.connect(r2, db, lat, bw);

    RequestChainTopo {
        client,
        r1,
        r2,
        dns,
        http,
        db,
        client_addr,
        dns_addr,
        http_addr,
        db_addr,
    }
}
