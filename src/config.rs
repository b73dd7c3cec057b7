//! 节点配置
//!
//! 每种节点一个配置结构，字段名与场景描述里的键一致（camelCase），
//! 可从 JSON 反序列化，也可在代码里用 `Default` 起步改字段。

use crate::net::Addr;
use serde::{Deserialize, Serialize};

/// 客户端的请求协议选择。AUTO：DNS 走 UDP，其余走 TCP。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientProtocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "AUTO")]
    Auto,
}

/// 路由器控制平面的模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingProtocol {
    #[serde(rename = "OSPF-TE")]
    OspfTe,
    #[serde(rename = "RIP")]
    Rip,
    #[serde(rename = "STATIC")]
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub address: Addr,
    pub dns_addr: Addr,
    pub dns_query: String,
    pub protocol: ClientProtocol,
    /// 启动时刻（秒）。
    pub start_at: f64,
    /// 数据库服务器的固定地址。
    pub db_addr: Addr,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: Addr(1),
            dns_addr: Addr(2),
            dns_query: "www.example".to_string(),
            protocol: ClientProtocol::Udp,
            start_at: 0.1,
            db_addr: Addr(601),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsConfig {
    pub address: Addr,
    pub answer_addr: Addr,
    /// 每秒每来源允许的查询数。
    pub rate_limit: f64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            address: Addr(2),
            answer_addr: Addr(3),
            rate_limit: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub address: Addr,
    pub page_size_bytes: u64,
    /// 响应服务时间（秒）。
    pub service_time: f64,
    pub syn_rate_limit: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            address: Addr(3),
            page_size_bytes: 4096,
            service_time: 0.01,
            syn_rate_limit: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailConfig {
    pub address: Addr,
    pub mail_size_bytes: u64,
    pub service_time: f64,
    pub syn_rate_limit: f64,
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            address: Addr(4),
            mail_size_bytes: 2048,
            service_time: 0.01,
            syn_rate_limit: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbConfig {
    pub address: Addr,
    pub response_bytes: u64,
    /// 查询处理时间（秒）。
    pub query_time: f64,
    pub syn_rate_limit: f64,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            address: Addr(601),
            response_bytes: 8192,
            query_time: 0.02,
            syn_rate_limit: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    pub address: Addr,
    pub routing_protocol: RoutingProtocol,
    /// 静态路由：`dest:gate,dest:gate,...`。
    pub routes: String,
    pub ospf_hello_interval: f64,
    #[serde(rename = "ospfLSAInterval")]
    pub ospf_lsa_interval: f64,
    pub rip_update_interval: f64,
    pub syn_rate_limit: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            address: Addr(100),
            routing_protocol: RoutingProtocol::Static,
            routes: String::new(),
            ospf_hello_interval: 5.0,
            ospf_lsa_interval: 10.0,
            rip_update_interval: 5.0,
            syn_rate_limit: 100.0,
        }
    }
}
