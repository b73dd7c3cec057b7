//! 协议模块
//!
//! TCP 端点状态机、SYN 防护、路由表与控制平面数据结构，
//! 以及密钥交换/加密直通。

pub mod limit;
pub mod ospf;
pub mod routing;
pub mod secure;
pub mod tcp;
