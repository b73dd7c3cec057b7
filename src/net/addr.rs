//! 标识符类型
//!
//! 定义节点逻辑地址与内部索引。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 节点逻辑地址（32 位，仿真期内唯一）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Addr(pub u32);

impl Addr {
    /// 路由协议帧的"发给所有邻居"目的地址。
    pub const BROADCAST: Addr = Addr(u32::MAX);
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Addr::BROADCAST {
            write!(f, "*")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// 节点在拓扑中的内部索引。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdx(pub usize);

/// 单向门（输出口）的全局标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateId(pub usize);
