//! 网络模拟模块
//!
//! 此模块包含网络仿真的核心组件：地址、帧、门/信道、拓扑与事件。

// 子模块声明
mod addr;
mod deliver_frame;
mod end_of_tx;
mod frame;
mod gate;
mod net_world;
mod network;
mod stats;
mod timer;
mod trace;

// 重新导出公共接口
pub use addr::{Addr, GateId, NodeIdx};
pub use deliver_frame::DeliverFrame;
pub use end_of_tx::EndOfTx;
pub use frame::{
    AppData, DbQueryFields, DbResponseFields, DnsQueryFields, DnsResponseFields, EncryptedFields,
    Frame, HttpGetFields, HttpResponseFields, Kind, KeyExchangeFields, LsaFields,
    MailRequestFields, MailResponseFields, Priority, RipRoute, RipUpdateFields, SynAckFields,
    SynFields, VideoChunkFields, WireProto, DEFAULT_FRAME_BYTES,
};
pub use gate::{Channel, Gate};
pub use net_world::NetWorld;
pub use network::Network;
pub use stats::Stats;
pub use timer::{NodeTimer, Timer};
pub use trace::{TraceEvent, TraceKind, TraceLog};
