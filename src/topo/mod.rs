//! 场景拓扑构建

mod chain;
mod linear;
mod triangle;

pub use chain::{build_rip_chain, RipChain};
pub use linear::{build_request_chain, RequestChainOpts, RequestChainTopo};
pub use triangle::{build_ospf_triangle, OspfTriangle, OspfTriangleOpts};
