//! 队列策略（Queue disciplines）
//!
//! 发送器的 FIFO 直接用 `VecDeque`；这里提供响应/转发共用的
//! 最大优先级队列。

mod priority;

pub use priority::FramePriorityQueue;
