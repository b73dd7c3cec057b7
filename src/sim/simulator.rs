//! 事件驱动仿真器
//!
//! 单线程事件循环：事件按 (时间, 插入序号) 从小到大执行，插入序号
//! 保证同一时刻先进先出。`schedule` 返回句柄，`cancel` 走墓碑——
//! 不在堆里翻找，出队时跳过已取消的项。

use super::time::SimTime;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, trace};

/// 仿真事件。执行时拿走自身所有权，事件携带的数据（比如一帧）
/// 可以直接 move 给接收方。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}

/// 业务世界，由上层实现（本 crate 里是持有拓扑的 `NetWorld`）。
/// 事件通过 `as_any_mut` 下转型到具体类型。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}

/// 已调度事件的句柄，可用于取消。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// 堆里的一项。排序键是 (at, seq)。
struct QueuedEvent {
    at: SimTime,
    seq: u64,
    ev: Box<dyn Event>,
}

// std 的 BinaryHeap 弹最大值；把键整体反过来比较，得到
// 时间最早、同时刻序号最小的先出。
impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for QueuedEvent {}

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<QueuedEvent>,
    cancelled: HashSet<u64>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 调度事件在指定时间执行，返回可取消的句柄。
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) -> EventId {
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, schedule_at = ?at, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(QueuedEvent {
            at,
            seq,
            ev: Box::new(ev),
        });

        debug!(queue_size = self.q.len(), "事件已加入队列");
        EventId(seq)
    }

    /// 取消一个尚未执行的事件。已执行或不存在的句柄是 no-op。
    pub fn cancel(&mut self, id: EventId) {
        trace!(seq = id.0, "取消事件");
        self.cancelled.insert(id.0);
    }

    fn pop_live(&mut self) -> Option<QueuedEvent> {
        while let Some(item) = self.q.pop() {
            if self.cancelled.remove(&item.seq) {
                trace!(seq = item.seq, "跳过已取消事件");
                continue;
            }
            return Some(item);
        }
        None
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        loop {
            let next_at = match self.q.peek() {
                Some(top) => top.at,
                None => break,
            };
            if next_at > until {
                break;
            }
            let Some(item) = self.pop_live() else { break };
            if item.at > until {
                // peek 看到的可能是墓碑，pop_live 之后才暴露真正的下一个事件
                self.q.push(item);
                break;
            }
            self.now = item.at;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let mut event_count = 0u64;
        while let Some(item) = self.pop_live() {
            event_count += 1;
            self.now = item.at;

            trace!(
                event_num = event_count,
                now = ?self.now,
                seq = item.seq,
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
            world.on_tick(self);
        }

        info!(
            total_events = event_count,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }
}
