//! 事件持久化（persist）
//!
//! 定义事件存储协议 `EventStore` 与默认的内存实现 `InMemoryEventStore`。
//! 总线仅在未注入外部 persist/restore 回调时回退到此存储。
//!
mod in_memory;

pub use in_memory::InMemoryEventStore;

use crate::error::BusResult as Result;
use crate::event::{Event, EventId, NewEvent};
use async_trait::async_trait;

/// 事件存储：为事件分配 id 并支持按 id 还原
#[async_trait]
pub trait EventStore<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    /// 持久化事件并返回新分配的 id；id 已存在时返回 `BusError::Collision`
    async fn persist(&self, event: NewEvent<C>) -> Result<EventId>;

    /// 按 id 还原事件；不存在时返回 `BusError::NotFound`
    async fn restore(&self, id: &str) -> Result<Event<C>>;
}
