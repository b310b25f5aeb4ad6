//! 进程内事件总线（tiny-bus）
//!
//! 具名事件携带参数发布，按优先级路由到零个或多个订阅者，并可选地：
//! - 拒绝重复发布（幂等指纹或自定义检查）；
//! - 在订阅回调失败时按固定间隔重试；
//! - 持久化事件，之后按 id 重放给当前订阅者。
//!
//! 典型用法：
//! 1. 以 `TinyBusConfig::builder()` 配置并通过 `TinyBus::new` 构造总线；
//! 2. 使用 `on` 注册订阅（`Subscription::builder()`）；
//! 3. `emit` 发布事件得到事件 id，必要时 `replay` 重放。
//!
//! ```rust
//! use tiny_bus::{TinyBus, TinyBusConfig, Subscription, args, subscriber};
//!
//! # async fn example() -> tiny_bus::BusResult<()> {
//! let bus: TinyBus = TinyBus::new(TinyBusConfig::builder().unique_events(false).build())?;
//!
//! bus.on(
//!     "ping",
//!     Subscription::builder()
//!         .on_callback(subscriber::callback(|_id, _ctx, args| async move {
//!             println!("got {args:?}");
//!             anyhow::Ok(())
//!         }))
//!         .build(),
//! )
//! .await?;
//!
//! let id = bus.emit("ping", args![1]).await?.expect("persisted");
//! bus.replay(&id).await?;
//! # Ok(())
//! # }
//! ```
//!
pub mod bus;
pub mod debug;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod persist;
pub mod priority_queue;

pub use bus::{
    ErrorPayload, ErrorStrategy, SubscriberMode, Subscription, TinyBus, TinyBusConfig, hook,
    subscriber,
};
pub use debug::DebugPhase;
pub use error::{BusError, BusResult};
pub use event::{Event, EventId, EventName, NewEvent, SubscriberId};
pub use persist::{EventStore, InMemoryEventStore};
pub use priority_queue::PriorityQueue;

#[doc(hidden)]
pub mod __private {
    pub use crate::event::into_args;
    pub use serde_json::{Value, json};
}
