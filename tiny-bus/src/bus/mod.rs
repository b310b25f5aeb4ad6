//! 事件总线（bus）
//!
//! - `TinyBus`：订阅管理、投递、重试与重放；
//! - `TinyBusConfig`：集中配置与默认值；
//! - `Subscription`：订阅选项（回调、错误回调、优先级）；
//! - `hook`：外部协作方挂点。
//!
mod config;
mod dispatcher;
pub mod hook;
pub mod subscriber;

pub use config::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL, ErrorStrategy, SubscriberMode, TinyBusConfig,
};
pub use dispatcher::TinyBus;
pub use subscriber::{ErrorCallback, ErrorPayload, SubscriberCallback, Subscription};
