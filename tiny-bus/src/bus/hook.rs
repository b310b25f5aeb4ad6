//! 外部回调（hook）
//!
//! 总线在以下挂点调用可插拔的外部协作方，均为可选、相互独立：
//! `on_identifier`、`on_unique_check`、`on_persist`/`on_restore`（必须成对提供）、
//! `on_subscribe`、`on_unsubscribe`。
//!
//! 本模块给出各挂点的类型擦除形式，以及把普通 async 闭包包装为挂点的构造函数。
//!
use crate::event::{Event, EventId, EventName, NewEvent, SubscriberId};
use futures_core::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub use crate::debug::DebugHook;

pub type IdentifierHook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<SubscriberId>> + Send + Sync>;

pub type UniqueCheckHook =
    Arc<dyn Fn(EventName, Vec<Value>) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

pub type PersistHook<C> =
    Arc<dyn Fn(NewEvent<C>) -> BoxFuture<'static, anyhow::Result<EventId>> + Send + Sync>;

/// 返回 `Ok(None)` 表示事件不存在
pub type RestoreHook<C> =
    Arc<dyn Fn(EventId) -> BoxFuture<'static, anyhow::Result<Option<Event<C>>>> + Send + Sync>;

/// 订阅/退订通知：(事件名, 订阅者 id)
pub type SubscriptionHook =
    Arc<dyn Fn(EventName, SubscriberId) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub fn identifier<F, Fut>(f: F) -> IdentifierHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<SubscriberId>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

pub fn unique_check<F, Fut>(f: F) -> UniqueCheckHook
where
    F: Fn(EventName, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(move |name, args| Box::pin(f(name, args)))
}

pub fn persist<C, F, Fut>(f: F) -> PersistHook<C>
where
    F: Fn(NewEvent<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<EventId>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

pub fn restore<C, F, Fut>(f: F) -> RestoreHook<C>
where
    F: Fn(EventId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<Event<C>>>> + Send + 'static,
{
    Arc::new(move |id| Box::pin(f(id)))
}

pub fn subscription<F, Fut>(f: F) -> SubscriptionHook
where
    F: Fn(EventName, SubscriberId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |name, id| Box::pin(f(name, id)))
}

pub fn debug<F>(f: F) -> DebugHook
where
    F: Fn(crate::debug::DebugPhase, &str, Option<f64>) + Send + Sync + 'static,
{
    Arc::new(f)
}
