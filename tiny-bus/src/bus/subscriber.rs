//! 订阅者（Subscriber）
//!
//! `Subscription` 为调用方传给 `TinyBus::on` 的订阅选项；总线内部据此生成
//! `Subscriber` 记录并按优先级放入该事件的优先队列。
//!
use crate::error::BusError;
use crate::event::{EventName, SubscriberId};
use bon::Builder;
use futures_core::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 订阅回调：(订阅者 id, 上下文, 参数)
pub type SubscriberCallback<C> = Arc<
    dyn Fn(SubscriberId, Option<C>, Vec<Value>) -> BoxFuture<'static, anyhow::Result<()>>
        + Send
        + Sync,
>;

/// 重试耗尽后的错误回调
pub type ErrorCallback = Arc<dyn Fn(ErrorPayload) + Send + Sync>;

/// 交给错误回调的载荷
#[derive(Debug)]
pub struct ErrorPayload {
    pub error: BusError,
    pub event_name: EventName,
    pub subscriber_id: SubscriberId,
}

/// 订阅选项
#[derive(Builder)]
pub struct Subscription<C> {
    on_callback: SubscriberCallback<C>,
    on_error: Option<ErrorCallback>,
    /// 缺省时取比队列中现有最低优先级再低 1 的值，保证默认按注册顺序投递
    priority: Option<i64>,
}

impl<C> Subscription<C> {
    pub(crate) fn into_parts(self) -> (SubscriberCallback<C>, Option<ErrorCallback>, Option<i64>) {
        (self.on_callback, self.on_error, self.priority)
    }
}

/// 把 async 闭包包装为订阅回调
pub fn callback<C, F, Fut>(f: F) -> SubscriberCallback<C>
where
    F: Fn(SubscriberId, Option<C>, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |id, context, args| Box::pin(f(id, context, args)))
}

pub fn on_error<F>(f: F) -> ErrorCallback
where
    F: Fn(ErrorPayload) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub(crate) struct Subscriber<C> {
    pub(crate) id: SubscriberId,
    pub(crate) callback: SubscriberCallback<C>,
    pub(crate) context: Option<C>,
    pub(crate) priority: i64,
}

impl<C> Subscriber<C> {
    pub(crate) async fn invoke(&self, args: &[Value]) -> anyhow::Result<()>
    where
        C: Clone,
    {
        (self.callback)(self.id.clone(), self.context.clone(), args.to_vec()).await
    }
}

impl<C> fmt::Debug for Subscriber<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// 优先级大者优先
pub(crate) fn by_priority<C>(a: &Subscriber<C>, b: &Subscriber<C>) -> bool {
    a.priority > b.priority
}
