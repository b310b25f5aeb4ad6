//! 事件总线（TinyBus）
//!
//! 按事件名维护订阅者优先队列与错误回调表，负责：
//! - `on`/`remove`/`remove_all`：订阅管理；
//! - `emit`：幂等检查 → 按投递模式与重试/错误策略投递 → 持久化；
//! - `replay`：还原已持久化事件并重新投递，不做幂等检查也不再次持久化。
//!
//! 并发模型：每个事件名的队列各自加锁，幂等指纹集合独立存放；
//! 锁只在两次挂起点之间的同步片段内持有，绝不跨 `.await`。
//! 因此同一事件名上交错执行的 `on`/`remove` 对进行中的 `emit` 可见。
//!
use super::config::{ErrorStrategy, SubscriberMode, TinyBusConfig};
use super::subscriber::{ErrorCallback, ErrorPayload, Subscriber, Subscription, by_priority};
use crate::debug::{DebugLogger, DebugPhase};
use crate::error::{BusError, BusResult as Result};
use crate::event::{Event, EventId, EventName, NewEvent, SubscriberId};
use crate::fingerprint;
use crate::persist::{EventStore, InMemoryEventStore};
use crate::priority_queue::PriorityQueue;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

type SubscriberQueue<C> = Arc<Mutex<PriorityQueue<Subscriber<C>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 一次投递的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Emit,
    Replay,
}

/// 进程内事件总线
pub struct TinyBus<C = Value> {
    config: TinyBusConfig<C>,
    store: Arc<dyn EventStore<C>>,
    subscribers: DashMap<EventName, SubscriberQueue<C>>,
    error_handlers: DashMap<EventName, HashMap<SubscriberId, ErrorCallback>>,
    processed: DashSet<String>,
    debug: Option<DebugLogger>,
}

impl<C> Default for TinyBus<C>
where
    C: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::assemble(TinyBusConfig::default(), Arc::new(InMemoryEventStore::new()))
    }
}

impl<C> TinyBus<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// 以内存事件存储作为回退存储创建总线
    pub fn new(config: TinyBusConfig<C>) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryEventStore::new()))
    }

    /// 注入回退事件存储；仅在未配置 persist/restore 回调时使用
    pub fn with_store(config: TinyBusConfig<C>, store: Arc<dyn EventStore<C>>) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, store))
    }

    fn assemble(config: TinyBusConfig<C>, store: Arc<dyn EventStore<C>>) -> Self {
        let debug = config
            .debug_enabled()
            .then(|| DebugLogger::new(config.on_debug.clone()));

        Self {
            config,
            store,
            subscribers: DashMap::new(),
            error_handlers: DashMap::new(),
            processed: DashSet::new(),
            debug,
        }
    }

    pub fn config(&self) -> &TinyBusConfig<C> {
        &self.config
    }

    /// 当前某事件的订阅者数量
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.queue(event_name).map_or(0, |q| lock(&q).len())
    }

    pub fn has_subscribers(&self, event_name: &str) -> bool {
        self.subscriber_count(event_name) > 0
    }

    /// 订阅事件，返回订阅者 id
    pub async fn on(&self, event_name: &str, subscription: Subscription<C>) -> Result<SubscriberId> {
        let result = self.subscribe(event_name, subscription).await;
        self.settle(event_name, result)
    }

    /// 发布事件；持久化开启时返回事件 id，否则返回 `None`
    pub async fn emit(&self, event_name: &str, args: Vec<Value>) -> Result<Option<EventId>> {
        let result = self.deliver(event_name, args, Delivery::Emit).await;
        self.settle(event_name, result)
    }

    /// 重放已持久化事件：不做幂等检查，不再次持久化
    pub async fn replay(&self, event_id: &str) -> Result<()> {
        let result = self.redeliver(event_id).await;
        self.settle(event_id, result)
    }

    /// 移除单个订阅者，返回其 id
    pub async fn remove(&self, event_name: &str, subscriber_id: &str) -> Result<SubscriberId> {
        let result = self.unsubscribe(event_name, subscriber_id).await;
        self.settle(event_name, result)
    }

    /// 移除某事件的全部订阅者，返回事件名
    pub async fn remove_all(&self, event_name: &str) -> Result<EventName> {
        let result = self.unsubscribe_all(event_name).await;
        self.settle(event_name, result)
    }

    async fn subscribe(
        &self,
        event_name: &str,
        subscription: Subscription<C>,
    ) -> Result<SubscriberId> {
        self.log(DebugPhase::StartSubscribe, event_name);

        let queue = self
            .subscribers
            .entry(event_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PriorityQueue::with_comparator(by_priority::<C>))))
            .value()
            .clone();

        let subscriber_id = self.next_identifier().await?;
        let (callback, on_error, priority) = subscription.into_parts();

        let priority = {
            let mut queue = lock(&queue);
            // 缺省优先级严格低于队列中现有的全部订阅者
            let priority = priority.unwrap_or_else(|| {
                queue.iter().map(|s| s.priority).min().map_or(0, |lowest| lowest - 1)
            });
            queue.push(Subscriber {
                id: subscriber_id.clone(),
                callback,
                context: self.config.context.clone(),
                priority,
            });
            priority
        };

        if let Some(handler) = on_error {
            self.error_handlers
                .entry(event_name.to_string())
                .or_default()
                .insert(subscriber_id.clone(), handler);
        }

        if let Some(hook) = &self.config.on_subscribe {
            hook(event_name.to_string(), subscriber_id.clone())
                .await
                .map_err(BusError::hook("on_subscribe"))?;
        }

        trace!(event = event_name, subscriber_id = %subscriber_id, priority, "Subscriber registered");
        self.log(DebugPhase::EndSubscribe, event_name);
        Ok(subscriber_id)
    }

    async fn redeliver(&self, event_id: &str) -> Result<()> {
        self.log(DebugPhase::StartReplay, event_id);

        let event = self.restore(event_id).await?;
        let (name, _context, args) = event.into_parts();
        let delivered = self.deliver(&name, args, Delivery::Replay).await;
        self.settle(&name, delivered)?;

        debug!(event = %name, event_id, "Event replayed");
        self.log(DebugPhase::EndReplay, event_id);
        Ok(())
    }

    async fn unsubscribe(&self, event_name: &str, subscriber_id: &str) -> Result<SubscriberId> {
        self.log(DebugPhase::StartRemove, event_name);
        let queue = self.non_empty_queue(event_name)?;

        {
            let mut queue = lock(&queue);
            if !queue.contains_by(|s| s.id == subscriber_id) {
                return Err(BusError::SubscriberNotFound {
                    name: event_name.to_string(),
                    subscriber_id: subscriber_id.to_string(),
                });
            }
            let remaining: Vec<_> = queue
                .drain()
                .into_iter()
                .filter(|s| s.id != subscriber_id)
                .collect();
            queue.extend(remaining);
        }

        if let Some(mut handlers) = self.error_handlers.get_mut(event_name) {
            handlers.remove(subscriber_id);
        }

        if let Some(hook) = &self.config.on_unsubscribe {
            hook(event_name.to_string(), subscriber_id.to_string())
                .await
                .map_err(BusError::hook("on_unsubscribe"))?;
        }

        trace!(event = event_name, subscriber_id, "Subscriber removed");
        self.log(DebugPhase::EndRemove, event_name);
        Ok(subscriber_id.to_string())
    }

    async fn unsubscribe_all(&self, event_name: &str) -> Result<EventName> {
        self.log(DebugPhase::StartRemoveAll, event_name);
        let queue = self.non_empty_queue(event_name)?;

        let ids: Vec<SubscriberId> = lock(&queue).iter().map(|s| s.id.clone()).collect();
        if let Some(hook) = &self.config.on_unsubscribe {
            for id in &ids {
                hook(event_name.to_string(), id.clone())
                    .await
                    .map_err(BusError::hook("on_unsubscribe"))?;
            }
        }

        lock(&queue).clear();
        self.error_handlers.remove(event_name);

        trace!(event = event_name, removed = ids.len(), "All subscribers removed");
        self.log(DebugPhase::EndRemoveAll, event_name);
        Ok(event_name.to_string())
    }

    async fn deliver(
        &self,
        event_name: &str,
        args: Vec<Value>,
        delivery: Delivery,
    ) -> Result<Option<EventId>> {
        let is_replay = delivery == Delivery::Replay;
        if !is_replay {
            self.log(DebugPhase::StartEmit, event_name);
            if !self.is_unique(event_name, &args).await? {
                return Err(BusError::DuplicateEvent {
                    name: event_name.to_string(),
                    args: fingerprint::args_json(&args)?,
                });
            }
        }

        let queue = self.non_empty_queue(event_name)?;
        let mode = self.config.subscriber_mode;
        let strategy = self.config.error_strategy;

        // 快照仅限定迭代次数；single 模式下每轮取实时队列的堆顶
        let snapshot = lock(&queue).to_vec();
        let mut delivered: Vec<SubscriberId> = Vec::with_capacity(snapshot.len());

        for entry in snapshot {
            let subscriber = match mode {
                SubscriberMode::Single => match lock(&queue).top().cloned() {
                    Some(top) => top,
                    None => break,
                },
                SubscriberMode::Multiple => entry,
            };

            if delivered.contains(&subscriber.id) {
                continue;
            }

            match self.attempt(event_name, &subscriber, &args).await {
                Ok(()) => {
                    delivered.push(subscriber.id.clone());
                    if mode == SubscriberMode::Single {
                        Self::consume(&queue, &subscriber.id);
                        break;
                    }
                }
                Err(causes) => {
                    let error = BusError::RetryExhausted {
                        name: event_name.to_string(),
                        subscriber_id: subscriber.id.clone(),
                        retry_count: causes.len(),
                        causes,
                    };
                    self.route_error(event_name, &subscriber.id, error)?;

                    if strategy == ErrorStrategy::ExitOnError {
                        break;
                    }
                    if mode == SubscriberMode::Single {
                        Self::consume(&queue, &subscriber.id);
                    }
                }
            }
        }

        trace!(event = event_name, delivered = delivered.len(), replay = is_replay, "Event delivered");

        if is_replay || !self.config.persist_events {
            if !is_replay {
                self.log(DebugPhase::EndEmit, event_name);
            }
            return Ok(None);
        }

        let event = NewEvent::builder()
            .name(event_name.to_string())
            .maybe_context(self.config.context.clone())
            .args(args)
            .build();
        let event_id = self.persist(event).await?;

        self.log(DebugPhase::EndEmit, event_name);
        Ok(Some(event_id))
    }

    /// 调用订阅回调：1 次首调 + 至多 `max_retries` 次重试，失败原因按顺序收集
    async fn attempt(
        &self,
        event_name: &str,
        subscriber: &Subscriber<C>,
        args: &[Value],
    ) -> std::result::Result<(), Vec<anyhow::Error>> {
        let mut failures = Vec::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_interval).await;
            }

            match subscriber.invoke(args).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        event = event_name,
                        subscriber_id = %subscriber.id,
                        attempt,
                        error = %err,
                        "Subscriber callback failed"
                    );
                    failures.push(err);
                }
            }
        }

        Err(failures)
    }

    /// 把重试耗尽错误交给订阅者自己的错误回调；未注册时向上传播
    fn route_error(&self, event_name: &str, subscriber_id: &str, error: BusError) -> Result<()> {
        self.log(DebugPhase::StartErrorHandler, event_name);

        let handler = self
            .error_handlers
            .get(event_name)
            .and_then(|handlers| handlers.get(subscriber_id).cloned());

        let Some(handler) = handler else {
            return Err(error);
        };

        handler(ErrorPayload {
            error,
            event_name: event_name.to_string(),
            subscriber_id: subscriber_id.to_string(),
        });

        self.log(DebugPhase::EndErrorHandler, event_name);
        Ok(())
    }

    /// single 模式下令订阅者出队：通常就是堆顶，若期间队列被改动则按 id 移除
    fn consume(queue: &Mutex<PriorityQueue<Subscriber<C>>>, subscriber_id: &str) {
        let mut queue = lock(queue);
        if queue.top().is_some_and(|top| top.id == subscriber_id) {
            queue.pop();
            return;
        }

        let remaining: Vec<_> = queue
            .drain()
            .into_iter()
            .filter(|s| s.id != subscriber_id)
            .collect();
        queue.extend(remaining);
    }

    async fn is_unique(&self, event_name: &str, args: &[Value]) -> Result<bool> {
        if !self.config.unique_events {
            return Ok(true);
        }
        self.log(DebugPhase::StartIsUnique, event_name);

        let unique = match &self.config.on_unique_check {
            Some(hook) => hook(event_name.to_string(), args.to_vec())
                .await
                .map_err(BusError::hook("on_unique_check"))?,
            None => self
                .processed
                .insert(fingerprint::fingerprint(event_name, args)?),
        };

        self.log(DebugPhase::EndIsUnique, event_name);
        Ok(unique)
    }

    async fn next_identifier(&self) -> Result<SubscriberId> {
        match &self.config.on_identifier {
            Some(hook) => hook().await.map_err(BusError::hook("on_identifier")),
            None => Ok(uuid::Uuid::new_v4().to_string()),
        }
    }

    async fn persist(&self, event: NewEvent<C>) -> Result<EventId> {
        let name = event.name().to_string();
        self.log(DebugPhase::StartPersist, &name);

        let event_id = match &self.config.on_persist {
            Some(hook) => hook(event).await.map_err(BusError::hook("on_persist"))?,
            None => self.store.persist(event).await?,
        };

        debug!(event = %name, event_id = %event_id, "Event persisted");
        self.log(DebugPhase::EndPersist, &name);
        Ok(event_id)
    }

    async fn restore(&self, event_id: &str) -> Result<Event<C>> {
        self.log(DebugPhase::StartRestore, event_id);

        let event = match &self.config.on_restore {
            Some(hook) => hook(event_id.to_string())
                .await
                .map_err(BusError::hook("on_restore"))?
                .ok_or_else(|| BusError::NotFound {
                    id: event_id.to_string(),
                })?,
            None => self.store.restore(event_id).await?,
        };

        self.log(DebugPhase::EndRestore, event_id);
        Ok(event)
    }

    fn queue(&self, event_name: &str) -> Option<SubscriberQueue<C>> {
        self.subscribers.get(event_name).map(|q| q.value().clone())
    }

    fn non_empty_queue(&self, event_name: &str) -> Result<SubscriberQueue<C>> {
        self.queue(event_name)
            .filter(|q| !lock(q).is_empty())
            .ok_or_else(|| BusError::NoSubscribers {
                name: event_name.to_string(),
            })
    }

    fn log(&self, phase: DebugPhase, id: &str) {
        if let Some(debug) = &self.debug {
            debug.log(phase, id);
        }
    }

    /// 失败的操作不会走到结束阶段，丢弃其未完成的计时
    fn settle<T>(&self, id: &str, result: Result<T>) -> Result<T> {
        if let (Err(_), Some(debug)) = (&result, &self.debug) {
            debug.discard(id);
        }
        result
    }
}
