use super::EventStore;
use crate::error::{BusError, BusResult as Result};
use crate::event::{Event, EventId, NewEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

type IdGenerator = Arc<dyn Fn() -> EventId + Send + Sync>;

/// 基于内存的事件存储
pub struct InMemoryEventStore<C> {
    events: DashMap<EventId, Event<C>>,
    next_id: IdGenerator,
}

impl<C> Default for InMemoryEventStore<C> {
    fn default() -> Self {
        Self::with_id_generator(|| uuid::Uuid::new_v4().to_string())
    }
}

impl<C> InMemoryEventStore<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 自定义 id 生成器（默认 UUID v4）
    pub fn with_id_generator<F>(next_id: F) -> Self
    where
        F: Fn() -> EventId + Send + Sync + 'static,
    {
        Self {
            events: DashMap::new(),
            next_id: Arc::new(next_id),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[async_trait]
impl<C> EventStore<C> for InMemoryEventStore<C>
where
    C: Clone + Send + Sync + 'static,
{
    async fn persist(&self, event: NewEvent<C>) -> Result<EventId> {
        let id = (self.next_id)();

        match self.events.entry(id.clone()) {
            Entry::Occupied(_) => Err(BusError::Collision { id }),
            Entry::Vacant(slot) => {
                slot.insert(event.with_id(id.clone()));
                Ok(id)
            }
        }
    }

    async fn restore(&self, id: &str) -> Result<Event<C>> {
        self.events
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| BusError::NotFound { id: id.to_string() })
    }
}
