//! 事件记录
//!
//! `NewEvent` 为尚未持久化的事件（无 id），持久化时由存储分配 id 后成为 `Event`，
//! 之后不再变更。
//!
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type EventId = String;
pub type EventName = String;
pub type SubscriberId = String;

/// 已持久化的事件
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Event<C> {
    id: EventId,
    name: EventName,
    context: Option<C>,
    #[builder(default)]
    #[serde(default)]
    args: Vec<Value>,
}

impl<C> Event<C> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// 拆分为 (name, context, args)
    pub fn into_parts(self) -> (EventName, Option<C>, Vec<Value>) {
        (self.name, self.context, self.args)
    }
}

/// 待持久化的事件（id 由存储生成）
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct NewEvent<C> {
    name: EventName,
    context: Option<C>,
    #[builder(default)]
    #[serde(default)]
    args: Vec<Value>,
}

impl<C> NewEvent<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// 绑定存储分配的 id
    pub fn with_id(self, id: impl Into<EventId>) -> Event<C> {
        Event {
            id: id.into(),
            name: self.name,
            context: self.context,
            args: self.args,
        }
    }
}

/// 以任意可序列化表达式构建事件参数列表
///
/// ```rust
/// let args = tiny_bus::args!["test", -1, { "k": "v" }];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::__private::Value>::new()
    };
    ($($arg:tt)+) => {
        $crate::__private::into_args($crate::__private::json!([$($arg)+]))
    };
}

#[doc(hidden)]
pub fn into_args(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}
