//! 事件总线统一错误定义
//!
//! 覆盖构造期配置校验、幂等拒绝、路由缺失、重试耗尽与存储层错误，
//! 对外暴露的错误消息保持固定格式，便于调用方按文本匹配。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    // --- 构造期 ---
    #[error("{reason}")]
    Configuration { reason: String },

    // --- 投递 ---
    #[error("Event {name} with args {args} was already emitted.")]
    DuplicateEvent { name: String, args: String },
    #[error("No subscribers for event {name}")]
    NoSubscribers { name: String },
    #[error("No subscriber with id {subscriber_id} for event {name}")]
    SubscriberNotFound { name: String, subscriber_id: String },
    #[error(
        "Event \"{name}\" failed with {} error(s) for subscriber \"{subscriber_id}\" after {retry_count} retries.",
        .causes.len()
    )]
    RetryExhausted {
        name: String,
        subscriber_id: String,
        retry_count: usize,
        /// 按尝试顺序收集的每次失败原因
        causes: Vec<anyhow::Error>,
    },

    // --- 存储 ---
    #[error("Event with id {id} not found.")]
    NotFound { id: String },
    #[error("Event {id} already exists.")]
    Collision { id: String },

    // --- 外部回调 ---
    #[error("hook error: hook={hook}, reason={source:#}")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl BusError {
    pub(crate) fn hook(hook: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| BusError::Hook { hook, source }
    }
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;
