//! 总线配置（TinyBusConfig）
//!
//! 所有选项集中在一个结构体中，默认值在构造时确定：
//!
//! | 选项 | 默认值 |
//! |------|--------|
//! | `context` | 无 |
//! | `max_retries` | 3 |
//! | `retry_interval` | 500ms |
//! | `unique_events` | true |
//! | `persist_events` | true |
//! | `subscriber_mode` | `single` |
//! | `error_strategy` | `exit-on-error` |
//! | `debug` | false |
//!
use super::hook::{
    DebugHook, IdentifierHook, PersistHook, RestoreHook, SubscriptionHook, UniqueCheckHook,
};
use crate::error::{BusError, BusResult as Result};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// 投递模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriberMode {
    /// 每次 emit 仅消费一个订阅者，成功后该订阅者出队
    #[default]
    Single,
    /// 每次 emit 调用全部订阅者，队列不变
    Multiple,
}

/// 订阅者重试耗尽后的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategy {
    /// 停止向剩余订阅者投递
    #[default]
    ExitOnError,
    /// 继续投递下一个订阅者
    ContinueOnError,
}

impl SubscriberMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberMode::Single => "single",
            SubscriberMode::Multiple => "multiple",
        }
    }
}

impl ErrorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStrategy::ExitOnError => "exit-on-error",
            ErrorStrategy::ContinueOnError => "continue-on-error",
        }
    }
}

impl fmt::Display for SubscriberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriberMode {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(SubscriberMode::Single),
            "multiple" => Ok(SubscriberMode::Multiple),
            other => Err(BusError::Configuration {
                reason: format!("unknown subscriber mode: {other}"),
            }),
        }
    }
}

impl FromStr for ErrorStrategy {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exit-on-error" => Ok(ErrorStrategy::ExitOnError),
            "continue-on-error" => Ok(ErrorStrategy::ContinueOnError),
            other => Err(BusError::Configuration {
                reason: format!("unknown error strategy: {other}"),
            }),
        }
    }
}

/// 总线配置
#[derive(Builder)]
pub struct TinyBusConfig<C> {
    /// 随每个订阅者与持久化事件携带的上下文
    pub(crate) context: Option<C>,
    /// 首次调用失败后的额外重试次数
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub(crate) max_retries: usize,
    #[builder(default = DEFAULT_RETRY_INTERVAL)]
    pub(crate) retry_interval: Duration,
    /// 关闭后同一 (事件名, 参数) 可重复 emit
    #[builder(default = true)]
    pub(crate) unique_events: bool,
    /// 关闭后 emit 不再持久化，返回 `None`
    #[builder(default = true)]
    pub(crate) persist_events: bool,
    #[builder(default)]
    pub(crate) subscriber_mode: SubscriberMode,
    #[builder(default)]
    pub(crate) error_strategy: ErrorStrategy,
    /// 开启阶段计时日志（提供 `on_debug` 时自动开启）
    #[builder(default)]
    pub(crate) debug: bool,

    pub(crate) on_identifier: Option<IdentifierHook>,
    pub(crate) on_unique_check: Option<UniqueCheckHook>,
    pub(crate) on_persist: Option<PersistHook<C>>,
    pub(crate) on_restore: Option<RestoreHook<C>>,
    pub(crate) on_subscribe: Option<SubscriptionHook>,
    pub(crate) on_unsubscribe: Option<SubscriptionHook>,
    pub(crate) on_debug: Option<DebugHook>,
}

impl<C> Default for TinyBusConfig<C> {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<C> TinyBusConfig<C> {
    /// persist 与 restore 回调必须同时提供或同时缺省
    pub fn validate(&self) -> Result<()> {
        if self.on_persist.is_some() != self.on_restore.is_some() {
            return Err(BusError::Configuration {
                reason: "If providing a restore or persist function, both must be provided."
                    .to_string(),
            });
        }
        Ok(())
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn unique_events(&self) -> bool {
        self.unique_events
    }

    pub fn persist_events(&self) -> bool {
        self.persist_events
    }

    pub fn subscriber_mode(&self) -> SubscriberMode {
        self.subscriber_mode
    }

    pub fn error_strategy(&self) -> ErrorStrategy {
        self.error_strategy
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.debug || self.on_debug.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::hook;
    use crate::event::Event;

    #[test]
    fn defaults_are_applied_at_construction() {
        let config = TinyBusConfig::<()>::default();
        assert!(config.context().is_none());
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.retry_interval(), Duration::from_millis(500));
        assert!(config.unique_events());
        assert!(config.persist_events());
        assert_eq!(config.subscriber_mode(), SubscriberMode::Single);
        assert_eq!(config.error_strategy(), ErrorStrategy::ExitOnError);
        assert!(!config.debug_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn persist_without_restore_is_rejected() {
        let config = TinyBusConfig::<()>::builder()
            .on_persist(hook::persist(|_event| async { anyhow::Ok("id".to_string()) }))
            .build();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BusError::Configuration { .. }));
        assert_eq!(
            err.to_string(),
            "If providing a restore or persist function, both must be provided."
        );
    }

    #[test]
    fn restore_without_persist_is_rejected() {
        let config = TinyBusConfig::<()>::builder()
            .on_restore(hook::restore(|_id| async { anyhow::Ok(None::<Event<()>>) }))
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn paired_hooks_are_accepted() {
        let config = TinyBusConfig::<()>::builder()
            .on_persist(hook::persist(|_event| async { anyhow::Ok("id".to_string()) }))
            .on_restore(hook::restore(|_id| async { anyhow::Ok(None) }))
            .build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn on_debug_enables_debug() {
        let config = TinyBusConfig::<()>::builder()
            .on_debug(hook::debug(|_, _, _| {}))
            .build();
        assert!(config.debug_enabled());
    }

    #[test]
    fn modes_parse_and_serialize_with_kebab_names() {
        assert_eq!("multiple".parse::<SubscriberMode>().unwrap(), SubscriberMode::Multiple);
        assert_eq!(
            "continue-on-error".parse::<ErrorStrategy>().unwrap(),
            ErrorStrategy::ContinueOnError
        );
        assert!("sometimes".parse::<SubscriberMode>().is_err());

        let json = serde_json::to_string(&ErrorStrategy::ExitOnError).unwrap();
        assert_eq!(json, r#""exit-on-error""#);
        let mode: SubscriberMode = serde_json::from_str(r#""single""#).unwrap();
        assert_eq!(mode, SubscriberMode::Single);
        assert_eq!(SubscriberMode::Multiple.to_string(), "multiple");
    }
}
