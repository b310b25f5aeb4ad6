//! 调试事件（debug）
//!
//! 记录总线各阶段（emit / replay / subscribe / remove / persist ...）的起止与耗时。
//! 每个阶段以 `<prefix>::<id>` 为键计时；结束阶段计算耗时（毫秒）。
//! 若配置了 `on_debug` 回调则交给回调处理，否则输出 `tracing` 调试日志。
//!
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// 调试回调：(阶段, 标识, 耗时毫秒)
pub type DebugHook = Arc<dyn Fn(DebugPhase, &str, Option<f64>) + Send + Sync>;

/// 调试阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugPhase {
    StartReplay,
    EndReplay,
    StartEmit,
    EndEmit,
    StartSubscribe,
    EndSubscribe,
    StartRemove,
    EndRemove,
    StartRemoveAll,
    EndRemoveAll,
    StartPersist,
    EndPersist,
    StartRestore,
    EndRestore,
    StartErrorHandler,
    EndErrorHandler,
    StartIsUnique,
    EndIsUnique,
}

impl DebugPhase {
    pub fn as_str(&self) -> &'static str {
        use DebugPhase::*;
        match self {
            StartReplay => "startReplay",
            EndReplay => "endReplay",
            StartEmit => "startEmit",
            EndEmit => "endEmit",
            StartSubscribe => "startSubscribe",
            EndSubscribe => "endSubscribe",
            StartRemove => "startRemove",
            EndRemove => "endRemove",
            StartRemoveAll => "startRemoveAll",
            EndRemoveAll => "endRemoveAll",
            StartPersist => "startPersist",
            EndPersist => "endPersist",
            StartRestore => "startRestore",
            EndRestore => "endRestore",
            StartErrorHandler => "startErrorHandler",
            EndErrorHandler => "endErrorHandler",
            StartIsUnique => "startIsUnique",
            EndIsUnique => "endIsUnique",
        }
    }

    /// 计时键前缀
    pub fn key_prefix(&self) -> &'static str {
        use DebugPhase::*;
        match self {
            StartReplay | EndReplay => "replay",
            StartEmit | EndEmit => "emit",
            StartSubscribe | EndSubscribe => "subscribe",
            StartRemove | EndRemove => "remove",
            StartRemoveAll | EndRemoveAll => "removeAll",
            StartPersist | EndPersist => "persist",
            StartRestore | EndRestore => "restore",
            StartErrorHandler | EndErrorHandler => "error",
            StartIsUnique | EndIsUnique => "unique",
        }
    }

    pub fn is_start(&self) -> bool {
        self.as_str().starts_with("start")
    }
}

impl fmt::Display for DebugPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct DebugLogger {
    callback: Option<DebugHook>,
    started: Mutex<HashMap<String, Instant>>,
}

impl DebugLogger {
    pub(crate) fn new(callback: Option<DebugHook>) -> Self {
        Self {
            callback,
            started: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn log(&self, phase: DebugPhase, id: &str) {
        let key = format!("{}::{id}", phase.key_prefix());
        let duration_ms = {
            let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
            if phase.is_start() {
                started.insert(key, Instant::now());
                None
            } else {
                started
                    .remove(&key)
                    .map(|at| at.elapsed().as_secs_f64() * 1000.0)
            }
        };

        match &self.callback {
            Some(callback) => callback(phase, id, duration_ms),
            None => match duration_ms {
                Some(ms) => tracing::debug!(phase = %phase, id, duration_ms = ms, "tiny-bus"),
                None => tracing::debug!(phase = %phase, id, "tiny-bus"),
            },
        }
    }

    /// 操作失败时丢弃该标识下尚未结束的计时
    pub(crate) fn discard(&self, id: &str) {
        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        started.retain(|key, _| key.split_once("::").is_none_or(|(_, rest)| rest != id));
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.started.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Records = Arc<Mutex<Vec<(DebugPhase, String, Option<f64>)>>>;

    fn recording_logger() -> (DebugLogger, Records) {
        let records: Records = Arc::default();
        let sink = records.clone();
        let logger = DebugLogger::new(Some(Arc::new(move |phase, id: &str, ms| {
            sink.lock().unwrap().push((phase, id.to_string(), ms));
        })));
        (logger, records)
    }

    #[test]
    fn start_has_no_duration_and_end_has_one() {
        let (logger, records) = recording_logger();
        logger.log(DebugPhase::StartEmit, "ping");
        logger.log(DebugPhase::EndEmit, "ping");

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (DebugPhase::StartEmit, "ping".to_string(), None));
        assert_eq!(records[1].0, DebugPhase::EndEmit);
        assert!(records[1].2.is_some_and(|ms| ms >= 0.0));
    }

    #[test]
    fn end_without_start_reports_no_duration() {
        let (logger, records) = recording_logger();
        logger.log(DebugPhase::EndPersist, "ping");
        assert_eq!(records.lock().unwrap()[0].2, None);
    }

    #[test]
    fn timers_are_keyed_by_prefix_and_id() {
        let (logger, records) = recording_logger();
        logger.log(DebugPhase::StartEmit, "a");
        logger.log(DebugPhase::EndPersist, "a");
        logger.log(DebugPhase::EndEmit, "b");
        logger.log(DebugPhase::EndEmit, "a");

        let records = records.lock().unwrap();
        assert_eq!(records[1].2, None);
        assert_eq!(records[2].2, None);
        assert!(records[3].2.is_some());
    }

    #[test]
    fn discard_drops_only_matching_ids() {
        let (logger, _records) = recording_logger();
        logger.log(DebugPhase::StartEmit, "order::placed");
        logger.log(DebugPhase::StartIsUnique, "order::placed");
        logger.log(DebugPhase::StartReplay, "placed");
        logger.log(DebugPhase::StartReplay, "e-1");

        logger.discard("order::placed");
        assert_eq!(logger.pending(), 2);

        logger.discard("e-1");
        logger.discard("placed");
        assert_eq!(logger.pending(), 0);
    }

    #[test]
    fn phase_names() {
        assert_eq!(DebugPhase::StartRemoveAll.as_str(), "startRemoveAll");
        assert_eq!(DebugPhase::EndIsUnique.key_prefix(), "unique");
        assert!(DebugPhase::StartErrorHandler.is_start());
        assert!(!DebugPhase::EndReplay.is_start());
    }

    #[test]
    fn logs_through_tracing_without_callback() {
        let logger = DebugLogger::new(None);
        logger.log(DebugPhase::StartReplay, "e-1");
        logger.log(DebugPhase::EndReplay, "e-1");
        assert!(logger.started.lock().unwrap().is_empty());
    }
}
