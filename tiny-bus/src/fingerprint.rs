//! 幂等指纹
//!
//! 指纹 = SHA-256(`<eventName>:<json-args>`) 的十六进制编码，
//! 其中 `json-args` 为参数列表的紧凑 JSON 序列化。
//!
use crate::error::BusResult as Result;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// 参数列表的紧凑 JSON 表示（同时用于重复事件的错误消息）
pub fn args_json(args: &[Value]) -> Result<String> {
    Ok(serde_json::to_string(args)?)
}

/// 计算 (事件名, 参数) 的指纹
pub fn fingerprint(event_name: &str, args: &[Value]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(event_name.as_bytes());
    hasher.update(b":");
    hasher.update(args_json(args)?.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
