use thiserror::Error;

/// 协调层错误类型
///
/// 所有错误都携带操作名和键，调用方据此记录日志并决定是否重试。
/// 键不存在不是错误，各操作以 None / 空映射 / 0 表示。
#[derive(Debug, Error)]
pub enum StoreError {
    /// 超时内无法到达远端存储
    #[error("kv store unreachable during {op} on key {key}: {detail}")]
    Unavailable {
        op: &'static str,
        key: String,
        detail: String,
    },

    /// 单次操作超出命令超时
    #[error("kv store {op} on key {key} timed out")]
    Timeout { op: &'static str, key: String },

    /// 值在存储边界编解码失败
    #[error("serialization failed during {op} on key {key}: {detail}")]
    Serialization {
        op: &'static str,
        key: String,
        detail: String,
    },
}

impl StoreError {
    pub(crate) fn unavailable(op: &'static str, key: &str, detail: impl ToString) -> Self {
        StoreError::Unavailable {
            op,
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn timeout(op: &'static str, key: &str) -> Self {
        StoreError::Timeout {
            op,
            key: key.to_string(),
        }
    }

    pub(crate) fn serialization(op: &'static str, key: &str, detail: impl ToString) -> Self {
        StoreError::Serialization {
            op,
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
