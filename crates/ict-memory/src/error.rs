//! 메모리 모듈 오류 타입.

use ict_core::error::EngineError;
use thiserror::Error;

/// 메모리 저장소 관련 오류.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 손상된 레코드
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        MemoryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}

impl From<MemoryError> for EngineError {
    fn from(err: MemoryError) -> Self {
        EngineError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
