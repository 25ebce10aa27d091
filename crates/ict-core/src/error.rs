//! 패턴 엔진의 에러 타입.
//!
//! 이 모듈은 엔진 전반에서 사용되는 에러 분류를 정의합니다.
//! 각 변형은 복구 정책이 다릅니다:
//! - `Data` - 감지 패스 내부에서 빈 결과로 복구, 전파하지 않음
//! - `Persistence` - 인메모리 폴백으로 강등, 치명적이지 않음
//! - `Config` - 시작 시에만 치명적, 실행 중에는 발생하지 않음
//! - `Concurrency` - 설계상 방지되어야 하는 프로그래밍 결함

use thiserror::Error;

/// 패턴 엔진의 핵심 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 캔들 입력 데이터 에러 (손상/부족)
    #[error("데이터 에러: {0}")]
    Data(String),

    /// 저장소 에러 (디스크/권한)
    #[error("영속성 에러: {0}")]
    Persistence(String),

    /// 설정 에러 (잘못된 임계값/윈도우 파라미터)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 동시성 위반 (같은 심볼의 컨텍스트 동시 변경 시도)
    #[error("동시성 위반: {0}")]
    Concurrency(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 엔진 작업을 위한 Result 타입.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// 감지 파이프라인을 중단하지 않고 복구 가능한 에러인지 확인합니다.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Data(_) | EngineError::Persistence(_))
    }

    /// 시작 시점에 치명적인 에러인지 확인합니다.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, EngineError::Config(_))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
