//! 엔진 설정 관리.
//!
//! 모든 튜닝 노브는 이름 있는 필드를 가진 타입 구조체로 정의되며,
//! 시작 시 한 번 로드하고 검증합니다. 검증 실패는 시작 시에만 치명적인
//! `Config` 에러입니다 (실행 중 설정 변경은 없습니다).

use crate::error::{EngineError, EngineResult};
use crate::types::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 엔진 전체 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    /// 스윙 포인트 분석 설정
    #[serde(default)]
    pub swing: SwingConfig,
    /// 구조 이벤트 감지 설정
    #[serde(default)]
    pub structure: StructureConfig,
    /// 보조 패턴 (오더 블록/FVG) 설정
    #[serde(default)]
    pub patterns: PatternConfig,
    /// 멀티 타임프레임 코디네이터 설정
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// 메모리 저장소/성과 분석 설정
    #[serde(default)]
    pub memory: MemoryConfig,
    /// 결정 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 스윙 포인트 분석 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwingConfig {
    /// 룩백 윈도우 (양쪽 각각의 캔들 수)
    pub window: usize,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self { window: 3 }
    }
}

/// 구조 이벤트 감지 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructureConfig {
    /// 돌파 확인에 필요한 후속 캔들 수
    pub confirmation_candles: usize,
    /// 캔들 간격이 타임프레임 기간의 이 배수를 넘으면
    /// 바이어스를 무효화 (세션 경계의 오래된 구조 방지)
    pub gap_invalidation_factor: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            confirmation_candles: 1,
            gap_invalidation_factor: 3.0,
        }
    }
}

/// 보조 패턴 감지 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternConfig {
    /// FVG 최소 크기 (가운데 캔들 종가 대비 비율)
    pub min_gap_ratio: Decimal,
    /// 심볼+타임프레임별 추적하는 활성 존 최대 개수
    pub max_active_zones: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_gap_ratio: dec!(0.0005),
            max_active_zones: 32,
        }
    }
}

/// 멀티 타임프레임 코디네이터 설정.
///
/// 권위 순서: `higher`가 바이어스를 결정하고, `middle`이 구조를 확인하며,
/// `lower`가 진입 타이밍을 제공합니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatorConfig {
    /// 상위 타임프레임 (바이어스 필터)
    pub higher: Timeframe,
    /// 중간 타임프레임 (구조 확인)
    pub middle: Timeframe,
    /// 하위 타임프레임 (진입 타이밍)
    pub lower: Timeframe,
    /// 하위 신호를 확인된 것으로 간주하는 중간 타임프레임 캔들 수
    pub confirmation_window: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            higher: Timeframe::H4,
            middle: Timeframe::H1,
            lower: Timeframe::M15,
            confirmation_window: 12,
        }
    }
}

/// 메모리 저장소/성과 분석 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// 저장소 디렉토리 경로
    pub data_dir: String,
    /// 기록 가중치의 반감기 (일)
    pub half_life_days: f64,
    /// 이보다 적은 표본은 중립 사전값(0.5)을 반환
    pub min_sample_count: usize,
    /// 알려진 거짓 양성 판정의 유사도 임계값 (0 ~ 1)
    pub similarity_threshold: f64,
    /// 과거 실패 패턴과 유사할 때 곱하는 패널티 계수
    pub failure_penalty: f64,
    /// 컨텍스트 링 버퍼의 최대 항목 수
    pub context_history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/memory".to_string(),
            half_life_days: 30.0,
            min_sample_count: 10,
            similarity_threshold: 0.7,
            failure_penalty: 0.3,
            context_history_limit: 64,
        }
    }
}

/// 결정 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// 캐시 항목 TTL (초)
    pub ttl_secs: u64,
    /// 상태 해시에 포함하는 최근 종가 개수
    pub state_hash_candles: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            state_hash_candles: 16,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl EngineConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 환경 변수는 `ICT__` 접두사와 `__` 구분자를 사용합니다.
    /// 예: `ICT__MEMORY__HALF_LIFE_DAYS=14`
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ICT")
                    .separator("__")
                    .try_parsing(true),
            );

        let raw = builder
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let config: EngineConfig = raw
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// 시작 시 한 번 호출되며, 실패는 치명적입니다.
    pub fn validate(&self) -> EngineResult<()> {
        if self.swing.window == 0 {
            return Err(EngineError::Config("swing.window는 1 이상이어야 합니다".into()));
        }
        if self.structure.confirmation_candles == 0 {
            return Err(EngineError::Config(
                "structure.confirmation_candles는 1 이상이어야 합니다".into(),
            ));
        }
        if self.structure.gap_invalidation_factor <= 1.0 {
            return Err(EngineError::Config(
                "structure.gap_invalidation_factor는 1.0보다 커야 합니다".into(),
            ));
        }
        if self.patterns.min_gap_ratio <= Decimal::ZERO || self.patterns.min_gap_ratio >= Decimal::ONE {
            return Err(EngineError::Config(
                "patterns.min_gap_ratio는 (0, 1) 범위여야 합니다".into(),
            ));
        }
        if self.patterns.max_active_zones == 0 {
            return Err(EngineError::Config(
                "patterns.max_active_zones는 1 이상이어야 합니다".into(),
            ));
        }
        if !(self.coordinator.lower < self.coordinator.middle
            && self.coordinator.middle < self.coordinator.higher)
        {
            return Err(EngineError::Config(format!(
                "코디네이터 타임프레임은 엄격한 권위 순서여야 합니다: {} < {} < {}",
                self.coordinator.lower, self.coordinator.middle, self.coordinator.higher
            )));
        }
        if self.coordinator.confirmation_window == 0 {
            return Err(EngineError::Config(
                "coordinator.confirmation_window는 1 이상이어야 합니다".into(),
            ));
        }
        if self.memory.half_life_days <= 0.0 {
            return Err(EngineError::Config(
                "memory.half_life_days는 양수여야 합니다".into(),
            ));
        }
        if self.memory.min_sample_count == 0 {
            return Err(EngineError::Config(
                "memory.min_sample_count는 1 이상이어야 합니다".into(),
            ));
        }
        if !(0.0 < self.memory.similarity_threshold && self.memory.similarity_threshold <= 1.0) {
            return Err(EngineError::Config(
                "memory.similarity_threshold는 (0, 1] 범위여야 합니다".into(),
            ));
        }
        if !(0.0 < self.memory.failure_penalty && self.memory.failure_penalty <= 1.0) {
            return Err(EngineError::Config(
                "memory.failure_penalty는 (0, 1] 범위여야 합니다".into(),
            ));
        }
        if self.memory.context_history_limit == 0 {
            return Err(EngineError::Config(
                "memory.context_history_limit는 1 이상이어야 합니다".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(EngineError::Config("cache.ttl_secs는 1 이상이어야 합니다".into()));
        }
        if self.cache.state_hash_candles < 3 {
            return Err(EngineError::Config(
                "cache.state_hash_candles는 3 이상이어야 합니다".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_swing_window_rejected() {
        let mut config = EngineConfig::default();
        config.swing.window = 0;
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal_at_startup());
    }

    #[test]
    fn test_timeframe_ladder_must_be_ordered() {
        let mut config = EngineConfig::default();
        config.coordinator.higher = Timeframe::M15;
        config.coordinator.middle = Timeframe::H1;
        config.coordinator.lower = Timeframe::H4;
        assert!(config.validate().is_err());

        // 같은 타임프레임 중복도 거부
        let mut config = EngineConfig::default();
        config.coordinator.middle = config.coordinator.higher;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gap_ratio_bounds() {
        let mut config = EngineConfig::default();
        config.patterns.min_gap_ratio = Decimal::ZERO;
        assert!(config.validate().is_err());

        config.patterns.min_gap_ratio = Decimal::ONE;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [swing]
            window = 5

            [coordinator]
            higher = "1d"
            middle = "4h"
            lower = "1h"
            confirmation_window = 6
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.swing.window, 5);
        assert_eq!(config.coordinator.higher, Timeframe::D1);
        assert_eq!(config.coordinator.lower, Timeframe::H1);
        // 나머지는 기본값
        assert_eq!(config.memory.min_sample_count, 10);
        assert!(config.validate().is_ok());
    }
}
