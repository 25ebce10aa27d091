//! 패턴 결과 기록 타입.
//!
//! 다운스트림 소비자가 신호의 실제 결과를 보고하면 메모리 저장소의
//! append-only 로그에 누적되고, 과거 성과 분석기가 이를 시간 감쇠
//! 통계로 집계합니다.

use crate::types::{Price, Symbol, Timeframe};
use super::signal::PatternKind;
use super::structure::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 패턴 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternOutcome {
    /// 패턴이 예상대로 전개됨
    Success,
    /// 패턴이 실패함
    Failure,
    /// 판정 불가 (통계에서 제외)
    Undetermined,
}

/// 패턴 결과 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// 결과가 보고된 신호 ID
    pub signal_id: Uuid,
    /// 패턴 종류
    pub kind: PatternKind,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 심볼
    pub symbol: Symbol,
    /// 신호 방향
    pub direction: Direction,
    /// 패턴 가격 범위 상단 (유사도 비교용)
    pub zone_high: Price,
    /// 패턴 가격 범위 하단
    pub zone_low: Price,
    /// 결과
    pub outcome: PatternOutcome,
    /// 기록 시각
    pub recorded_at: DateTime<Utc>,
}

/// 시간 감쇠 성과 통계.
///
/// 메모리 저장소의 원시 기록에서 재계산 가능한 파생 캐시이며,
/// 직접 수정하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalStat {
    /// 패턴 종류
    pub kind: PatternKind,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 집계에 포함된 기록 수
    pub sample_count: usize,
    /// 감쇠 가중 성공률 (0.0 ~ 1.0)
    pub success_rate: f64,
    /// 마지막 계산 시각
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serde_round_trip() {
        let record = OutcomeRecord {
            signal_id: Uuid::nil(),
            kind: PatternKind::FairValueGap,
            timeframe: Timeframe::M15,
            symbol: Symbol::forex("EUR", "USD"),
            direction: Direction::Bearish,
            zone_high: rust_decimal_macros::dec!(1.1050),
            zone_low: rust_decimal_macros::dec!(1.1020),
            outcome: PatternOutcome::Failure,
            recorded_at: DateTime::<Utc>::UNIX_EPOCH,
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: OutcomeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
