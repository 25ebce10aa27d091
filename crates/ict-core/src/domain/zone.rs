//! 가격 존 타입 (오더 블록, Fair Value Gap).
//!
//! 두 존 모두 완화(mitigation) 상태를 가지며, 상태는 앞으로만 진행합니다:
//! `Unmitigated` → `PartiallyMitigated` → `Mitigated`.

use crate::types::{Price, Timeframe};
use super::structure::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 존 완화 상태.
///
/// 선언 순서가 진행 순서이며, 파생된 `Ord`로 역행을 방지합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationState {
    /// 미완화 - 가격이 아직 존에 재진입하지 않음
    Unmitigated,
    /// 부분 완화 - 가격이 존에 진입함 (첫 터치)
    PartiallyMitigated,
    /// 완전 완화 - 가격이 존을 관통함
    Mitigated,
}

impl MitigationState {
    /// 다음 상태로 진행합니다. 상태는 절대 역행하지 않습니다.
    pub fn advance_to(self, next: MitigationState) -> MitigationState {
        self.max(next)
    }
}

/// 오더 블록.
///
/// 확정된 구조 돌파 직전의 마지막 반대 방향 캔들로, 기관 관심 존으로
/// 취급합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    /// 존 상단
    pub high: Price,
    /// 존 하단
    pub low: Price,
    /// 돌파 방향 (상승 돌파 → 수요 존, 하락 돌파 → 공급 존)
    pub direction: Direction,
    /// 원점 캔들 타임스탬프
    pub origin: DateTime<Utc>,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 완화 상태
    pub mitigation: MitigationState,
    /// 원시 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
}

impl OrderBlock {
    /// 가격이 존 범위 내에 있는지 확인합니다.
    pub fn contains(&self, price: Price) -> bool {
        price >= self.low && price <= self.high
    }

    /// 존 크기를 반환합니다.
    pub fn size(&self) -> Decimal {
        self.high - self.low
    }
}

/// Fair Value Gap.
///
/// 세 캔들 시퀀스가 남긴 미체결 가격 불균형 구간입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    /// 갭 상단
    pub upper: Price,
    /// 갭 하단
    pub lower: Price,
    /// 갭 방향 (상승 갭/하락 갭)
    pub direction: Direction,
    /// 갭을 만든 가운데 캔들 타임스탬프
    pub origin: DateTime<Utc>,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 완화 상태
    pub mitigation: MitigationState,
    /// 원시 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
}

impl FairValueGap {
    /// 가격이 갭 범위 내에 있는지 확인합니다.
    pub fn contains(&self, price: Price) -> bool {
        price >= self.lower && price <= self.upper
    }

    /// 갭 크기를 반환합니다.
    pub fn size(&self) -> Decimal {
        self.upper - self.lower
    }
}
