//! 시장 구조 이벤트 타입.
//!
//! - `SwingPoint` - 국소 극값 (스윙 하이/로우)
//! - `StructureEvent` - BOS(구조 돌파) / CHoCH(성격 전환) 이벤트

use crate::types::{Price, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 방향 (상승/하락).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 상승
    Bullish,
    /// 하락
    Bearish,
}

impl Direction {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Direction::Bullish)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => write!(f, "bullish"),
            Direction::Bearish => write!(f, "bearish"),
        }
    }
}

/// 스윙 포인트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingKind {
    /// 스윙 하이 (국소 고점)
    High,
    /// 스윙 로우 (국소 저점)
    Low,
}

/// 캔들 시리즈에서 파생된 스윙 포인트.
///
/// 수명은 이를 생성한 시리즈 리비전에 묶입니다. 시리즈가 갱신되면
/// 재계산해야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// 캔들 타임스탬프
    pub timestamp: DateTime<Utc>,
    /// 극값 가격 (하이면 고가, 로우면 저가)
    pub price: Price,
    /// 종류
    pub kind: SwingKind,
    /// 시리즈 내 인덱스
    pub index: usize,
    /// 이 포인트를 생성한 시리즈 리비전
    pub series_revision: u64,
}

/// 구조 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Break of Structure - 기존 바이어스 방향의 연속 신호
    Bos,
    /// Change of Character - 기존 바이어스에 반하는 반전 신호
    Choch,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureKind::Bos => write!(f, "BOS"),
            StructureKind::Choch => write!(f, "CHoCH"),
        }
    }
}

/// 시장 구조 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    /// 이벤트 종류
    pub kind: StructureKind,
    /// 방향
    pub direction: Direction,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 돌파된 가격 레벨
    pub break_price: Price,
    /// 돌파 캔들 타임스탬프
    pub broken_at: DateTime<Utc>,
    /// 돌파의 기준이 된 스윙 포인트
    pub swing_reference: SwingPoint,
    /// 원시 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
}
