//! 패턴 신호 타입.
//!
//! `PatternSignal`은 엔진의 통합 출력 타입입니다. 다운스트림 ML 분류기가
//! 피처 입력으로 소비하므로 필드 구성은 `SCHEMA_VERSION`으로 버전 관리되며,
//! 호환성이 깨지는 변경 시 버전을 올립니다.

use crate::types::{Symbol, Timeframe};
use super::structure::{Direction, StructureEvent};
use super::zone::{FairValueGap, OrderBlock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 패턴 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Break of Structure
    Bos,
    /// Change of Character
    Choch,
    /// 오더 블록
    OrderBlock,
    /// Fair Value Gap
    FairValueGap,
}

impl PatternKind {
    /// 저장 파일 이름 등에 쓰이는 안정적인 식별 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Bos => "bos",
            PatternKind::Choch => "choch",
            PatternKind::OrderBlock => "order_block",
            PatternKind::FairValueGap => "fvg",
        }
    }

    /// 식별 문자열에서 파싱합니다.
    pub fn from_str_id(s: &str) -> Option<Self> {
        match s {
            "bos" => Some(PatternKind::Bos),
            "choch" => Some(PatternKind::Choch),
            "order_block" => Some(PatternKind::OrderBlock),
            "fvg" => Some(PatternKind::FairValueGap),
            _ => None,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 감지 세부 내용 (태그된 유니언).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternDetails {
    /// 구조 이벤트 (BOS/CHoCH)
    Structure(StructureEvent),
    /// 오더 블록
    OrderBlock(OrderBlock),
    /// Fair Value Gap
    FairValueGap(FairValueGap),
}

impl PatternDetails {
    /// 세부 내용의 패턴 종류를 반환합니다.
    pub fn kind(&self) -> PatternKind {
        match self {
            PatternDetails::Structure(ev) => match ev.kind {
                super::structure::StructureKind::Bos => PatternKind::Bos,
                super::structure::StructureKind::Choch => PatternKind::Choch,
            },
            PatternDetails::OrderBlock(_) => PatternKind::OrderBlock,
            PatternDetails::FairValueGap(_) => PatternKind::FairValueGap,
        }
    }

    /// 세부 내용의 방향을 반환합니다.
    pub fn direction(&self) -> Direction {
        match self {
            PatternDetails::Structure(ev) => ev.direction,
            PatternDetails::OrderBlock(ob) => ob.direction,
            PatternDetails::FairValueGap(gap) => gap.direction,
        }
    }

    /// 원점 타임스탬프 (돌파 캔들 또는 존 원점)를 반환합니다.
    pub fn origin(&self) -> DateTime<Utc> {
        match self {
            PatternDetails::Structure(ev) => ev.broken_at,
            PatternDetails::OrderBlock(ob) => ob.origin,
            PatternDetails::FairValueGap(gap) => gap.origin,
        }
    }

    /// 원시 신뢰도를 반환합니다.
    pub fn raw_confidence(&self) -> f64 {
        match self {
            PatternDetails::Structure(ev) => ev.confidence,
            PatternDetails::OrderBlock(ob) => ob.confidence,
            PatternDetails::FairValueGap(gap) => gap.confidence,
        }
    }
}

/// 킬존 - 역사적으로 패턴 신뢰도가 높은 시간대 창.
///
/// 타임스탬프 필터로만 소비됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Killzone {
    /// 아시아 레인지
    AsianRange,
    /// 런던 오픈
    LondonOpen,
    /// 뉴욕 오픈
    NewYorkOpen,
    /// 런던 클로즈
    LondonClose,
}

/// 패턴 신호 - 엔진의 통합 출력 타입.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    /// 신호 ID (내용 기반 결정적 UUID v5)
    pub id: Uuid,
    /// 스키마 버전
    pub schema_version: u32,
    /// 심볼
    pub symbol: Symbol,
    /// 신호가 발생한 타임프레임
    pub timeframe: Timeframe,
    /// 이 신호에 기여한 타임프레임 (출처 기록)
    pub contributing_timeframes: Vec<Timeframe>,
    /// 패턴 종류
    pub kind: PatternKind,
    /// 방향
    pub direction: Direction,
    /// 감지 세부 내용
    pub details: PatternDetails,
    /// 감지기의 원시 신뢰도 (0.0 ~ 1.0)
    pub raw_confidence: f64,
    /// 메모리 보정 후 최종 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 상위 타임프레임 바이어스와 충돌 여부
    #[serde(default)]
    pub conflicting_bias: bool,
    /// 중간 타임프레임 확인 창을 벗어난 하위 타임프레임 신호 여부
    #[serde(default)]
    pub unconfirmed_timing: bool,
    /// 메모리 저장소 강등 상태에서 생성된 신호 여부
    #[serde(default)]
    pub memory_degraded: bool,
    /// 적용된 경고 목록 (예: "similar pattern historically failed")
    #[serde(default)]
    pub warnings: Vec<String>,
    /// 감지 시점에 활성화된 킬존
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killzone: Option<Killzone>,
    /// 신호 원점 타임스탬프 (돌파 캔들/존 원점, 벽시계 아님)
    pub detected_at: DateTime<Utc>,
}

impl PatternSignal {
    /// 현재 신호 스키마 버전.
    pub const SCHEMA_VERSION: u32 = 1;

    /// 감지 세부 내용으로부터 신호를 생성합니다.
    ///
    /// ID는 (심볼, 타임프레임, 종류, 원점, 방향)의 UUID v5로,
    /// 같은 감지는 항상 같은 ID를 갖습니다.
    pub fn from_details(symbol: Symbol, timeframe: Timeframe, details: PatternDetails) -> Self {
        let kind = details.kind();
        let direction = details.direction();
        let origin = details.origin();
        let raw_confidence = details.raw_confidence().clamp(0.0, 1.0);

        let id_material = format!(
            "{}|{}|{}|{}|{}",
            symbol.pair(),
            timeframe,
            kind,
            origin.timestamp(),
            direction
        );
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, id_material.as_bytes());

        Self {
            id,
            schema_version: Self::SCHEMA_VERSION,
            symbol,
            timeframe,
            contributing_timeframes: vec![timeframe],
            kind,
            direction,
            details,
            raw_confidence,
            confidence: raw_confidence,
            conflicting_bias: false,
            unconfirmed_timing: false,
            memory_degraded: false,
            warnings: Vec::new(),
            killzone: None,
            detected_at: origin,
        }
    }

    /// 기여 타임프레임을 기록합니다.
    pub fn with_contributing(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.contributing_timeframes = timeframes;
        self
    }

    /// 최종 신뢰도를 설정합니다 (0.0 ~ 1.0으로 클램프).
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// 경고를 추가합니다.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// 강한 신호인지 확인합니다 (최종 신뢰도 >= 0.7).
    pub fn is_strong(&self) -> bool {
        self.confidence >= 0.7
    }
}
