//! 심볼별 시장 컨텍스트.
//!
//! `MarketContext`는 감지 패스가 끝날 때마다 멀티 타임프레임 코디네이터에
//! 의해서만 갱신되며, 같은 심볼에 대해 동시에 변경되지 않습니다
//! (엔진이 심볼별 뮤텍스로 보장). 주기적으로 메모리 저장소에 플러시됩니다.

use crate::types::Symbol;
use super::signal::PatternSignal;
use super::structure::{Direction, StructureEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 시장 바이어스.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketBias {
    /// 상승 바이어스
    Bullish,
    /// 하락 바이어스
    Bearish,
    /// 중립 (바이어스 미확립)
    #[default]
    Neutral,
}

impl MarketBias {
    /// 방향에서 바이어스를 생성합니다.
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Bullish => MarketBias::Bullish,
            Direction::Bearish => MarketBias::Bearish,
        }
    }

    /// 방향과 충돌하는지 확인합니다 (중립은 충돌하지 않음).
    pub fn conflicts_with(&self, direction: Direction) -> bool {
        match self {
            MarketBias::Bullish => direction.is_bearish(),
            MarketBias::Bearish => direction.is_bullish(),
            MarketBias::Neutral => false,
        }
    }
}

/// 심볼별 시장 컨텍스트 집계.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    /// 스키마 버전
    pub schema_version: u32,
    /// 심볼
    pub symbol: Symbol,
    /// 현재 바이어스 (상위 타임프레임 기준)
    pub bias: MarketBias,
    /// 최근 구조 이벤트 (고정 최대 개수의 링 버퍼)
    pub recent_events: VecDeque<StructureEvent>,
    /// 최근 패턴 신호 (고정 최대 개수의 링 버퍼)
    pub recent_signals: VecDeque<PatternSignal>,
    /// 마지막 갱신 시각
    pub last_updated: DateTime<Utc>,
}

impl MarketContext {
    /// 컨텍스트 스키마 버전.
    pub const SCHEMA_VERSION: u32 = 1;

    /// 심볼 최초 관측 시 기본 컨텍스트를 생성합니다.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            symbol,
            bias: MarketBias::Neutral,
            recent_events: VecDeque::new(),
            recent_signals: VecDeque::new(),
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// 구조 이벤트를 기록합니다. `limit`를 넘는 오래된 항목은 버립니다.
    pub fn push_event(&mut self, event: StructureEvent, limit: usize) {
        self.recent_events.push_back(event);
        while self.recent_events.len() > limit {
            self.recent_events.pop_front();
        }
    }

    /// 패턴 신호를 기록합니다. `limit`를 넘는 오래된 항목은 버립니다.
    pub fn push_signal(&mut self, signal: PatternSignal, limit: usize) {
        self.recent_signals.push_back(signal);
        while self.recent_signals.len() > limit {
            self.recent_signals.pop_front();
        }
    }

    /// 바이어스를 갱신하고 갱신 시각을 기록합니다.
    pub fn set_bias(&mut self, bias: MarketBias, at: DateTime<Utc>) {
        self.bias = bias;
        self.last_updated = at;
    }

    /// 컨텍스트가 만료되었는지 확인합니다.
    pub fn is_stale(&self, max_age_secs: i64) -> bool {
        (Utc::now() - self.last_updated).num_seconds() > max_age_secs
    }
}
