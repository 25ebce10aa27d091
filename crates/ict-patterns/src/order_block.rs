//! 오더 블록 감지기.
//!
//! 확정된 구조 이벤트 직전의 마지막 반대 방향 캔들을 존으로 기록하고,
//! 새 캔들이 도착할 때마다 완화 상태를 증분 갱신합니다. 전체 재계산은
//! 하지 않습니다 (비용 제한).
//!
//! 완화 규칙:
//! - 가격이 존 범위에 재진입 → `PartiallyMitigated` (첫 터치)
//! - 종가가 존 반대편 끝을 관통 → `Mitigated`
//! - 상태는 절대 역행하지 않음

use chrono::{DateTime, Utc};
use ict_core::config::PatternConfig;
use ict_core::domain::{
    Candle, CandleSeries, Direction, MitigationState, OrderBlock, StructureEvent,
};
use std::collections::BTreeSet;
use tracing::debug;

/// 추적 중인 오더 블록 (돌파 시점 포함).
#[derive(Debug, Clone)]
struct TrackedBlock {
    block: OrderBlock,
    /// 이 존을 만든 구조 돌파 캔들 시각. 완화는 이 시각 이후의
    /// 캔들부터 계산합니다.
    break_at: DateTime<Utc>,
}

/// 오더 블록 추적기.
///
/// (심볼, 타임프레임)별로 하나씩 유지됩니다.
#[derive(Debug, Clone)]
pub struct OrderBlockTracker {
    max_zones: usize,
    tracked: Vec<TrackedBlock>,
    /// 이미 등록한 (원점 시각, 방향) 집합 - 재등록으로 인한
    /// 완화 상태 역행을 방지
    known: BTreeSet<(i64, Direction)>,
    processed_until: Option<DateTime<Utc>>,
}

impl OrderBlockTracker {
    /// 설정으로 추적기를 생성합니다.
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            max_zones: config.max_active_zones,
            tracked: Vec::new(),
            known: BTreeSet::new(),
            processed_until: None,
        }
    }

    /// 구조 이벤트 목록과 시리즈로 추적 상태를 갱신합니다.
    ///
    /// 새 이벤트의 존을 등록한 뒤, 마지막 처리 시각 이후의 캔들만으로
    /// 완화 상태를 전진시킵니다. 변경이 없는 시리즈에 다시 호출해도
    /// 상태는 변하지 않습니다.
    pub fn update(&mut self, series: &CandleSeries, events: &[StructureEvent]) {
        for event in events {
            self.register_event(series, event);
        }
        self.advance_mitigation(series);
        self.enforce_capacity();
    }

    /// 현재 추적 중인 존을 반환합니다 (원점 시각 오름차순).
    pub fn blocks(&self) -> impl Iterator<Item = &OrderBlock> {
        self.tracked.iter().map(|t| &t.block)
    }

    /// 확정된 구조 이벤트에서 오더 블록을 등록합니다.
    fn register_event(&mut self, series: &CandleSeries, event: &StructureEvent) {
        let candles = series.candles();
        let break_idx = match candles.binary_search_by(|c| c.timestamp.cmp(&event.broken_at)) {
            Ok(idx) => idx,
            Err(_) => return,
        };

        // 돌파 직전의 마지막 반대 방향 캔들. 기준 스윙보다 과거로는
        // 내려가지 않습니다.
        let floor = event.swing_reference.index.min(break_idx);
        let origin_idx = (floor..break_idx).rev().find(|&j| match event.direction {
            Direction::Bullish => candles[j].is_bearish(),
            Direction::Bearish => candles[j].is_bullish(),
        });

        let Some(origin_idx) = origin_idx else {
            return;
        };
        let origin_candle = &candles[origin_idx];
        let key = (origin_candle.timestamp.timestamp(), event.direction);
        if self.known.contains(&key) {
            return;
        }
        self.known.insert(key);

        let mut tracked = TrackedBlock {
            block: OrderBlock {
                high: origin_candle.high,
                low: origin_candle.low,
                direction: event.direction,
                origin: origin_candle.timestamp,
                timeframe: series.timeframe,
                mitigation: MitigationState::Unmitigated,
                confidence: (event.confidence * 0.9).clamp(0.0, 1.0),
            },
            break_at: event.broken_at,
        };

        // 이미 처리한 구간에 돌파가 있으면 그 구간의 완화를 따라잡음
        if let Some(until) = self.processed_until {
            for candle in candles
                .iter()
                .filter(|c| c.timestamp > tracked.break_at && c.timestamp <= until)
            {
                apply_candle(&mut tracked.block, candle);
            }
        }

        debug!(
            origin = %tracked.block.origin,
            direction = %tracked.block.direction,
            "오더 블록 등록"
        );
        self.tracked.push(tracked);
        self.tracked.sort_by_key(|t| t.block.origin);
    }

    /// 마지막 처리 시각 이후의 캔들로 완화 상태를 전진시킵니다.
    fn advance_mitigation(&mut self, series: &CandleSeries) {
        let candles = series.candles();
        let from = self.processed_until;

        for candle in candles.iter() {
            if let Some(until) = from {
                if candle.timestamp <= until {
                    continue;
                }
            }
            for tracked in self.tracked.iter_mut() {
                if candle.timestamp > tracked.break_at {
                    apply_candle(&mut tracked.block, candle);
                }
            }
        }

        if let Some(last) = candles.last() {
            self.processed_until = Some(last.timestamp);
        }
    }

    /// 용량 상한을 넘으면 가장 오래된 존부터 버립니다.
    fn enforce_capacity(&mut self) {
        while self.tracked.len() > self.max_zones {
            self.tracked.remove(0);
        }
    }
}

/// 캔들 하나를 존에 적용합니다. 상태는 앞으로만 진행합니다.
fn apply_candle(block: &mut OrderBlock, candle: &Candle) {
    let intersects = candle.low <= block.high && candle.high >= block.low;
    if intersects {
        block.mitigation = block.mitigation.advance_to(MitigationState::PartiallyMitigated);
    }

    let traded_through = match block.direction {
        // 수요 존: 종가가 존 하단 아래로 관통
        Direction::Bullish => candle.close < block.low,
        // 공급 존: 종가가 존 상단 위로 관통
        Direction::Bearish => candle.close > block.high,
    };
    if traded_through {
        block.mitigation = block.mitigation.advance_to(MitigationState::Mitigated);
    }
}
