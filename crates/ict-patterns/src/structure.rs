//! 구조 이벤트 감지기 (BOS / CHoCH).
//!
//! (심볼, 타임프레임)별 상태 기계입니다. 상태:
//! - `NoBias` - 방향성 미확립
//! - `Established(d)` - 연속된 스윙 포인트가 방향성 시퀀스를 형성함
//! - `Broken(d)` - BOS 발생 직후 (이후 전이에서는 `Established(d)`와 동일)
//!
//! `scan`은 요청 슬라이스 전체를 결정적으로 순회합니다. 같은 입력은
//! 항상 같은 출력을 만들며, 돌파 캔들 하나당 이벤트는 최대 하나입니다.
//!
//! 엣지 정책:
//! - 스윙 포인트가 2개 미만이면 이벤트 없음 (에러 아님)
//! - 설정 배수를 넘는 캔들 간격은 바이어스를 무효화 (세션 경계의
//!   오래된 구조 방지)

use ict_core::config::{StructureConfig, SwingConfig};
use ict_core::domain::{
    CandleSeries, Direction, MarketBias, StructureEvent, StructureKind, SwingKind, SwingPoint,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 바이어스 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasState {
    /// 방향성 미확립
    NoBias,
    /// 바이어스 확립
    Established(Direction),
    /// 구조 돌파 직후 (방향 유지)
    Broken(Direction),
}

impl BiasState {
    /// 현재 방향을 반환합니다.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            BiasState::NoBias => None,
            BiasState::Established(d) | BiasState::Broken(d) => Some(*d),
        }
    }

    /// 시장 바이어스로 변환합니다.
    pub fn as_market_bias(&self) -> MarketBias {
        match self.direction() {
            Some(d) => MarketBias::from_direction(d),
            None => MarketBias::Neutral,
        }
    }
}

/// 한 번의 스캔 결과.
#[derive(Debug, Clone)]
pub struct StructureScan {
    /// 슬라이스 끝 시점의 상태
    pub state: BiasState,
    /// 발생 순서대로의 구조 이벤트
    pub events: Vec<StructureEvent>,
}

/// 확인 대기 중인 돌파.
#[derive(Debug, Clone)]
struct PendingBreak {
    kind: StructureKind,
    direction: Direction,
    level: Decimal,
    break_index: usize,
    swing_ref: SwingPoint,
}

/// 구조 이벤트 감지기.
#[derive(Debug, Clone)]
pub struct StructureDetector {
    /// 돌파 확인에 필요한 후속 캔들 수
    confirmation_candles: usize,
    /// 바이어스 무효화 간격 배수
    gap_factor: f64,
    /// 스윙 확정 지연 (스윙 분석기의 오른쪽 윈도우)
    swing_window: usize,
}

impl StructureDetector {
    /// 설정으로 감지기를 생성합니다.
    pub fn new(structure: &StructureConfig, swing: &SwingConfig) -> Self {
        Self {
            confirmation_candles: structure.confirmation_candles,
            gap_factor: structure.gap_invalidation_factor,
            swing_window: swing.window,
        }
    }

    /// 시리즈와 스윙 포인트를 순회하며 구조 이벤트를 감지합니다.
    pub fn scan(&self, series: &CandleSeries, swings: &[SwingPoint]) -> StructureScan {
        let candles = series.candles();

        if swings.len() < 2 {
            return StructureScan {
                state: BiasState::NoBias,
                events: Vec::new(),
            };
        }

        let mut events: Vec<StructureEvent> = Vec::new();
        let mut state = BiasState::NoBias;
        let mut last_high: Option<SwingPoint> = None;
        let mut last_low: Option<SwingPoint> = None;
        let mut pending: Option<PendingBreak> = None;
        let mut swing_idx = 0;

        for i in 0..candles.len() {
            // 세션 경계: 오래된 구조를 버리고 처음부터 다시 확립.
            // 갭 이전에 형성된 미활성 스윙도 함께 폐기합니다.
            if series.is_gap_before(i, self.gap_factor) {
                state = BiasState::NoBias;
                last_high = None;
                last_low = None;
                pending = None;
                while swing_idx < swings.len() && swings[swing_idx].index < i {
                    swing_idx += 1;
                }
            }

            // 캔들 i 시점에 확정된 스윙 포인트 반영.
            // 스윙은 오른쪽 윈도우가 모두 관측된 뒤에만 활성화됩니다.
            while swing_idx < swings.len() && swings[swing_idx].index + self.swing_window <= i {
                let sp = &swings[swing_idx];
                match sp.kind {
                    SwingKind::High => {
                        if state == BiasState::NoBias {
                            if let Some(prev) = &last_high {
                                if sp.price > prev.price {
                                    state = BiasState::Established(Direction::Bullish);
                                } else if sp.price < prev.price {
                                    state = BiasState::Established(Direction::Bearish);
                                }
                            }
                        }
                        last_high = Some(sp.clone());
                    }
                    SwingKind::Low => {
                        if state == BiasState::NoBias {
                            if let Some(prev) = &last_low {
                                if sp.price < prev.price {
                                    state = BiasState::Established(Direction::Bearish);
                                } else if sp.price > prev.price {
                                    state = BiasState::Established(Direction::Bullish);
                                }
                            }
                        }
                        last_low = Some(sp.clone());
                    }
                }
                swing_idx += 1;
            }

            let candle = &candles[i];

            // 대기 중인 돌파의 확인/취소
            if let Some(p) = pending.clone() {
                if i > p.break_index {
                    let retraced = match p.direction {
                        Direction::Bullish => candle.close < p.level,
                        Direction::Bearish => candle.close > p.level,
                    };
                    if retraced {
                        pending = None;
                    } else if i - p.break_index >= self.confirmation_candles {
                        let break_candle = &candles[p.break_index];
                        let confidence = break_confidence(
                            p.kind,
                            break_candle.close,
                            p.level,
                            break_candle.range(),
                        );
                        events.push(StructureEvent {
                            kind: p.kind,
                            direction: p.direction,
                            timeframe: series.timeframe,
                            break_price: p.level,
                            broken_at: break_candle.timestamp,
                            swing_reference: p.swing_ref.clone(),
                            confidence,
                        });

                        state = match p.kind {
                            StructureKind::Bos => BiasState::Broken(p.direction),
                            StructureKind::Choch => BiasState::Established(p.direction),
                        };

                        // 돌파된 스윙 레벨은 소모됨
                        match p.direction {
                            Direction::Bullish => {
                                if last_high.as_ref().map(|h| h.index) == Some(p.swing_ref.index) {
                                    last_high = None;
                                }
                            }
                            Direction::Bearish => {
                                if last_low.as_ref().map(|l| l.index) == Some(p.swing_ref.index) {
                                    last_low = None;
                                }
                            }
                        }
                        pending = None;
                    }
                }
            }

            // 새 돌파 후보 (돌파 캔들당 이벤트 하나)
            if pending.is_none() {
                if let Some(d) = state.direction() {
                    pending = self.break_candidate(d, candle.close, i, &last_high, &last_low);
                }
            }
        }

        StructureScan { state, events }
    }

    /// 캔들 종가가 스윙 레벨을 돌파했는지 판정합니다.
    fn break_candidate(
        &self,
        bias: Direction,
        close: Decimal,
        index: usize,
        last_high: &Option<SwingPoint>,
        last_low: &Option<SwingPoint>,
    ) -> Option<PendingBreak> {
        match bias {
            Direction::Bullish => {
                // 연속: 최근 스윙 하이 상향 돌파
                if let Some(h) = last_high {
                    if close > h.price {
                        return Some(PendingBreak {
                            kind: StructureKind::Bos,
                            direction: Direction::Bullish,
                            level: h.price,
                            break_index: index,
                            swing_ref: h.clone(),
                        });
                    }
                }
                // 반전: 최근 스윙 로우 하향 돌파
                if let Some(l) = last_low {
                    if close < l.price {
                        return Some(PendingBreak {
                            kind: StructureKind::Choch,
                            direction: Direction::Bearish,
                            level: l.price,
                            break_index: index,
                            swing_ref: l.clone(),
                        });
                    }
                }
            }
            Direction::Bearish => {
                if let Some(l) = last_low {
                    if close < l.price {
                        return Some(PendingBreak {
                            kind: StructureKind::Bos,
                            direction: Direction::Bearish,
                            level: l.price,
                            break_index: index,
                            swing_ref: l.clone(),
                        });
                    }
                }
                if let Some(h) = last_high {
                    if close > h.price {
                        return Some(PendingBreak {
                            kind: StructureKind::Choch,
                            direction: Direction::Bullish,
                            level: h.price,
                            break_index: index,
                            swing_ref: h.clone(),
                        });
                    }
                }
            }
        }
        None
    }
}

/// 돌파 신뢰도 계산.
///
/// 레벨 관통 깊이를 돌파 캔들 범위 대비로 정규화하여 기본값에 더합니다.
fn break_confidence(kind: StructureKind, close: Decimal, level: Decimal, range: Decimal) -> f64 {
    let base = match kind {
        StructureKind::Bos => 0.6,
        StructureKind::Choch => 0.55,
    };
    let penetration = (close - level).abs();
    let ratio = if range > Decimal::ZERO {
        (penetration / range).to_f64().unwrap_or(0.0).min(1.0)
    } else {
        0.0
    };
    (base + 0.35 * ratio).min(0.95)
}
