//! Fair Value Gap 감지기.
//!
//! 세 캔들 시퀀스에서 첫 캔들과 셋째 캔들의 범위가 겹치지 않아 남는
//! 가격 불균형 구간을 식별합니다:
//! - 상승 갭: `candle1.high < candle3.low` → 범위 [candle1.high, candle3.low]
//! - 하락 갭: `candle1.low > candle3.high` → 범위 [candle3.high, candle1.low]
//!
//! 갭 크기가 가운데 캔들 종가 대비 최소 비율(상품 상대적 임계값)을
//! 넘지 못하면 노이즈로 버립니다. 완화 상태는 오더 블록과 같은 규칙으로
//! 새 캔들마다 증분 갱신합니다.

use chrono::{DateTime, Utc};
use ict_core::config::PatternConfig;
use ict_core::domain::{Candle, CandleSeries, Direction, FairValueGap, MitigationState};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::debug;

/// FVG 추적기.
///
/// (심볼, 타임프레임)별로 하나씩 유지됩니다.
#[derive(Debug, Clone)]
pub struct FvgTracker {
    min_gap_ratio: Decimal,
    max_zones: usize,
    gaps: Vec<FairValueGap>,
    /// 이미 등록한 갭 원점 (가운데 캔들 시각)
    known: BTreeSet<i64>,
    processed_until: Option<DateTime<Utc>>,
}

impl FvgTracker {
    /// 설정으로 추적기를 생성합니다.
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            min_gap_ratio: config.min_gap_ratio,
            max_zones: config.max_active_zones,
            gaps: Vec::new(),
            known: BTreeSet::new(),
            processed_until: None,
        }
    }

    /// 시리즈의 새 캔들을 처리합니다.
    ///
    /// 캔들 하나당: 기존 갭의 완화를 먼저 전진시킨 뒤, 해당 캔들로
    /// 끝나는 삼중 시퀀스에서 새 갭을 찾습니다. 이 순서 덕분에 갭을
    /// 완성한 캔들 자신은 그 갭을 완화하지 않습니다. 변경 없는
    /// 시리즈에 다시 호출해도 상태는 변하지 않습니다.
    pub fn update(&mut self, series: &CandleSeries) {
        let candles = series.candles();

        for i in 0..candles.len() {
            let candle = &candles[i];
            if let Some(until) = self.processed_until {
                if candle.timestamp <= until {
                    continue;
                }
            }

            for gap in self.gaps.iter_mut() {
                // 원점(가운데 캔들)보다 뒤의 캔들만 완화에 참여
                if candle.timestamp > gap.origin {
                    apply_candle(gap, candle);
                }
            }

            if i >= 2 {
                self.try_form_gap(series, i);
            }
        }

        if let Some(last) = candles.last() {
            self.processed_until = Some(last.timestamp);
        }

        while self.gaps.len() > self.max_zones {
            self.gaps.remove(0);
        }
    }

    /// 현재 추적 중인 갭을 반환합니다 (원점 시각 오름차순).
    pub fn gaps(&self) -> impl Iterator<Item = &FairValueGap> {
        self.gaps.iter()
    }

    /// 인덱스 `i`로 끝나는 삼중 시퀀스에서 갭 형성을 시도합니다.
    fn try_form_gap(&mut self, series: &CandleSeries, i: usize) {
        let candles = series.candles();
        let c1 = &candles[i - 2];
        let c2 = &candles[i - 1];
        let c3 = &candles[i];

        let (upper, lower, direction) = if c1.high < c3.low {
            (c3.low, c1.high, Direction::Bullish)
        } else if c1.low > c3.high {
            (c1.low, c3.high, Direction::Bearish)
        } else {
            return;
        };

        let size = upper - lower;
        if c2.close <= Decimal::ZERO {
            return;
        }
        let ratio = size / c2.close;
        if ratio < self.min_gap_ratio {
            // 최소 크기 미달 - 노이즈로 버림
            return;
        }

        let origin_key = c2.timestamp.timestamp();
        if self.known.contains(&origin_key) {
            return;
        }
        self.known.insert(origin_key);

        let ratio_f = ratio.to_f64().unwrap_or(0.0);
        let gap = FairValueGap {
            upper,
            lower,
            direction,
            origin: c2.timestamp,
            timeframe: series.timeframe,
            mitigation: MitigationState::Unmitigated,
            confidence: (0.5 + 40.0 * ratio_f).min(0.9),
        };
        debug!(origin = %gap.origin, direction = %gap.direction, size = %size, "FVG 등록");
        self.gaps.push(gap);
        self.gaps.sort_by_key(|g| g.origin);
    }
}

/// 캔들 하나를 갭에 적용합니다. 상태는 앞으로만 진행합니다.
fn apply_candle(gap: &mut FairValueGap, candle: &Candle) {
    let intersects = candle.low <= gap.upper && candle.high >= gap.lower;
    if intersects {
        gap.mitigation = gap.mitigation.advance_to(MitigationState::PartiallyMitigated);
    }

    let traded_through = match gap.direction {
        // 상승 갭은 아래에서 메워짐: 종가가 갭 하단 아래로
        Direction::Bullish => candle.close < gap.lower,
        // 하락 갭은 위에서 메워짐: 종가가 갭 상단 위로
        Direction::Bearish => candle.close > gap.upper,
    };
    if traded_through {
        gap.mitigation = gap.mitigation.advance_to(MitigationState::Mitigated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ict_core::types::{Symbol, Timeframe};
    use rust_decimal_macros::dec;

    fn build_series(ohlc: &[(Decimal, Decimal, Decimal, Decimal)]) -> CandleSeries {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        let mut ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        for (o, h, l, c) in ohlc {
            series
                .append(Candle::new(ts, *o, *h, *l, *c, dec!(1000)))
                .unwrap();
            ts += Duration::minutes(15);
        }
        series
    }

    /// EURUSD M15 하락 갭: candle1.low = 1.1050, candle3.high = 1.1020.
    fn bearish_gap_data() -> Vec<(Decimal, Decimal, Decimal, Decimal)> {
        vec![
            (dec!(1.1070), dec!(1.1080), dec!(1.1050), dec!(1.1055)),
            (dec!(1.1050), dec!(1.1052), dec!(1.1030), dec!(1.1032)),
            (dec!(1.1018), dec!(1.1020), dec!(1.1005), dec!(1.1008)),
        ]
    }

    #[test]
    fn test_bearish_gap_exact_range() {
        let series = build_series(&bearish_gap_data());
        let mut tracker = FvgTracker::new(&PatternConfig::default());
        tracker.update(&series);

        let gaps: Vec<_> = tracker.gaps().collect();
        assert_eq!(gaps.len(), 1, "정확히 하나의 FVG만 감지되어야 함");

        let gap = gaps[0];
        assert_eq!(gap.direction, Direction::Bearish);
        assert_eq!(gap.lower, dec!(1.1020));
        assert_eq!(gap.upper, dec!(1.1050));
        assert_eq!(gap.mitigation, MitigationState::Unmitigated);
    }

    #[test]
    fn test_small_gap_discarded_as_noise() {
        // 갭 크기 0.00002 - 기본 임계값(0.05%) 미달
        let series = build_series(&[
            (dec!(1.1000), dec!(1.1010), dec!(1.0990), dec!(1.1005)),
            (dec!(1.1005), dec!(1.1015), dec!(1.1000), dec!(1.1012)),
            (dec!(1.10102), dec!(1.1020), dec!(1.10102), dec!(1.1018)),
        ]);
        let mut tracker = FvgTracker::new(&PatternConfig::default());
        tracker.update(&series);
        assert_eq!(tracker.gaps().count(), 0);
    }

    #[test]
    fn test_bullish_gap_mitigation_sequence() {
        let mut data = vec![
            (dec!(1.1000), dec!(1.1010), dec!(1.0990), dec!(1.1008)),
            (dec!(1.1010), dec!(1.1060), dec!(1.1008), dec!(1.1055)),
            (dec!(1.1055), dec!(1.1080), dec!(1.1040), dec!(1.1075)),
        ];
        // 상승 갭: c1.high 1.1010 < c3.low 1.1040 → [1.1010, 1.1040]
        let series = build_series(&data);
        let mut tracker = FvgTracker::new(&PatternConfig::default());
        tracker.update(&series);

        let gap = tracker.gaps().next().unwrap().clone();
        assert_eq!(gap.direction, Direction::Bullish);
        assert_eq!(gap.lower, dec!(1.1010));
        assert_eq!(gap.upper, dec!(1.1040));
        assert_eq!(gap.mitigation, MitigationState::Unmitigated);

        // 갭 안으로 되돌림 → 부분 완화
        data.push((dec!(1.1075), dec!(1.1076), dec!(1.1035), dec!(1.1038)));
        let series = build_series(&data);
        tracker.update(&series);
        assert_eq!(
            tracker.gaps().next().unwrap().mitigation,
            MitigationState::PartiallyMitigated
        );

        // 갭 하단 아래로 종가 관통 → 완전 완화
        data.push((dec!(1.1038), dec!(1.1040), dec!(1.1000), dec!(1.1005)));
        let series = build_series(&data);
        tracker.update(&series);
        assert_eq!(
            tracker.gaps().next().unwrap().mitigation,
            MitigationState::Mitigated
        );

        // 이후 어떤 캔들도 상태를 되돌리지 못함
        data.push((dec!(1.1005), dec!(1.1100), dec!(1.1005), dec!(1.1090)));
        let series = build_series(&data);
        tracker.update(&series);
        assert_eq!(
            tracker.gaps().next().unwrap().mitigation,
            MitigationState::Mitigated
        );
    }

    #[test]
    fn test_update_is_idempotent_on_unchanged_series() {
        let series = build_series(&bearish_gap_data());
        let mut tracker = FvgTracker::new(&PatternConfig::default());
        tracker.update(&series);
        let first: Vec<_> = tracker.gaps().cloned().collect();

        tracker.update(&series);
        let second: Vec<_> = tracker.gaps().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_forming_candle_does_not_mitigate_own_gap() {
        // 셋째 캔들이 갭 범위와 겹치지 않는 순수 하락 갭에서,
        // 형성 직후 상태는 미완화여야 함
        let series = build_series(&bearish_gap_data());
        let mut tracker = FvgTracker::new(&PatternConfig::default());
        tracker.update(&series);
        assert_eq!(
            tracker.gaps().next().unwrap().mitigation,
            MitigationState::Unmitigated
        );
    }
}
