//! 스윙 포인트 분석기.
//!
//! 캔들 시리즈에서 국소 극값(스윙 하이/로우)을 식별합니다. 모든 구조
//! 감지기가 이 결과를 입력으로 사용합니다.
//!
//! # 판정 규칙
//!
//! 인덱스 `i`의 캔들은 다음 조건을 만족하면 스윙 하이입니다:
//! - 고가가 왼쪽 윈도우 `[i-w, i-1]`의 모든 고가보다 엄격하게 크고,
//! - 오른쪽 윈도우 `[i+1, i+w]`의 모든 고가보다 크거나 같음
//!
//! 오른쪽이 크거나-같음인 이유: 동일 고가가 이어질 때 가장 이른
//! 인덱스가 스윙으로 판정되고, 뒤의 캔들은 왼쪽 엄격 비교에서
//! 탈락합니다. 스윙 로우는 대칭 규칙입니다.
//!
//! 결과는 호출할 때마다 요청 슬라이스 전체에 대해 재계산되며 결정적입니다.
//! 비용 제한은 호출자가 윈도우잉으로 담당합니다.

use ict_core::config::SwingConfig;
use ict_core::domain::{CandleSeries, SwingKind, SwingPoint};

/// 스윙 포인트 분석기.
#[derive(Debug, Clone)]
pub struct SwingAnalyzer {
    /// 룩백 윈도우 (양쪽 각각의 캔들 수)
    window: usize,
}

impl SwingAnalyzer {
    /// 설정으로 분석기를 생성합니다.
    pub fn new(config: &SwingConfig) -> Self {
        Self {
            window: config.window,
        }
    }

    /// 윈도우 크기를 직접 지정하여 생성합니다.
    pub fn with_window(window: usize) -> Self {
        Self { window }
    }

    /// 시리즈에서 스윙 포인트를 식별합니다.
    ///
    /// `2w+1`보다 짧은 시리즈는 빈 결과를 반환합니다 (에러 아님).
    /// 결과는 인덱스 오름차순이며, 같은 인덱스에 하이와 로우가 모두
    /// 있으면 하이가 먼저 옵니다.
    pub fn find_swing_points(&self, series: &CandleSeries) -> Vec<SwingPoint> {
        let candles = series.candles();
        let w = self.window;
        let mut points = Vec::new();

        if w == 0 || candles.len() < 2 * w + 1 {
            return points;
        }

        for i in w..candles.len() - w {
            let current = &candles[i];

            let is_swing_high = candles[i - w..i].iter().all(|c| current.high > c.high)
                && candles[i + 1..=i + w].iter().all(|c| current.high >= c.high);

            let is_swing_low = candles[i - w..i].iter().all(|c| current.low < c.low)
                && candles[i + 1..=i + w].iter().all(|c| current.low <= c.low);

            if is_swing_high {
                points.push(SwingPoint {
                    timestamp: current.timestamp,
                    price: current.high,
                    kind: SwingKind::High,
                    index: i,
                    series_revision: series.revision(),
                });
            }
            if is_swing_low {
                points.push(SwingPoint {
                    timestamp: current.timestamp,
                    price: current.low,
                    kind: SwingKind::Low,
                    index: i,
                    series_revision: series.revision(),
                });
            }
        }

        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ict_core::domain::Candle;
    use ict_core::types::{Symbol, Timeframe};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn series_from_highs_lows(pairs: &[(Decimal, Decimal)]) -> CandleSeries {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        for (i, (high, low)) in pairs.iter().enumerate() {
            let mid = (*high + *low) / dec!(2);
            series
                .append(Candle::new(
                    Utc.timestamp_opt(1_700_000_000 + (i as i64) * 900, 0).unwrap(),
                    mid,
                    *high,
                    *low,
                    mid,
                    dec!(1000),
                ))
                .unwrap();
        }
        series
    }

    #[test]
    fn test_simple_swing_high_and_low() {
        // 가운데(인덱스 2)에 명확한 고점과 인덱스 5에 저점
        let series = series_from_highs_lows(&[
            (dec!(10), dec!(9)),
            (dec!(11), dec!(10)),
            (dec!(14), dec!(12)), // 스윙 하이
            (dec!(11), dec!(10)),
            (dec!(10), dec!(9)),
            (dec!(9), dec!(7)), // 스윙 로우
            (dec!(10), dec!(8)),
            (dec!(11), dec!(9)),
        ]);

        let analyzer = SwingAnalyzer::with_window(2);
        let points = analyzer.find_swing_points(&series);

        let highs: Vec<_> = points.iter().filter(|p| p.kind == SwingKind::High).collect();
        let lows: Vec<_> = points.iter().filter(|p| p.kind == SwingKind::Low).collect();

        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 2);
        assert_eq!(highs[0].price, dec!(14));

        assert_eq!(lows.len(), 1);
        assert_eq!(lows[0].index, 5);
        assert_eq!(lows[0].price, dec!(7));
    }

    #[test]
    fn test_short_series_yields_empty() {
        let series = series_from_highs_lows(&[
            (dec!(10), dec!(9)),
            (dec!(11), dec!(10)),
            (dec!(12), dec!(11)),
        ]);
        // 2w+1 = 7 > 3
        let analyzer = SwingAnalyzer::with_window(3);
        assert!(analyzer.find_swing_points(&series).is_empty());
    }

    #[test]
    fn test_equal_highs_resolve_to_earliest() {
        // 인덱스 2와 3이 같은 고가 - 이른 인덱스만 스윙 하이
        let series = series_from_highs_lows(&[
            (dec!(10), dec!(9)),
            (dec!(11), dec!(10)),
            (dec!(14), dec!(12)),
            (dec!(14), dec!(12)),
            (dec!(11), dec!(10)),
            (dec!(10), dec!(9)),
        ]);

        let analyzer = SwingAnalyzer::with_window(2);
        let highs: Vec<_> = analyzer
            .find_swing_points(&series)
            .into_iter()
            .filter(|p| p.kind == SwingKind::High)
            .collect();

        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 2);
    }

    #[test]
    fn test_deterministic_for_overlapping_prefix() {
        let pairs: Vec<(Decimal, Decimal)> = (0..30)
            .map(|i| {
                let base = dec!(100) + Decimal::from((i * 7) % 13);
                (base + dec!(2), base - dec!(2))
            })
            .collect();

        let full = series_from_highs_lows(&pairs);
        let prefix = series_from_highs_lows(&pairs[..20]);

        let analyzer = SwingAnalyzer::with_window(3);
        let full_points = analyzer.find_swing_points(&full);
        let prefix_points = analyzer.find_swing_points(&prefix);

        // 접두 구간에서 확정 가능한 스윙은 양쪽 실행에서 동일해야 함
        for p in &prefix_points {
            let matching = full_points
                .iter()
                .find(|q| q.index == p.index && q.kind == p.kind);
            assert!(matching.is_some(), "prefix swing at {} missing in full run", p.index);
            assert_eq!(matching.unwrap().price, p.price);
        }
    }

    proptest! {
        #[test]
        fn prop_swing_detection_is_deterministic(
            seeds in prop::collection::vec(1u32..1000, 10..40),
        ) {
            let pairs: Vec<(Decimal, Decimal)> = seeds
                .iter()
                .map(|s| {
                    let base = dec!(100) + Decimal::from(*s % 40);
                    (base + dec!(1), base - dec!(1))
                })
                .collect();
            let series = series_from_highs_lows(&pairs);
            let analyzer = SwingAnalyzer::with_window(2);

            let first = analyzer.find_swing_points(&series);
            let second = analyzer.find_swing_points(&series);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_swing_indices_have_full_windows(
            seeds in prop::collection::vec(1u32..1000, 7..50),
            window in 1usize..4,
        ) {
            let pairs: Vec<(Decimal, Decimal)> = seeds
                .iter()
                .map(|s| {
                    let base = dec!(100) + Decimal::from(*s % 40);
                    (base + dec!(1), base - dec!(1))
                })
                .collect();
            let series = series_from_highs_lows(&pairs);
            let analyzer = SwingAnalyzer::with_window(window);

            for point in analyzer.find_swing_points(&series) {
                prop_assert!(point.index >= window);
                prop_assert!(point.index + window < series.len());
            }
        }
    }
}
