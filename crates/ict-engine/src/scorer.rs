//! 적응형 신뢰도 보정기.
//!
//! 감지기의 원시 신뢰도를 과거 성과로 보정합니다:
//!
//! ```text
//! final = raw × (0.5 + 0.5 × success_rate)
//! ```
//!
//! 성과가 전무한 패턴도 원시 신뢰도의 절반은 유지하고, 완벽한 성과는
//! 원시 신뢰도를 그대로 통과시킵니다.
//!
//! 추가로 현재 감지의 형태(가격 범위, 방향)가 과거 실패 기록과 임계값
//! 이상 유사하면 패널티 계수를 곱하고 경고를 붙입니다. 이 단계는
//! 결정적이며 결과 신호 외의 부수효과가 없습니다.

use ict_core::config::MemoryConfig;
use ict_core::domain::{OutcomeRecord, PatternDetails, PatternSignal};
use ict_core::types::Price;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 적응형 신뢰도 보정기.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    similarity_threshold: f64,
    failure_penalty: f64,
}

impl ConfidenceScorer {
    /// 설정으로 보정기를 생성합니다.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            failure_penalty: config.failure_penalty,
        }
    }

    /// 신호의 최종 신뢰도를 계산합니다.
    ///
    /// `failures`는 같은 (심볼, 종류, 타임프레임)의 실패 기록이어야
    /// 합니다 (호출자가 필터링).
    pub fn enhance(
        &self,
        mut signal: PatternSignal,
        success_rate: f64,
        failures: &[OutcomeRecord],
    ) -> PatternSignal {
        let mut confidence = signal.raw_confidence * (0.5 + 0.5 * success_rate.clamp(0.0, 1.0));

        if let Some(similarity) = self.best_failure_similarity(&signal, failures) {
            if similarity >= self.similarity_threshold {
                confidence *= self.failure_penalty;
                signal.push_warning(format!(
                    "similar pattern historically failed (similarity {:.2})",
                    similarity
                ));
            }
        }

        signal.with_confidence(confidence)
    }

    /// 실패 기록 중 가장 높은 유사도를 반환합니다.
    fn best_failure_similarity(
        &self,
        signal: &PatternSignal,
        failures: &[OutcomeRecord],
    ) -> Option<f64> {
        let (low, high) = signal_price_range(&signal.details);
        failures
            .iter()
            .filter(|r| r.direction == signal.direction)
            .map(|r| range_overlap_ratio(low, high, r.zone_low, r.zone_high))
            .max_by(|a, b| a.total_cmp(b))
    }
}

/// 감지 세부 내용의 가격 범위를 반환합니다.
pub fn signal_price_range(details: &PatternDetails) -> (Price, Price) {
    match details {
        PatternDetails::Structure(ev) => {
            let a = ev.break_price;
            let b = ev.swing_reference.price;
            (a.min(b), a.max(b))
        }
        PatternDetails::OrderBlock(ob) => (ob.low, ob.high),
        PatternDetails::FairValueGap(gap) => (gap.lower, gap.upper),
    }
}

/// 두 가격 범위의 겹침 비율 (intersection / union, 0.0 ~ 1.0).
fn range_overlap_ratio(a_low: Decimal, a_high: Decimal, b_low: Decimal, b_high: Decimal) -> f64 {
    let intersection = a_high.min(b_high) - a_low.max(b_low);
    if intersection <= Decimal::ZERO {
        return 0.0;
    }
    let union = a_high.max(b_high) - a_low.min(b_low);
    if union <= Decimal::ZERO {
        return 0.0;
    }
    (intersection / union).to_f64().unwrap_or(0.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ict_core::domain::{
        Direction, MitigationState, OrderBlock, PatternOutcome, PatternKind,
    };
    use ict_core::types::{Symbol, Timeframe};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_signal(raw: f64) -> PatternSignal {
        let block = OrderBlock {
            high: dec!(1.1050),
            low: dec!(1.1020),
            direction: Direction::Bullish,
            origin: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
            timeframe: Timeframe::H1,
            mitigation: MitigationState::Unmitigated,
            confidence: raw,
        };
        PatternSignal::from_details(
            Symbol::forex("EUR", "USD"),
            Timeframe::H1,
            PatternDetails::OrderBlock(block),
        )
    }

    fn failure_record(low: Decimal, high: Decimal, direction: Direction) -> OutcomeRecord {
        OutcomeRecord {
            signal_id: Uuid::nil(),
            kind: PatternKind::OrderBlock,
            timeframe: Timeframe::H1,
            symbol: Symbol::forex("EUR", "USD"),
            direction,
            zone_high: high,
            zone_low: low,
            outcome: PatternOutcome::Failure,
            recorded_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(&MemoryConfig::default())
    }

    #[test]
    fn test_neutral_history_scales_by_three_quarters() {
        let signal = scorer().enhance(sample_signal(0.8), 0.5, &[]);
        assert!((signal.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_history_passes_raw_through() {
        let signal = scorer().enhance(sample_signal(0.8), 1.0, &[]);
        assert!((signal.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_zero_history_halves_raw() {
        let signal = scorer().enhance(sample_signal(0.8), 0.0, &[]);
        assert!((signal.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_known_false_positive_penalised() {
        // 거의 동일한 가격 범위의 과거 실패
        let failures = vec![failure_record(dec!(1.1021), dec!(1.1050), Direction::Bullish)];
        let signal = scorer().enhance(sample_signal(0.8), 0.5, &failures);

        // 0.8 × 0.75 × 0.3 = 0.18
        assert!((signal.confidence - 0.18).abs() < 0.01, "{}", signal.confidence);
        assert_eq!(signal.warnings.len(), 1);
        assert!(signal.warnings[0].contains("historically failed"));
    }

    #[test]
    fn test_opposite_direction_failure_ignored() {
        let failures = vec![failure_record(dec!(1.1020), dec!(1.1050), Direction::Bearish)];
        let signal = scorer().enhance(sample_signal(0.8), 0.5, &failures);
        assert!(signal.warnings.is_empty());
        assert!((signal.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_range_failure_ignored() {
        let failures = vec![failure_record(dec!(1.2000), dec!(1.2030), Direction::Bullish)];
        let signal = scorer().enhance(sample_signal(0.8), 0.5, &failures);
        assert!(signal.warnings.is_empty());
    }

    #[test]
    fn test_confidence_always_within_bounds() {
        for raw in [0.0, 0.3, 0.7, 1.0] {
            for rate in [0.0, 0.25, 0.5, 0.75, 1.0] {
                let signal = scorer().enhance(sample_signal(raw), rate, &[]);
                assert!(
                    (0.0..=1.0).contains(&signal.confidence),
                    "raw={} rate={} → {}",
                    raw,
                    rate,
                    signal.confidence
                );
            }
        }
    }

    #[test]
    fn test_enhance_is_deterministic() {
        let failures = vec![failure_record(dec!(1.1020), dec!(1.1050), Direction::Bullish)];
        let a = scorer().enhance(sample_signal(0.8), 0.4, &failures);
        let b = scorer().enhance(sample_signal(0.8), 0.4, &failures);
        assert_eq!(a, b);
    }
}
