//! 멀티 타임프레임 코디네이터.
//!
//! 권위 순서 계약:
//! - 상위 타임프레임(HTF)이 방향 바이어스 필터를 결정합니다.
//! - 중간 타임프레임(MTF) 감지는 HTF 바이어스와 방향이 일치할 때만
//!   "정합"으로 표면화되며, 불일치 시 버리지 않고 `conflicting_bias`
//!   플래그를 붙여 반환합니다 (소비자가 판단).
//! - 하위 타임프레임(LTF) 감지는 추가로 최근 MTF 이벤트의 확인을
//!   요구하며, 확인 창을 벗어나면 `unconfirmed_timing` 플래그를 붙입니다.
//!
//! 타이브레이크: HTF와 MTF가 충돌하면 바이어스 필드는 HTF가 이기고,
//! 불일치 사실은 플래그/경고로 기록되어 조용히 사라지지 않습니다.
//! 일부 타임프레임의 데이터가 없으면 해당 단계는 명시적 "unavailable"
//! 경고와 함께 생략되며, 결과 자체는 반환됩니다.

use crate::killzone;
use chrono::{DateTime, Duration, Utc};
use ict_core::config::CoordinatorConfig;
use ict_core::domain::{
    FairValueGap, MarketBias, MitigationState, OrderBlock, PatternDetails, PatternSignal,
    StructureEvent,
};
use ict_core::types::{Symbol, Timeframe};
use tracing::debug;

/// 단일 타임프레임의 감지 패스 결과.
#[derive(Debug, Clone)]
pub struct TimeframeScan {
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 구조 스캔이 판정한 바이어스
    pub bias: MarketBias,
    /// 구조 이벤트 (발생 순서)
    pub events: Vec<StructureEvent>,
    /// 추적 중인 오더 블록
    pub blocks: Vec<OrderBlock>,
    /// 추적 중인 FVG
    pub gaps: Vec<FairValueGap>,
    /// 마지막 캔들 시각
    pub last_candle: Option<DateTime<Utc>>,
}

/// 병합 결과.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// 최종 바이어스 (HTF 승리)
    pub bias: MarketBias,
    /// 감지기 출력당 하나씩의 패턴 신호
    pub signals: Vec<PatternSignal>,
}

/// 멀티 타임프레임 코디네이터.
#[derive(Debug, Clone)]
pub struct Coordinator {
    config: CoordinatorConfig,
}

impl Coordinator {
    /// 설정으로 코디네이터를 생성합니다.
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// 세 권위 단계의 스캔 결과를 하나의 신호 목록으로 병합합니다.
    ///
    /// 각 단계는 데이터가 없으면 `None`일 수 있습니다. 결과는 입력의
    /// 순수 함수이며 결정적입니다.
    pub fn merge(
        &self,
        symbol: &Symbol,
        htf: Option<&TimeframeScan>,
        mtf: Option<&TimeframeScan>,
        ltf: Option<&TimeframeScan>,
    ) -> MergeOutcome {
        // HTF가 바이어스를 결정. 없으면 중립으로 판정을 보류
        let bias = htf.map(|scan| scan.bias).unwrap_or(MarketBias::Neutral);
        let htf_available = htf.is_some();

        let mut signals = Vec::new();

        // HTF 단계: 바이어스 원천이므로 충돌 검사 없이 표면화
        if let Some(scan) = htf {
            for mut signal in scan_signals(symbol, scan) {
                signal.killzone = killzone::active_killzone(signal.detected_at);
                signals.push(signal);
            }
        }

        // MTF 단계: HTF 바이어스와의 방향 정합 검사
        if let Some(scan) = mtf {
            for mut signal in scan_signals(symbol, scan) {
                if !htf_available {
                    signal.push_warning("higher timeframe data unavailable");
                } else if bias.conflicts_with(signal.direction) {
                    // HTF가 바이어스를 이기지만 불일치는 기록
                    signal.conflicting_bias = true;
                    signal.push_warning(format!(
                        "direction conflicts with {} bias",
                        self.config.higher
                    ));
                    debug!(
                        symbol = %symbol,
                        timeframe = %scan.timeframe,
                        "바이어스 불일치 감지 - 신호는 플래그와 함께 유지"
                    );
                } else if let Some(htf_scan) = htf {
                    signal.contributing_timeframes.push(htf_scan.timeframe);
                }
                signal.killzone = killzone::active_killzone(signal.detected_at);
                signals.push(signal);
            }
        }

        // LTF 단계: 바이어스 정합 + MTF 확인 창 검사
        if let Some(scan) = ltf {
            for mut signal in scan_signals(symbol, scan) {
                if !htf_available {
                    signal.push_warning("higher timeframe data unavailable");
                } else if bias.conflicts_with(signal.direction) {
                    signal.conflicting_bias = true;
                    signal.push_warning(format!(
                        "direction conflicts with {} bias",
                        self.config.higher
                    ));
                } else {
                    signal.contributing_timeframes.push(self.config.higher);
                }

                match mtf {
                    Some(mtf_scan) => {
                        if self.confirmed_by_mtf(&signal, mtf_scan) {
                            signal.contributing_timeframes.push(mtf_scan.timeframe);
                        } else {
                            signal.unconfirmed_timing = true;
                            signal.push_warning(format!(
                                "no {} confirmation within window",
                                mtf_scan.timeframe
                            ));
                        }
                    }
                    None => {
                        signal.unconfirmed_timing = true;
                        signal.push_warning("middle timeframe data unavailable");
                    }
                }

                signal.killzone = killzone::active_killzone(signal.detected_at);
                signals.push(signal);
            }
        }

        MergeOutcome { bias, signals }
    }

    /// LTF 신호가 확인 창 안의 같은 방향 MTF 이벤트로 확인되는지
    /// 판정합니다.
    fn confirmed_by_mtf(&self, signal: &PatternSignal, mtf: &TimeframeScan) -> bool {
        let window = Duration::seconds(
            (self.config.confirmation_window as i64) * (mtf.timeframe.as_secs() as i64),
        );
        mtf.events.iter().any(|event| {
            event.direction == signal.direction
                && event.broken_at <= signal.detected_at
                && signal.detected_at - event.broken_at <= window
        })
    }
}

/// 스캔 결과를 신호 목록으로 변환합니다.
///
/// 완전 완화된 존은 관련성을 잃었으므로 신호로 표면화하지 않습니다.
fn scan_signals(symbol: &Symbol, scan: &TimeframeScan) -> Vec<PatternSignal> {
    let mut signals = Vec::new();

    for event in &scan.events {
        signals.push(PatternSignal::from_details(
            symbol.clone(),
            scan.timeframe,
            PatternDetails::Structure(event.clone()),
        ));
    }
    for block in &scan.blocks {
        if block.mitigation == MitigationState::Mitigated {
            continue;
        }
        signals.push(PatternSignal::from_details(
            symbol.clone(),
            scan.timeframe,
            PatternDetails::OrderBlock(block.clone()),
        ));
    }
    for gap in &scan.gaps {
        if gap.mitigation == MitigationState::Mitigated {
            continue;
        }
        signals.push(PatternSignal::from_details(
            symbol.clone(),
            scan.timeframe,
            PatternDetails::FairValueGap(gap.clone()),
        ));
    }

    signals
}
