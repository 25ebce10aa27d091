//! 과거 성과 분석기.
//!
//! 메모리 저장소의 결과 로그를 읽어 패턴 종류/타임프레임별 시간 감쇠
//! 성공률을 계산하고, 감지기 신뢰도 보정에 피드백합니다.
//!
//! # 감쇠 모델
//!
//! 각 기록의 가중치는 경과 시간에 따라 반감기 `half_life_days`로
//! 감쇠합니다: `w = 0.5^(elapsed_days / half_life)`. 가중 평균은 중립
//! 사전값 0.5로 수축(shrinkage)되므로, 새 기록 없이 시간이 지나면
//! 성공률은 단조롭게 중립값에 접근하여 오래된 데이터에 과적합하지
//! 않습니다.
//!
//! 표본 수가 `min_sample_count` 미만이면 희소 데이터에서의 과신을
//! 피하기 위해 정확히 0.5를 반환합니다.

use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use ict_core::config::MemoryConfig;
use ict_core::domain::{HistoricalStat, PatternKind, PatternOutcome};
use ict_core::types::Timeframe;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// 중립 사전값.
const NEUTRAL_PRIOR: f64 = 0.5;
/// 사전값의 의사 가중치. 증거 가중치 합이 이 값 이하로 감쇠하면
/// 성공률은 사전값에 지배됩니다.
const PRIOR_STRENGTH: f64 = 1.0;

/// 과거 성과 분석기.
pub struct HistoricalAnalyzer {
    store: Arc<MemoryStore>,
    half_life_days: f64,
    min_samples: usize,
    /// (종류, 타임프레임, as_of)별 계산 캐시.
    /// 파생 값이므로 언제든 원시 기록에서 재계산 가능합니다.
    cache: RwLock<HashMap<(PatternKind, Timeframe), HistoricalStat>>,
}

impl HistoricalAnalyzer {
    /// 분석기를 생성합니다.
    pub fn new(store: Arc<MemoryStore>, config: &MemoryConfig) -> Self {
        Self {
            store,
            half_life_days: config.half_life_days,
            min_samples: config.min_sample_count,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 시간 감쇠 성공률을 반환합니다 (0.0 ~ 1.0).
    pub async fn success_rate(
        &self,
        kind: PatternKind,
        timeframe: Timeframe,
        as_of: DateTime<Utc>,
    ) -> f64 {
        self.stat(kind, timeframe, as_of).await.success_rate
    }

    /// 성과 통계를 계산합니다.
    ///
    /// 같은 `as_of`로 계산된 캐시가 있으면 재사용합니다. 기준 시각이
    /// 감지 패스의 마지막 캔들 시각으로 고정되므로, 변경 없는 입력에
    /// 대한 반복 호출은 동일한 결과를 냅니다.
    pub async fn stat(
        &self,
        kind: PatternKind,
        timeframe: Timeframe,
        as_of: DateTime<Utc>,
    ) -> HistoricalStat {
        if let Some(cached) = self.cache.read().await.get(&(kind, timeframe)) {
            if cached.last_updated == as_of {
                return cached.clone();
            }
        }

        let stat = self.compute(kind, timeframe, as_of).await;
        self.cache
            .write()
            .await
            .insert((kind, timeframe), stat.clone());
        stat
    }

    async fn compute(
        &self,
        kind: PatternKind,
        timeframe: Timeframe,
        as_of: DateTime<Utc>,
    ) -> HistoricalStat {
        let mut weight_sum = 0.0_f64;
        let mut weighted_success = 0.0_f64;
        let mut count = 0usize;

        for record in self.store.query_outcomes(kind, timeframe, as_of).await {
            let score = match record.outcome {
                PatternOutcome::Success => 1.0,
                PatternOutcome::Failure => 0.0,
                // 판정 불가 기록은 통계에서 제외
                PatternOutcome::Undetermined => continue,
            };

            let elapsed_days =
                (as_of - record.recorded_at).num_seconds().max(0) as f64 / 86_400.0;
            let weight = 0.5_f64.powf(elapsed_days / self.half_life_days);

            weight_sum += weight;
            weighted_success += weight * score;
            count += 1;
        }

        let success_rate = if count < self.min_samples {
            NEUTRAL_PRIOR
        } else {
            (weighted_success + PRIOR_STRENGTH * NEUTRAL_PRIOR) / (weight_sum + PRIOR_STRENGTH)
        };

        debug!(
            kind = %kind,
            timeframe = %timeframe,
            samples = count,
            success_rate = success_rate,
            "성과 통계 계산"
        );

        HistoricalStat {
            kind,
            timeframe,
            sample_count: count,
            success_rate,
            last_updated: as_of,
        }
    }
}
