//! 패턴 엔진 파사드.
//!
//! 코어의 유일한 공개 표면입니다:
//! - `update_candles` - 시장 데이터 협력자의 append-only 캔들 주입
//! - `analyze(symbol, timeframe)` - 감지 패스 실행, 패턴 신호 목록 반환
//! - `get_market_context(symbol)` - 읽기 전용 컨텍스트 스냅샷
//! - `record_outcome` - 다운스트림 소비자의 결과 보고 (메모리 축적)
//!
//! # 동시성 모델
//!
//! 심볼별 상태는 잠금 맵의 `Arc<Mutex<_>>`가 배타 소유합니다. 같은
//! 심볼의 패스는 직렬화되고, 서로 다른 심볼의 패스는 자유롭게 병렬
//! 실행됩니다. 한 심볼의 패스 실패는 다른 심볼의 패스를 중단시키지
//! 않습니다.

use crate::coordinator::{Coordinator, TimeframeScan};
use crate::scorer::ConfidenceScorer;
use ict_core::config::EngineConfig;
use ict_core::domain::{
    Candle, CandleFeed, CandleSeries, MarketContext, OutcomeRecord, PatternOutcome, PatternSignal,
};
use ict_core::error::EngineResult;
use ict_core::types::{Symbol, Timeframe};
use ict_memory::{CacheKey, DecisionCache, HistoricalAnalyzer, MemoryStore};
use ict_patterns::{FvgTracker, OrderBlockTracker, StructureDetector, SwingAnalyzer};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

type SeriesKey = (String, Timeframe);

/// 타임프레임별 존 추적기 묶음.
struct ZoneTrackers {
    order_blocks: OrderBlockTracker,
    fvgs: FvgTracker,
}

impl ZoneTrackers {
    fn new(config: &ict_core::config::PatternConfig) -> Self {
        Self {
            order_blocks: OrderBlockTracker::new(config),
            fvgs: FvgTracker::new(config),
        }
    }
}

/// 심볼별 배타 소유 상태.
struct SymbolState {
    context: MarketContext,
    zones: HashMap<Timeframe, ZoneTrackers>,
}

/// 멀티 타임프레임 패턴 엔진.
pub struct PatternEngine {
    config: EngineConfig,
    swing: SwingAnalyzer,
    structure: StructureDetector,
    coordinator: Coordinator,
    scorer: ConfidenceScorer,
    store: Arc<MemoryStore>,
    historical: HistoricalAnalyzer,
    cache: DecisionCache,
    /// (심볼, 타임프레임)별 캔들 시리즈
    series: RwLock<HashMap<SeriesKey, CandleSeries>>,
    /// 심볼별 상태 잠금 맵
    symbols: RwLock<HashMap<String, Arc<Mutex<SymbolState>>>>,
}

impl PatternEngine {
    /// 엔진을 생성합니다.
    ///
    /// 설정 검증 실패는 시작 시점의 치명적 에러입니다. 메모리 저장소
    /// 불능은 치명적이지 않으며 인메모리 강등으로 처리됩니다.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let store = Arc::new(MemoryStore::open(&config.memory));
        let historical = HistoricalAnalyzer::new(store.clone(), &config.memory);

        Ok(Self {
            swing: SwingAnalyzer::new(&config.swing),
            structure: StructureDetector::new(&config.structure, &config.swing),
            coordinator: Coordinator::new(&config.coordinator),
            scorer: ConfidenceScorer::new(&config.memory),
            historical,
            cache: DecisionCache::new(&config.cache),
            store,
            series: RwLock::new(HashMap::new()),
            symbols: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// 메모리 저장소가 인메모리 전용으로 강등된 상태인지 확인합니다.
    pub fn is_memory_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    /// 캔들을 주입합니다 (append-only).
    ///
    /// 역행 타임스탬프는 `Data` 에러로 거부합니다. 추가된 캔들 수를
    /// 반환합니다 (마지막 캔들과 동일한 중복은 무시).
    pub async fn update_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> EngineResult<usize> {
        let mut series_map = self.series.write().await;
        let entry = series_map
            .entry((symbol.pair(), timeframe))
            .or_insert_with(|| CandleSeries::new(symbol.clone(), timeframe));
        entry.extend(candles)
    }

    /// 시장 데이터 협력자에게 과거 캔들 백필을 요청해 주입합니다.
    pub async fn backfill_from(
        &self,
        feed: &dyn CandleFeed,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> EngineResult<usize> {
        let candles = feed.backfill(symbol, timeframe, limit).await?;
        self.update_candles(symbol, timeframe, candles).await
    }

    /// 감지 패스를 실행합니다.
    ///
    /// 요청 타임프레임이 진입(하위) 단계가 되고, 상위/중간 단계는
    /// 설정의 권위 사다리에서 옵니다. 데이터가 없는 단계는 명시적
    /// "unavailable" 경고와 함께 생략됩니다. 데이터 부족은 빈 목록을
    /// 반환할 뿐 에러가 아닙니다.
    #[instrument(skip(self), fields(symbol = %symbol, timeframe = %timeframe))]
    pub async fn analyze(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> EngineResult<Vec<PatternSignal>> {
        // 심볼별 배타 잠금: 같은 심볼의 동시 패스를 설계로 차단
        let state_arc = self.symbol_state(symbol).await;
        let mut state = state_arc.lock().await;

        let (htf_tf, mtf_tf, ltf_tf) = self.ladder_for(timeframe);

        // 시리즈 스냅샷 (짧은 읽기 잠금)
        let (htf_series, mtf_series, ltf_series, requested_closes) = {
            let series_map = self.series.read().await;
            let get = |tf: Option<Timeframe>| {
                tf.and_then(|tf| series_map.get(&(symbol.pair(), tf)).cloned())
            };
            let requested = series_map.get(&(symbol.pair(), timeframe));
            let closes: Vec<Decimal> = requested
                .map(|s| {
                    s.last_n(self.cache.state_hash_candles())
                        .iter()
                        .map(|c| c.close)
                        .collect()
                })
                .unwrap_or_default();
            (get(htf_tf), get(mtf_tf), get(ltf_tf), closes)
        };

        // 의미 있는 변화 없음 → 캐시된 결과 재사용
        let cache_key = CacheKey {
            symbol: symbol.pair(),
            timeframe,
            state_hash: DecisionCache::state_hash(symbol, timeframe, &requested_closes),
        };
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        // 단계별 스캔
        let htf_scan = htf_series.as_ref().map(|s| self.scan_timeframe(&mut state, s));
        let mtf_scan = mtf_series.as_ref().map(|s| self.scan_timeframe(&mut state, s));
        let ltf_scan = ltf_series.as_ref().map(|s| self.scan_timeframe(&mut state, s));

        // 기준 시각: 관측된 마지막 캔들. 데이터가 전혀 없으면 빈 결과
        let as_of = [&htf_scan, &mtf_scan, &ltf_scan]
            .into_iter()
            .flatten()
            .filter_map(|s| s.last_candle)
            .max();
        let Some(as_of) = as_of else {
            debug!("캔들 데이터 없음 - 빈 결과 반환");
            return Ok(Vec::new());
        };

        let merged = self.coordinator.merge(
            symbol,
            htf_scan.as_ref(),
            mtf_scan.as_ref(),
            ltf_scan.as_ref(),
        );

        // 기대했으나 데이터가 없는 단계를 명시적으로 표시
        let missing: Vec<Timeframe> = [
            (htf_tf, htf_scan.is_some()),
            (mtf_tf, mtf_scan.is_some()),
            (ltf_tf, ltf_scan.is_some()),
        ]
        .into_iter()
        .filter_map(|(tf, present)| tf.filter(|_| !present))
        .collect();

        // 메모리 보정
        let degraded = self.store.is_degraded();
        let mut signals = Vec::with_capacity(merged.signals.len());
        for mut signal in merged.signals {
            for tf in &missing {
                signal.push_warning(format!("{} data unavailable", tf));
            }

            if degraded {
                // 메모리 보강 생략 - 원시 신뢰도 그대로 통과
                signal.memory_degraded = true;
            } else {
                let rate = self
                    .historical
                    .success_rate(signal.kind, signal.timeframe, as_of)
                    .await;
                let failures: Vec<OutcomeRecord> = self
                    .store
                    .query_outcomes(signal.kind, signal.timeframe, as_of)
                    .await
                    .filter(|r| r.outcome == PatternOutcome::Failure && r.symbol == *symbol)
                    .collect();
                signal = self.scorer.enhance(signal, rate, &failures);
            }
            signals.push(signal);
        }

        // 컨텍스트 갱신 (이 코디네이터 패스만이 컨텍스트를 변경)
        let limit = self.config.memory.context_history_limit;
        if htf_scan.is_some() {
            state.context.set_bias(merged.bias, as_of);
        } else {
            state.context.last_updated = as_of;
        }
        for scan in [&htf_scan, &mtf_scan, &ltf_scan].into_iter().flatten() {
            for event in &scan.events {
                let seen = state.context.recent_events.iter().any(|e| {
                    e.kind == event.kind
                        && e.timeframe == event.timeframe
                        && e.broken_at == event.broken_at
                });
                if !seen {
                    state.context.push_event(event.clone(), limit);
                }
            }
        }
        for signal in &signals {
            // 같은 감지의 갱신본(완화 진행 등)은 이전 항목을 대체
            state.context.recent_signals.retain(|s| s.id != signal.id);
            state.context.push_signal(signal.clone(), limit);
        }

        if let Err(e) = self.store.save_context(&state.context).await {
            warn!(symbol = %symbol, error = %e, "컨텍스트 저장 실패");
        }

        self.cache.insert(cache_key, signals.clone()).await;

        Ok(signals)
    }

    /// 심볼 컨텍스트의 읽기 전용 스냅샷을 반환합니다.
    pub async fn get_market_context(&self, symbol: &Symbol) -> MarketContext {
        let state_arc = self.symbol_state(symbol).await;
        let state = state_arc.lock().await;
        state.context.clone()
    }

    /// 패턴 결과를 메모리에 기록합니다.
    ///
    /// 다운스트림 소비자가 신호의 실제 결과를 보고하는 경로이며,
    /// 이후의 감지 신뢰도 보정에 반영됩니다.
    pub async fn record_outcome(&self, record: OutcomeRecord) -> EngineResult<()> {
        self.store.append_outcome(&record).await.map_err(Into::into)
    }

    /// 요청 타임프레임의 권위 사다리 역할을 결정합니다.
    ///
    /// 요청이 설정된 상위 역할과 같거나 높으면 사다리는 그 지점까지로
    /// 퇴화합니다 (생략된 단계는 명시적으로 표시됨).
    fn ladder_for(
        &self,
        requested: Timeframe,
    ) -> (Option<Timeframe>, Option<Timeframe>, Option<Timeframe>) {
        let c = &self.config.coordinator;
        if requested >= c.higher {
            (Some(requested), None, None)
        } else if requested >= c.middle {
            (Some(c.higher), Some(requested), None)
        } else {
            (Some(c.higher), Some(c.middle), Some(requested))
        }
    }

    /// 단일 타임프레임 감지 패스.
    fn scan_timeframe(&self, state: &mut SymbolState, series: &CandleSeries) -> TimeframeScan {
        let swings = self.swing.find_swing_points(series);
        let scan = self.structure.scan(series, &swings);

        let zones = state
            .zones
            .entry(series.timeframe)
            .or_insert_with(|| ZoneTrackers::new(&self.config.patterns));
        zones.order_blocks.update(series, &scan.events);
        zones.fvgs.update(series);

        TimeframeScan {
            timeframe: series.timeframe,
            bias: scan.state.as_market_bias(),
            events: scan.events,
            blocks: zones.order_blocks.blocks().cloned().collect(),
            gaps: zones.fvgs.gaps().cloned().collect(),
            last_candle: series.last().map(|c| c.timestamp),
        }
    }

    /// 심볼 상태를 가져오거나 생성합니다.
    ///
    /// 최초 관측 시 메모리 저장소에서 컨텍스트를 로드합니다.
    async fn symbol_state(&self, symbol: &Symbol) -> Arc<Mutex<SymbolState>> {
        {
            let map = self.symbols.read().await;
            if let Some(state) = map.get(&symbol.pair()) {
                return state.clone();
            }
        }

        let context = self.store.load_context(symbol).await;
        let mut map = self.symbols.write().await;
        map.entry(symbol.pair())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SymbolState {
                    context,
                    zones: HashMap::new(),
                }))
            })
            .clone()
    }
}
