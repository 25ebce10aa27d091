//! 파일 기반 메모리 저장소.
//!
//! 심볼별 `MarketContext`와 패턴 결과 로그를 프로세스 재시작 간에
//! 유지합니다.
//!
//! # 디스크 레이아웃
//!
//! ```text
//! <data_dir>/
//!   contexts/<PAIR>.json          - 심볼별 컨텍스트 (원자적 교체)
//!   outcomes/<kind>_<tf>.jsonl    - 결과 로그 (append-only, 줄 단위 JSON)
//! ```
//!
//! # 내구성 규율
//!
//! 컨텍스트 저장은 임시 파일에 쓴 뒤 rename으로 교체합니다. rename은
//! 원자적이므로 읽는 쪽은 항상 교체 전이나 후의 완전한 레코드만
//! 관측합니다 (찢어진 레코드 없음). 결과 로그는 append 전용입니다.
//!
//! # 강등 모드
//!
//! 저장소를 사용할 수 없으면 (디스크/권한 오류) 프로세스 수명 동안
//! 인메모리 전용으로 강등되며, 경고 로그를 남길 뿐 감지 파이프라인을
//! 중단시키지 않습니다.

use crate::error::Result;
use chrono::{DateTime, Utc};
use ict_core::config::MemoryConfig;
use ict_core::domain::{MarketContext, OutcomeRecord, PatternKind};
use ict_core::types::{Symbol, Timeframe};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// 파일 기반 메모리 저장소.
///
/// 여러 심볼 분석기의 동시 읽기를 허용하고, 쓰기는 직렬화합니다.
pub struct MemoryStore {
    data_dir: PathBuf,
    degraded: AtomicBool,
    /// 강등 모드 컨텍스트 저장소
    mem_contexts: RwLock<HashMap<String, MarketContext>>,
    /// 강등 모드 결과 저장소
    mem_outcomes: RwLock<Vec<OutcomeRecord>>,
    /// 디스크 쓰기 직렬화
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// 저장소를 엽니다.
    ///
    /// 디렉토리 생성에 실패하면 인메모리 전용 모드로 강등하고 경고를
    /// 남깁니다. 이 함수는 실패하지 않습니다.
    pub fn open(config: &MemoryConfig) -> Self {
        let data_dir = PathBuf::from(&config.data_dir);
        let contexts = data_dir.join("contexts");
        let outcomes = data_dir.join("outcomes");

        let degraded = match fs::create_dir_all(&contexts).and_then(|_| fs::create_dir_all(&outcomes)) {
            Ok(()) => false,
            Err(e) => {
                warn!(
                    data_dir = %data_dir.display(),
                    error = %e,
                    "메모리 저장소 사용 불가, 인메모리 전용으로 강등"
                );
                true
            }
        };

        Self {
            data_dir,
            degraded: AtomicBool::new(degraded),
            mem_contexts: RwLock::new(HashMap::new()),
            mem_outcomes: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// 인메모리 전용으로 강등된 상태인지 확인합니다.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// 런타임 저장 실패 시 강등 모드로 전환합니다.
    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(reason = reason, "메모리 저장소 강등: 이후 인메모리 전용으로 동작");
        }
    }

    fn context_path(&self, symbol: &Symbol) -> PathBuf {
        self.data_dir.join("contexts").join(format!("{}.json", symbol.pair()))
    }

    fn outcome_path(&self, kind: PatternKind, timeframe: Timeframe) -> PathBuf {
        self.data_dir
            .join("outcomes")
            .join(format!("{}_{}.jsonl", kind.as_str(), timeframe))
    }

    /// 심볼의 컨텍스트를 로드합니다.
    ///
    /// 저장된 데이터가 없으면 기본 초기화된 컨텍스트를 반환하며,
    /// 이 동작은 실패하지 않습니다. 손상된 파일은 경고 후 기본값으로
    /// 대체합니다.
    pub async fn load_context(&self, symbol: &Symbol) -> MarketContext {
        if let Some(ctx) = self.mem_contexts.read().await.get(&symbol.pair()) {
            return ctx.clone();
        }
        if self.is_degraded() {
            return MarketContext::new(symbol.clone());
        }

        let path = self.context_path(symbol);
        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<MarketContext>(&raw) {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "컨텍스트 파일 손상, 기본값으로 대체"
                    );
                    MarketContext::new(symbol.clone())
                }
            },
            Err(_) => MarketContext::new(symbol.clone()),
        }
    }

    /// 심볼의 컨텍스트를 저장합니다 (원자적 교체).
    ///
    /// 강등 모드이거나 디스크 쓰기가 실패하면 인메모리에 보관하고
    /// 성공으로 처리합니다. 부분 쓰기로 기존 데이터를 훼손하지 않습니다.
    pub async fn save_context(&self, context: &MarketContext) -> Result<()> {
        if self.is_degraded() {
            self.mem_contexts
                .write()
                .await
                .insert(context.symbol.pair(), context.clone());
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let path = self.context_path(&context.symbol);
        let tmp = path.with_extension("json.tmp");

        let result = (|| -> Result<()> {
            let json = serde_json::to_string_pretty(context)?;
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                debug!(symbol = %context.symbol, path = %path.display(), "컨텍스트 저장 완료");
                Ok(())
            }
            Err(e) => {
                self.degrade(&e.to_string());
                self.mem_contexts
                    .write()
                    .await
                    .insert(context.symbol.pair(), context.clone());
                Ok(())
            }
        }
    }

    /// 패턴 결과 기록을 로그에 추가합니다 (append-only).
    pub async fn append_outcome(&self, record: &OutcomeRecord) -> Result<()> {
        if self.is_degraded() {
            self.mem_outcomes.write().await.push(record.clone());
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let path = self.outcome_path(record.kind, record.timeframe);

        let result = (|| -> Result<()> {
            let line = serde_json::to_string(record)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{}", line)?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade(&e.to_string());
                self.mem_outcomes.write().await.push(record.clone());
                Ok(())
            }
        }
    }

    /// 결과 기록을 조회합니다.
    ///
    /// `as_of` 이전에 기록된 레코드만 포함하는 유한하고 재시작 가능한
    /// 지연 시퀀스를 반환합니다. 변경되지 않은 저장소에 같은 조회를
    /// 다시 실행하면 동일한 결과를 냅니다. 손상된 줄은 경고 후
    /// 건너뜁니다.
    pub async fn query_outcomes(
        &self,
        kind: PatternKind,
        timeframe: Timeframe,
        as_of: DateTime<Utc>,
    ) -> OutcomeIter {
        if self.is_degraded() {
            let records: Vec<OutcomeRecord> = self
                .mem_outcomes
                .read()
                .await
                .iter()
                .filter(|r| r.kind == kind && r.timeframe == timeframe && r.recorded_at <= as_of)
                .cloned()
                .collect();
            return OutcomeIter::Memory(records.into_iter());
        }

        let path = self.outcome_path(kind, timeframe);
        match File::open(&path) {
            Ok(file) => OutcomeIter::File {
                lines: BufReader::new(file).lines(),
                as_of,
            },
            Err(_) => OutcomeIter::Memory(Vec::new().into_iter()),
        }
    }
}

/// 결과 기록의 지연 반복자.
pub enum OutcomeIter {
    /// 파일에서 줄 단위로 읽는 지연 경로
    File {
        lines: std::io::Lines<BufReader<File>>,
        as_of: DateTime<Utc>,
    },
    /// 강등 모드/빈 결과 경로
    Memory(std::vec::IntoIter<OutcomeRecord>),
}

impl Iterator for OutcomeIter {
    type Item = OutcomeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            OutcomeIter::Memory(iter) => iter.next(),
            OutcomeIter::File { lines, as_of } => {
                for line in lines.by_ref() {
                    let line = match line {
                        Ok(l) => l,
                        Err(e) => {
                            warn!(error = %e, "결과 로그 읽기 실패, 조회 중단");
                            return None;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<OutcomeRecord>(&line) {
                        Ok(record) if record.recorded_at <= *as_of => return Some(record),
                        Ok(_) => continue,
                        Err(e) => {
                            warn!(error = %e, "손상된 결과 레코드 건너뜀");
                            continue;
                        }
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ict_core::domain::{Direction, MarketBias, PatternOutcome};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn store_in(dir: &std::path::Path) -> MemoryStore {
        let config = MemoryConfig {
            data_dir: dir.to_string_lossy().to_string(),
            ..MemoryConfig::default()
        };
        MemoryStore::open(&config)
    }

    fn sample_record(hours_ago: i64, outcome: PatternOutcome) -> OutcomeRecord {
        OutcomeRecord {
            signal_id: Uuid::nil(),
            kind: PatternKind::Bos,
            timeframe: Timeframe::H1,
            symbol: Symbol::forex("EUR", "USD"),
            direction: Direction::Bullish,
            zone_high: dec!(1.1050),
            zone_low: dec!(1.1020),
            outcome,
            recorded_at: Utc::now() - chrono::Duration::hours(hours_ago),
        }
    }

    #[tokio::test]
    async fn test_load_missing_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let ctx = store.load_context(&Symbol::forex("EUR", "USD")).await;
        assert_eq!(ctx.bias, MarketBias::Neutral);
        assert!(ctx.recent_events.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let symbol = Symbol::forex("EUR", "USD");

        let mut ctx = MarketContext::new(symbol.clone());
        ctx.set_bias(MarketBias::Bullish, Utc::now());
        store.save_context(&ctx).await.unwrap();

        // 재시작 시뮬레이션: 같은 디렉토리로 새 저장소
        let store2 = store_in(dir.path());
        let loaded = store2.load_context(&symbol).await;
        assert_eq!(loaded.bias, MarketBias::Bullish);
    }

    #[tokio::test]
    async fn test_corrupt_context_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let symbol = Symbol::forex("EUR", "USD");

        fs::write(
            dir.path().join("contexts").join("EURUSD.json"),
            "{ not valid json",
        )
        .unwrap();

        let ctx = store.load_context(&symbol).await;
        assert_eq!(ctx.bias, MarketBias::Neutral);
    }

    #[tokio::test]
    async fn test_append_and_query_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        for i in 0..5 {
            store
                .append_outcome(&sample_record(i, PatternOutcome::Success))
                .await
                .unwrap();
        }

        let as_of = Utc::now();
        let first: Vec<_> = store
            .query_outcomes(PatternKind::Bos, Timeframe::H1, as_of)
            .await
            .collect();
        let second: Vec<_> = store
            .query_outcomes(PatternKind::Bos, Timeframe::H1, as_of)
            .await
            .collect();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second, "같은 조회는 동일한 결과를 내야 함");
    }

    #[tokio::test]
    async fn test_query_filters_by_as_of() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store
            .append_outcome(&sample_record(48, PatternOutcome::Success))
            .await
            .unwrap();
        store
            .append_outcome(&sample_record(0, PatternOutcome::Failure))
            .await
            .unwrap();

        let as_of = Utc::now() - chrono::Duration::hours(24);
        let records: Vec<_> = store
            .query_outcomes(PatternKind::Bos, Timeframe::H1, as_of)
            .await
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, PatternOutcome::Success);
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store
            .append_outcome(&sample_record(1, PatternOutcome::Success))
            .await
            .unwrap();

        // 손상된 줄 주입
        let path = dir.path().join("outcomes").join("bos_1h.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "garbage line").unwrap();

        store
            .append_outcome(&sample_record(0, PatternOutcome::Failure))
            .await
            .unwrap();

        let records: Vec<_> = store
            .query_outcomes(PatternKind::Bos, Timeframe::H1, Utc::now())
            .await
            .collect();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_degraded_mode_still_works() {
        // 생성 불가능한 경로 → 강등 모드
        let config = MemoryConfig {
            data_dir: "/dev/null/impossible".to_string(),
            ..MemoryConfig::default()
        };
        let store = MemoryStore::open(&config);
        assert!(store.is_degraded());

        let symbol = Symbol::forex("EUR", "USD");
        let mut ctx = MarketContext::new(symbol.clone());
        ctx.set_bias(MarketBias::Bearish, Utc::now());
        store.save_context(&ctx).await.unwrap();

        let loaded = store.load_context(&symbol).await;
        assert_eq!(loaded.bias, MarketBias::Bearish);

        store
            .append_outcome(&sample_record(0, PatternOutcome::Success))
            .await
            .unwrap();
        let records: Vec<_> = store
            .query_outcomes(PatternKind::Bos, Timeframe::H1, Utc::now())
            .await
            .collect();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let symbol = Symbol::forex("GBP", "JPY");

        let ctx = MarketContext::new(symbol.clone());
        store.save_context(&ctx).await.unwrap();

        let contexts_dir = dir.path().join("contexts");
        let names: Vec<String> = fs::read_dir(&contexts_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["GBPJPY.json".to_string()]);
    }
}
