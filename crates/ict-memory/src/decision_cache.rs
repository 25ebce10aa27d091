//! 결정 캐시.
//!
//! (심볼, 타임프레임, 상태 해시)로 키가 부여된 내용 주소화 캐시입니다.
//! 상태 해시는 최근 N개 종가의 구조적 해시로, "의미 있는 변화 없음"을
//! 감지하여 불필요한 재계산과 중복 로깅을 피합니다.
//!
//! 항목은 TTL이 지나면 만료되고, 삽입 시점에 명시적으로 축출됩니다
//! (암묵적 무한 증가 없음). 키가 패스별로 자연 분할되므로 여러 동시
//! 패스가 읽고 써도 경합이 제한됩니다.

use chrono::{DateTime, Duration, Utc};
use ict_core::config::CacheConfig;
use ict_core::domain::PatternSignal;
use ict_core::types::{Symbol, Timeframe};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 캐시 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// 심볼 쌍 문자열 (예: "EURUSD")
    pub symbol: String,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 구조적 상태 해시
    pub state_hash: String,
}

/// 캐시 항목.
#[derive(Debug, Clone)]
struct CacheEntry {
    signals: Vec<PatternSignal>,
    cached_at: DateTime<Utc>,
}

/// 결정 캐시.
pub struct DecisionCache {
    ttl: Duration,
    state_hash_candles: usize,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl DecisionCache {
    /// 설정으로 캐시를 생성합니다.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::seconds(config.ttl_secs as i64),
            state_hash_candles: config.state_hash_candles,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 상태 해시에 포함할 최근 종가 개수를 반환합니다.
    pub fn state_hash_candles(&self) -> usize {
        self.state_hash_candles
    }

    /// (심볼, 타임프레임, 최근 종가)의 구조적 해시를 계산합니다.
    pub fn state_hash(symbol: &Symbol, timeframe: Timeframe, closes: &[Decimal]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(symbol.pair().as_bytes());
        hasher.update(b"|");
        hasher.update(timeframe.interval_str().as_bytes());
        for close in closes {
            hasher.update(b"|");
            hasher.update(close.to_string().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// 만료되지 않은 캐시 항목을 조회합니다.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<PatternSignal>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if Utc::now() - entry.cached_at > self.ttl {
            return None;
        }
        debug!(
            symbol = %key.symbol,
            timeframe = %key.timeframe,
            "결정 캐시 적중 - 재계산 생략"
        );
        Some(entry.signals.clone())
    }

    /// 결과를 캐시에 저장하고 만료된 항목을 축출합니다.
    pub async fn insert(&self, key: CacheKey, signals: Vec<PatternSignal>) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| now - entry.cached_at <= self.ttl);
        entries.insert(
            key,
            CacheEntry {
                signals,
                cached_at: now,
            },
        );
    }

    /// 현재 항목 수를 반환합니다 (만료 포함).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 캐시가 비었는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
