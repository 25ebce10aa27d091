//! 시장 데이터 협력자 인터페이스.
//!
//! 캔들 다운로더/브로커 터미널은 이 trait 뒤에서 구현됩니다. 엔진은
//! (심볼, 타임프레임)별 append-only 스트림과 과거 캔들 백필만 요구하며,
//! 데이터 획득 방법 자체는 코어의 관심사가 아닙니다.

use crate::error::EngineResult;
use crate::types::{Symbol, Timeframe};
use super::candle::Candle;
use async_trait::async_trait;

/// 캔들 데이터 공급자.
#[async_trait]
pub trait CandleFeed: Send + Sync {
    /// 최근 `limit`개의 과거 캔들을 요청합니다.
    ///
    /// 반환되는 캔들은 타임스탬프 오름차순이어야 합니다.
    async fn backfill(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> EngineResult<Vec<Candle>>;
}
