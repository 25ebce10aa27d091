//! 캔들 데이터 타입.
//!
//! - `Candle` - 단일 OHLCV 캔들 (불변 값 객체)
//! - `CandleSeries` - 심볼+타임프레임별 append-only 시리즈
//!
//! 시리즈 불변식: 타임스탬프는 엄격하게 증가하며, 한 번 추가된 캔들은
//! 수정되지 않습니다. 갭(비거래 시간)은 허용되지만 재정렬은 거부됩니다.

use crate::error::{EngineError, EngineResult};
use crate::types::{Price, Quantity, Symbol, Timeframe};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Quantity,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 캔들 몸통 크기(절대값)를 반환합니다.
    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 범위 중간 가격을 반환합니다.
    pub fn midpoint(&self) -> Decimal {
        (self.high + self.low) / Decimal::from(2)
    }

    /// 양봉(종가 > 시가)인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// 음봉(종가 < 시가)인지 확인합니다.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// OHLC 일관성을 검증합니다.
    fn validate(&self) -> EngineResult<()> {
        if self.high < self.low {
            return Err(EngineError::Data(format!(
                "고가({}) < 저가({}) at {}",
                self.high, self.low, self.timestamp
            )));
        }
        if self.high < self.open.max(self.close) || self.low > self.open.min(self.close) {
            return Err(EngineError::Data(format!(
                "몸통이 범위를 벗어남 at {}",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// 심볼+타임프레임별 append-only 캔들 시리즈.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    /// 심볼
    pub symbol: Symbol,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 시간순 캔들 (엄격 증가 타임스탬프)
    candles: Vec<Candle>,
    /// 추가가 일어날 때마다 증가하는 리비전.
    /// 스윙 포인트 등 파생 값 객체의 수명이 이 값에 묶입니다.
    revision: u64,
}

impl CandleSeries {
    /// 빈 시리즈를 생성합니다.
    pub fn new(symbol: Symbol, timeframe: Timeframe) -> Self {
        Self {
            symbol,
            timeframe,
            candles: Vec::new(),
            revision: 0,
        }
    }

    /// 캔들 개수를 반환합니다.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// 시리즈가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// 현재 리비전을 반환합니다.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 전체 캔들 슬라이스를 반환합니다.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// 마지막 캔들을 반환합니다.
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// 마지막 N개 캔들 슬라이스를 반환합니다.
    pub fn last_n(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    /// 캔들을 추가합니다.
    ///
    /// 타임스탬프는 마지막 캔들보다 커야 합니다. 마지막 캔들과 완전히
    /// 동일한 캔들은 조용히 무시되어 백필 재전송이 멱등하게 처리됩니다.
    /// 순서가 어긋난 캔들은 `Data` 에러로 거부합니다 (재정렬 금지).
    pub fn append(&mut self, candle: Candle) -> EngineResult<()> {
        candle.validate()?;

        if let Some(last) = self.candles.last() {
            if candle.timestamp == last.timestamp && candle == *last {
                return Ok(());
            }
            if candle.timestamp <= last.timestamp {
                return Err(EngineError::Data(format!(
                    "{} {} 시리즈에 역행 타임스탬프: {} <= {}",
                    self.symbol, self.timeframe, candle.timestamp, last.timestamp
                )));
            }
        }

        self.candles.push(candle);
        self.revision += 1;
        Ok(())
    }

    /// 여러 캔들을 순서대로 추가합니다.
    pub fn extend(&mut self, candles: impl IntoIterator<Item = Candle>) -> EngineResult<usize> {
        let mut appended = 0;
        for candle in candles {
            let before = self.revision;
            self.append(candle)?;
            if self.revision > before {
                appended += 1;
            }
        }
        Ok(appended)
    }

    /// 인덱스 `i-1`과 `i` 사이의 시간 간격을 반환합니다.
    pub fn gap_before(&self, i: usize) -> Option<Duration> {
        if i == 0 || i >= self.candles.len() {
            return None;
        }
        Some(self.candles[i].timestamp - self.candles[i - 1].timestamp)
    }

    /// 인덱스 `i-1`과 `i` 사이 간격이 타임프레임 기간의 `factor`배를
    /// 초과하는지 확인합니다 (세션 경계 감지용).
    pub fn is_gap_before(&self, i: usize, factor: f64) -> bool {
        match self.gap_before(i) {
            Some(gap) => {
                let threshold = (self.timeframe.as_secs() as f64 * factor) as i64;
                gap.num_seconds() > threshold
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle_at(minute: u32, close: Decimal) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, minute, 0).unwrap(),
            close,
            close + dec!(1),
            close - dec!(1),
            close,
            dec!(1000),
        )
    }

    #[test]
    fn test_append_strictly_increasing() {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        series.append(candle_at(0, dec!(100))).unwrap();
        series.append(candle_at(15, dec!(101))).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.revision(), 2);

        // 역행 타임스탬프 거부
        let err = series.append(candle_at(0, dec!(99))).unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_append_exact_duplicate_is_idempotent() {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        let candle = candle_at(0, dec!(100));
        series.append(candle.clone()).unwrap();
        series.append(candle).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.revision(), 1);
    }

    #[test]
    fn test_append_rejects_invalid_ohlc() {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        let bad = Candle::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
            dec!(100),
            dec!(90), // 고가 < 저가
            dec!(95),
            dec!(100),
            dec!(1000),
        );
        assert!(series.append(bad).is_err());
    }

    #[test]
    fn test_gap_detection() {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        series.append(candle_at(0, dec!(100))).unwrap();
        series.append(candle_at(15, dec!(101))).unwrap();
        // 주말 갭: 15분봉 사이에 2시간
        let late = Candle::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 11, 15, 0).unwrap(),
            dec!(101),
            dec!(102),
            dec!(100),
            dec!(101),
            dec!(500),
        );
        series.append(late).unwrap();

        assert!(!series.is_gap_before(1, 3.0));
        assert!(series.is_gap_before(2, 3.0));
    }

    #[test]
    fn test_last_n() {
        let mut series = CandleSeries::new(Symbol::forex("EUR", "USD"), Timeframe::M15);
        for i in 0..4 {
            series
                .append(candle_at(i * 15, dec!(100) + Decimal::from(i)))
                .unwrap();
        }
        assert_eq!(series.last_n(2).len(), 2);
        assert_eq!(series.last_n(10).len(), 4);
        assert_eq!(series.last_n(2)[0].close, dec!(102));
    }
}
