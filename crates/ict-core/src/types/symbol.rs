//! 심볼 및 시장 유형 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 시장 유형 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// 외환 시장
    Forex,
    /// 암호화폐 시장
    Crypto,
    /// 주식 시장
    Stock,
    /// 선물/파생상품 시장
    Futures,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Forex => write!(f, "forex"),
            MarketType::Crypto => write!(f, "crypto"),
            MarketType::Stock => write!(f, "stock"),
            MarketType::Futures => write!(f, "futures"),
        }
    }
}

/// 분석 대상 상품을 나타내는 심볼.
///
/// 기준 자산, 호가 자산, 시장 유형으로 구성됩니다.
/// 외환의 EUR/USD, 암호화폐의 BTC/USDT 등.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 기준 자산 (예: EUR, BTC)
    pub base: String,
    /// 호가 자산 (예: USD, USDT)
    pub quote: String,
    /// 시장 유형
    pub market_type: MarketType,
}

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>, market_type: MarketType) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
            market_type,
        }
    }

    /// 외환 심볼을 생성합니다.
    pub fn forex(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self::new(base, quote, MarketType::Forex)
    }

    /// 암호화폐 심볼을 생성합니다.
    pub fn crypto(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self::new(base, quote, MarketType::Crypto)
    }

    /// 주식 심볼을 생성합니다.
    pub fn stock(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self::new(base, quote, MarketType::Stock)
    }

    /// "EUR/USD" 또는 "EURUSD" 형식 문자열에서 외환 심볼을 파싱합니다.
    ///
    /// 구분자 없는 형식은 6글자 통화쌍만 허용합니다.
    pub fn parse_forex(s: &str) -> Option<Self> {
        if let Some((base, quote)) = s.split_once('/') {
            if base.is_empty() || quote.is_empty() {
                return None;
            }
            return Some(Self::forex(base, quote));
        }
        if s.len() == 6 && s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(Self::forex(&s[..3], &s[3..]));
        }
        None
    }

    /// 구분자 없는 쌍 문자열을 반환합니다 (예: "EURUSD").
    ///
    /// 파일 이름 등 경로 안전한 식별자가 필요한 곳에서 사용합니다.
    pub fn pair(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
