//! # ICT Engine
//!
//! 멀티 타임프레임 시장 구조 패턴 엔진의 공개 표면입니다.
//!
//! 캔들 시리즈를 타임프레임 권위 사다리(상위 → 중간 → 하위)로
//! 분석하여 구조 이벤트(BOS/CHoCH)와 가격 존(오더 블록/FVG)을
//! 감지하고, 과거 성과 메모리로 신뢰도를 보정한 패턴 신호를
//! 생성합니다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use ict_core::{EngineConfig, Symbol, Timeframe};
//! use ict_engine::PatternEngine;
//!
//! let engine = PatternEngine::new(EngineConfig::default())?;
//! let symbol = Symbol::forex("EUR", "USD");
//!
//! engine.update_candles(&symbol, Timeframe::H4, h4_candles).await?;
//! engine.update_candles(&symbol, Timeframe::H1, h1_candles).await?;
//! engine.update_candles(&symbol, Timeframe::M15, m15_candles).await?;
//!
//! let signals = engine.analyze(&symbol, Timeframe::M15).await?;
//! let context = engine.get_market_context(&symbol).await;
//! ```

pub mod coordinator;
pub mod engine;
pub mod killzone;
pub mod scorer;

pub use coordinator::{Coordinator, MergeOutcome, TimeframeScan};
pub use engine::PatternEngine;
pub use killzone::active_killzone;
pub use scorer::ConfidenceScorer;
