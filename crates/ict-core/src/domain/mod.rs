//! 도메인 모델.

pub mod candle;
pub mod context;
pub mod feed;
pub mod outcome;
pub mod signal;
pub mod structure;
pub mod zone;

pub use candle::{Candle, CandleSeries};
pub use feed::CandleFeed;
pub use context::{MarketBias, MarketContext};
pub use outcome::{HistoricalStat, OutcomeRecord, PatternOutcome};
pub use signal::{Killzone, PatternDetails, PatternKind, PatternSignal};
pub use structure::{Direction, StructureEvent, StructureKind, SwingKind, SwingPoint};
pub use zone::{FairValueGap, MitigationState, OrderBlock};
