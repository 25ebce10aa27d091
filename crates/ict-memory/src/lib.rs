//! # ICT Memory
//!
//! 패턴 엔진의 영속적 적응형 메모리를 제공합니다:
//! - `MemoryStore` - 심볼별 컨텍스트와 결과 로그의 파일 기반 저장소.
//!   프로세스 재시작을 견디며, 저장소 불능 시 인메모리 전용으로 강등
//! - `HistoricalAnalyzer` - 시간 감쇠 성공률 통계
//! - `DecisionCache` - 상태 해시 기반 TTL 결정 캐시

pub mod decision_cache;
pub mod error;
pub mod historical;
pub mod store;

pub use decision_cache::{CacheKey, DecisionCache};
pub use error::MemoryError;
pub use historical::HistoricalAnalyzer;
pub use store::{MemoryStore, OutcomeIter};
