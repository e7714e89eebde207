pub mod block;
pub mod dedup;
pub mod extract;
pub mod pagination;
pub mod patterns;

pub use block::BlockDetector;
pub use dedup::{normalize_id, partition, Partition};
pub use extract::{ExtractError, Extraction, FieldExtractor};
pub use pagination::PageCountResolver;
pub use patterns::{extract_id, PatternMatcher};
