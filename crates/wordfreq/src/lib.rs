pub mod aggregator;
pub mod error;
pub mod handlers;
pub mod rank;
pub mod scheduler;
pub mod table;
pub mod tokenizer;
pub mod wire;
pub mod worker;

pub use aggregator::{Aggregator, EngineConfig, MemorySource, MergeOrder, Source, SourceResult};
pub use error::EngineError;
pub use handlers::{AppState, router};
pub use rank::{DEFAULT_TOP_K, Ranking, top_k};
pub use scheduler::{ChunkScheduler, DEFAULT_CHUNKS, process_source, split_chunks};
pub use table::FrequencyTable;
pub use tokenizer::{ChunkStats, tokenize};
pub use wordfreq_types::{CanonicalWord, MAX_TOKEN_LEN, MIN_WORD_LEN, RankedEntry};

/// Count `sources` and return the `k` most frequent words.
pub fn top_words<S: Source>(
    sources: &[S],
    config: EngineConfig,
    k: usize,
) -> Result<Vec<RankedEntry>, EngineError> {
    let table = Aggregator::new(config).aggregate(sources)?;
    Ok(top_k(&table, k))
}
