use std::ops::Range;
use std::thread;

use tracing::debug;
use wordfreq_types::is_word_byte;

use crate::error::{EngineError, panic_message};
use crate::table::FrequencyTable;
use crate::tokenizer::{ChunkStats, tokenize};

/// Chunk count used when a caller does not pick one.
pub const DEFAULT_CHUNKS: usize = 4;

/// Splits one source into chunks and tokenizes them in parallel.
#[derive(Debug, Clone, Copy)]
pub struct ChunkScheduler {
    chunks: usize,
}

impl Default for ChunkScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNKS)
    }
}

impl ChunkScheduler {
    /// A degree of zero is treated as one.
    pub fn new(chunks: usize) -> Self {
        Self {
            chunks: chunks.max(1),
        }
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn split(&self, buffer: &[u8]) -> Vec<Range<usize>> {
        split_chunks(buffer, self.chunks)
    }

    /// Tokenize every chunk of `buffer` on its own thread, all writing into
    /// one table owned by this call.
    ///
    /// Returns only after every chunk thread has been joined. If any chunk
    /// panicked the table is discarded and the first failure is returned.
    pub fn run(&self, id: &str, buffer: &[u8]) -> Result<(FrequencyTable, ChunkStats), EngineError> {
        self.run_with(id, buffer, tokenize)
    }

    /// [`run`](Self::run) with `count` in place of the tokenizer.
    pub(crate) fn run_with<F>(
        &self,
        id: &str,
        buffer: &[u8],
        count: F,
    ) -> Result<(FrequencyTable, ChunkStats), EngineError>
    where
        F: Fn(&[u8], usize, &FrequencyTable) -> ChunkStats + Sync,
    {
        let ranges = self.split(buffer);
        let table = FrequencyTable::new();

        let stats = thread::scope(|scope| {
            let mut failure = None;
            let mut handles = Vec::with_capacity(ranges.len());
            for (chunk, range) in ranges.iter().enumerate() {
                let bytes = &buffer[range.clone()];
                let offset = range.start;
                let table = &table;
                let count = &count;
                let spawned = thread::Builder::new()
                    .name(format!("wordfreq-chunk-{chunk}"))
                    .spawn_scoped(scope, move || count(bytes, offset, table));
                match spawned {
                    Ok(handle) => handles.push((chunk, range, handle)),
                    Err(source) => {
                        failure = Some(EngineError::Spawn {
                            what: format!("tokenizer for chunk {chunk} of {id}"),
                            source,
                        });
                        break;
                    }
                }
            }

            let mut stats = ChunkStats::default();
            for (chunk, range, handle) in handles {
                match handle.join() {
                    Ok(chunk_stats) => {
                        debug!(
                            "{id} chunk {chunk} [{}..{}): {} counted, {} rejected, {} overflowed",
                            range.start,
                            range.end,
                            chunk_stats.counted,
                            chunk_stats.rejected,
                            chunk_stats.overflowed
                        );
                        stats += chunk_stats;
                    }
                    Err(payload) => {
                        failure.get_or_insert_with(|| EngineError::ChunkPanicked {
                            id: id.to_string(),
                            chunk,
                            message: panic_message(&*payload),
                        });
                    }
                }
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(stats),
            }
        })?;

        Ok((table, stats))
    }
}

/// Count one source buffer with `chunks` concurrent tokenizers.
pub fn process_source(buffer: &[u8], chunks: usize) -> Result<FrequencyTable, EngineError> {
    ChunkScheduler::new(chunks)
        .run("buffer", buffer)
        .map(|(table, _)| table)
}

/// Divide `buffer` into up to `n` contiguous ranges that never split a word.
///
/// Internal boundaries start at even multiples of `len / n` and move forward
/// until they sit on a non-alphabetic byte or the end of the buffer. Ranges
/// that end up empty are dropped, the last range always ends at `len`, and a
/// buffer shorter than `n` becomes a single range.
pub fn split_chunks(buffer: &[u8], n: usize) -> Vec<Range<usize>> {
    let len = buffer.len();
    let n = n.max(1);
    if n == 1 || len < n {
        return vec![0..len];
    }

    let step = len / n;
    let mut ranges = Vec::with_capacity(n);
    let mut start = 0;
    for i in 1..n {
        let mut end = (i * step).max(start);
        while end < len && is_word_byte(buffer[end]) {
            end += 1;
        }
        ranges.push(start..end);
        start = end;
    }
    ranges.push(start..len);
    ranges.retain(|r| !r.is_empty());
    if ranges.is_empty() {
        ranges.push(0..len);
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(buffer: &[u8], ranges: &[Range<usize>]) {
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(buffer.len()));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn splits_on_even_boundaries_when_possible() {
        let buffer = b"hello world";
        let ranges = split_chunks(buffer, 2);
        assert_eq!(ranges, vec![0..5, 5..11]);
    }

    #[test]
    fn moves_boundary_past_straddling_word() {
        let buffer = b"abcdefgh ij";
        let ranges = split_chunks(buffer, 2);
        assert_eq!(ranges, vec![0..8, 8..11]);
        assert_covers(buffer, &ranges);
    }

    #[test]
    fn straddling_word_is_counted_once() {
        let buffer = b"one elephant two";
        let ranges = split_chunks(buffer, 3);
        assert_covers(buffer, &ranges);
        let holders = ranges
            .iter()
            .filter(|r| buffer[r.start..r.end].windows(8).any(|w| w == b"elephant"))
            .count();
        assert_eq!(holders, 1);

        let (table, stats) = ChunkScheduler::new(3).run("test", buffer).unwrap();
        assert_eq!(table.get("elephant"), Some(1));
        assert_eq!(table.get("one"), Some(1));
        assert_eq!(table.get("two"), Some(1));
        assert_eq!(stats.counted, 3);
    }

    #[test]
    fn short_or_empty_buffers_use_one_chunk() {
        assert_eq!(split_chunks(b"", 4), vec![0..0]);
        assert_eq!(split_chunks(b"cat", 4), vec![0..3]);
        assert_eq!(split_chunks(b"cat dog", 0), vec![0..7]);
    }

    #[test]
    fn single_long_word_collapses_to_one_chunk() {
        let buffer = b"antidisestablishment";
        assert_eq!(split_chunks(buffer, 4), vec![0..buffer.len()]);
    }

    #[test]
    fn counts_match_regardless_of_chunk_count() {
        let text = b"the quick brown fox jumps over the lazy dog; the dog sleeps.";
        let baseline = process_source(text, 1).unwrap();
        for n in 2..=12 {
            let table = process_source(text, n).unwrap();
            assert_eq!(table.entries().len(), baseline.len(), "chunks = {n}");
            for (word, count) in baseline.entries() {
                assert_eq!(table.get(word.as_str()), Some(count), "chunks = {n}");
            }
        }
    }

    #[test]
    fn panicking_chunk_fails_the_source() {
        let buffer = b"alpha beta gamma delta epsilon zeta";
        let result = ChunkScheduler::new(3).run_with("doomed", buffer, |bytes, offset, table| {
            if offset > 0 {
                panic!("tokenizer tripped at {offset}");
            }
            tokenize(bytes, offset, table)
        });
        let err = result.unwrap_err();
        assert!(err.is_concurrency_failure());
        match err {
            EngineError::ChunkPanicked { id, chunk, message } => {
                assert_eq!(id, "doomed");
                assert!(chunk > 0);
                assert!(message.contains("tokenizer tripped"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_buffer_yields_empty_table() {
        let table = process_source(b"", 4).unwrap();
        assert!(table.is_empty());
    }
}
