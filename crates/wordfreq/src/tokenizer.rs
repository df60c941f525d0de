use std::ops::AddAssign;

use tracing::warn;
use wordfreq_types::{CanonicalWord, MAX_TOKEN_LEN, is_word_byte};

use crate::table::FrequencyTable;

/// What one tokenizer pass saw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    /// Candidates handed to the normalizer.
    pub tokens: u64,
    /// Candidates accepted and counted.
    pub counted: u64,
    /// Candidates the normalizer rejected.
    pub rejected: u64,
    /// Alphabetic runs discarded for exceeding [`MAX_TOKEN_LEN`].
    pub overflowed: u64,
}

impl AddAssign for ChunkStats {
    fn add_assign(&mut self, other: Self) {
        self.tokens += other.tokens;
        self.counted += other.counted;
        self.rejected += other.rejected;
        self.overflowed += other.overflowed;
    }
}

struct Candidate {
    buf: [u8; MAX_TOKEN_LEN],
    run: usize,
    start: usize,
}

impl Candidate {
    fn new() -> Self {
        Self {
            buf: [0; MAX_TOKEN_LEN],
            run: 0,
            start: 0,
        }
    }

    fn push(&mut self, byte: u8, pos: usize) {
        if self.run == 0 {
            self.start = pos;
        }
        if let Some(slot) = self.buf.get_mut(self.run) {
            *slot = byte;
        }
        self.run += 1;
    }

    fn finish(&mut self, table: &FrequencyTable, stats: &mut ChunkStats) {
        let run = std::mem::take(&mut self.run);
        if run == 0 {
            return;
        }
        if run > MAX_TOKEN_LEN {
            stats.overflowed += 1;
            warn!(
                "discarding {run}-byte alphabetic run at offset {} (limit {MAX_TOKEN_LEN})",
                self.start
            );
            return;
        }
        stats.tokens += 1;
        match CanonicalWord::normalize(&self.buf[..run]) {
            Some(word) => {
                table.record_at(word, self.start as u64);
                stats.counted += 1;
            }
            None => stats.rejected += 1,
        }
    }
}

/// Count every word in `chunk` into `table`.
///
/// `offset` is the chunk's position inside its source; each word is recorded
/// at its absolute byte position so discovery order follows the text. Runs of alphabetic bytes form candidates; any other byte, or
/// the end of the chunk, ends the current one. A run longer than
/// [`MAX_TOKEN_LEN`] is dropped as a whole and scanning resumes at the next
/// non-alphabetic byte.
pub fn tokenize(chunk: &[u8], offset: usize, table: &FrequencyTable) -> ChunkStats {
    let mut stats = ChunkStats::default();
    let mut candidate = Candidate::new();
    for (idx, &byte) in chunk.iter().enumerate() {
        if is_word_byte(byte) {
            candidate.push(byte, offset + idx);
        } else {
            candidate.finish(table, &mut stats);
        }
    }
    candidate.finish(table, &mut stats);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_alphabetic_runs() {
        let table = FrequencyTable::new();
        let stats = tokenize(b"The cat, the HAT; the end.", 0, &table);
        assert_eq!(table.get("the"), Some(3));
        assert_eq!(table.get("cat"), Some(1));
        assert_eq!(table.get("hat"), Some(1));
        assert_eq!(table.get("end"), Some(1));
        assert_eq!(stats.tokens, 6);
        assert_eq!(stats.counted, 6);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn punctuation_and_digits_terminate_candidates() {
        let table = FrequencyTable::new();
        let stats = tokenize(b"don't re-enter abc123def", 0, &table);
        // "don", "t", "re", "enter", "abc", "def"
        assert_eq!(table.get("don"), Some(1));
        assert_eq!(table.get("enter"), Some(1));
        assert_eq!(table.get("abc"), Some(1));
        assert_eq!(table.get("def"), Some(1));
        assert_eq!(table.get("dont"), None);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn word_at_end_of_chunk_is_counted() {
        let table = FrequencyTable::new();
        tokenize(b"bird", 0, &table);
        assert_eq!(table.get("bird"), Some(1));
    }

    #[test]
    fn overlong_run_is_discarded_and_scanning_resumes() {
        let mut input = vec![b'x'; MAX_TOKEN_LEN + 5];
        input.extend_from_slice(b" fox ");
        input.extend(std::iter::repeat_n(b'y', MAX_TOKEN_LEN));
        let table = FrequencyTable::new();
        let stats = tokenize(&input, 0, &table);
        assert_eq!(stats.overflowed, 1);
        assert_eq!(table.get("fox"), Some(1));
        assert_eq!(table.get(&"y".repeat(MAX_TOKEN_LEN)), Some(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn words_are_keyed_on_absolute_position() {
        let table = FrequencyTable::new();
        tokenize(b"apple zebra", 100, &table);
        tokenize(b"zebra mango", 0, &table);
        let order: Vec<String> = table
            .entries()
            .into_iter()
            .map(|(w, _)| w.to_string())
            .collect();
        assert_eq!(order, ["zebra", "mango", "apple"]);
    }

    #[test]
    fn empty_chunk_produces_nothing() {
        let table = FrequencyTable::new();
        let stats = tokenize(b"", 10, &table);
        assert_eq!(stats, ChunkStats::default());
        assert!(table.is_empty());
    }
}
