use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use wordfreq_types::CanonicalWord;

#[derive(Debug, Clone, Copy)]
struct Slot {
    first_seen: u64,
    count: u64,
}

/// Word counts shared by every writer in one scope.
///
/// Each upsert runs under the owning shard's write lock, so concurrent
/// increments of the same word are never lost. Every word also carries a
/// discovery key; [`entries`](Self::entries) returns words in that order,
/// which ranking uses to break ties.
///
/// Tokenizers write through [`record_at`](Self::record_at), keying a word on
/// its earliest byte position in the source, so a source table's order is its
/// textual order however the source was chunked. [`add`](Self::add) and
/// [`merge`](Self::merge) key new words on insertion sequence instead. A
/// single table should be fed by one of the two, not both.
#[derive(Debug, Default)]
pub struct FrequencyTable {
    words: DashMap<CanonicalWord, Slot>,
    next_seq: AtomicU64,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, word: CanonicalWord) {
        self.add(word, 1);
    }

    /// Add `count` occurrences of `word`, inserting it if absent.
    pub fn add(&self, word: CanonicalWord, count: u64) {
        if count == 0 {
            return;
        }
        self.words
            .entry(word)
            .and_modify(|slot| slot.count += count)
            .or_insert_with(|| Slot {
                first_seen: self.next_seq.fetch_add(1, Ordering::Relaxed),
                count,
            });
    }

    /// Count one occurrence of `word` found at byte `position` of its source.
    ///
    /// The word keeps the lowest position any writer reported for it.
    pub fn record_at(&self, word: CanonicalWord, position: u64) {
        self.words
            .entry(word)
            .and_modify(|slot| {
                slot.count += 1;
                slot.first_seen = slot.first_seen.min(position);
            })
            .or_insert(Slot {
                first_seen: position,
                count: 1,
            });
    }

    /// Fold `other` into this table, consuming it.
    ///
    /// Words new to this table are inserted in `other`'s discovery order.
    pub fn merge(&self, other: FrequencyTable) {
        for (word, count) in other.into_entries() {
            self.add(word, count);
        }
    }

    /// Insert a word that must not already be present.
    pub(crate) fn try_insert(&self, word: CanonicalWord, count: u64) -> bool {
        match self.words.entry(word) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    first_seen: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    count,
                });
                true
            }
        }
    }

    pub fn get(&self, word: &str) -> Option<u64> {
        self.words.get(word).map(|slot| slot.count)
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.words.iter().map(|entry| entry.count).sum()
    }

    /// Snapshot of `(word, count)` pairs in discovery order.
    ///
    /// Only meaningful once writers have finished.
    pub fn entries(&self) -> Vec<(CanonicalWord, u64)> {
        let mut snapshot: Vec<(u64, CanonicalWord, u64)> = self
            .words
            .iter()
            .map(|entry| (entry.first_seen, entry.key().clone(), entry.count))
            .collect();
        snapshot.sort_unstable_by_key(|(seq, _, _)| *seq);
        snapshot
            .into_iter()
            .map(|(_, word, count)| (word, count))
            .collect()
    }

    /// Like [`entries`](Self::entries) but without cloning the words.
    pub fn into_entries(self) -> Vec<(CanonicalWord, u64)> {
        let mut snapshot: Vec<(CanonicalWord, Slot)> = self.words.into_iter().collect();
        snapshot.sort_unstable_by_key(|(_, slot)| slot.first_seen);
        snapshot
            .into_iter()
            .map(|(word, slot)| (word, slot.count))
            .collect()
    }
}
