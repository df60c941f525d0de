use wordfreq_types::RankedEntry;

use crate::table::FrequencyTable;

/// Report size used when a caller does not pick one.
pub const DEFAULT_TOP_K: usize = 50;

/// The `k` most frequent words, highest count first.
///
/// Equal counts keep the order in which the words were first inserted into
/// `table`. Returns `min(k, table.len())` entries.
pub fn top_k(table: &FrequencyTable, k: usize) -> Vec<RankedEntry> {
    if k == 0 {
        return Vec::new();
    }
    let mut entries = table.entries();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(k);
    entries
        .into_iter()
        .map(|(word, count)| RankedEntry::new(word, count))
        .collect()
}

/// Frozen ranking of a whole table, cheap to slice repeatedly.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    entries: Vec<RankedEntry>,
    total: u64,
}

impl Ranking {
    pub fn from_table(table: &FrequencyTable) -> Self {
        Self {
            entries: top_k(table, usize::MAX),
            total: table.total(),
        }
    }

    pub fn top(&self, k: usize) -> &[RankedEntry] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
