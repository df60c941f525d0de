use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};
use wordfreq_source::{SourceBuffer, SourceFile};

use crate::error::{EngineError, panic_message};
use crate::scheduler::{ChunkScheduler, DEFAULT_CHUNKS};
use crate::table::FrequencyTable;
use crate::tokenizer::ChunkStats;

/// One independent unit of input text.
///
/// Loading happens on the source's own worker, so a load failure belongs to
/// that source alone and surfaces as [`EngineError::SourceUnavailable`].
pub trait Source: Sync {
    type Bytes<'a>: AsRef<[u8]>
    where
        Self: 'a;

    fn id(&self) -> &str;

    fn load(&self) -> anyhow::Result<Self::Bytes<'_>>;

    /// Chunk count for this source; `None` uses the engine default.
    fn concurrency(&self) -> Option<usize> {
        None
    }
}

/// A source whose bytes are already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    id: String,
    bytes: Vec<u8>,
    chunks: Option<usize>,
}

impl MemorySource {
    pub fn new(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
            chunks: None,
        }
    }

    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = Some(chunks);
        self
    }
}

impl Source for MemorySource {
    type Bytes<'a> = &'a [u8];

    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self) -> anyhow::Result<&[u8]> {
        Ok(&self.bytes)
    }

    fn concurrency(&self) -> Option<usize> {
        self.chunks
    }
}

impl Source for SourceFile {
    type Bytes<'a> = SourceBuffer;

    fn id(&self) -> &str {
        self.display_name()
    }

    fn load(&self) -> anyhow::Result<SourceBuffer> {
        SourceFile::load(self)
    }
}

/// How per-source tables are folded into the global table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeOrder {
    /// Fold in caller order once every source has finished. Each source
    /// table is ordered by text position, so tie-break order in the final
    /// ranking depends only on the input, not on chunking or scheduling.
    #[default]
    Input,
    /// Fold each table as soon as it arrives. Ties between words first seen in
    /// different sources may rank differently from run to run.
    Arrival,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chunks_per_source: usize,
    pub merge_order: MergeOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunks_per_source: DEFAULT_CHUNKS,
            merge_order: MergeOrder::default(),
        }
    }
}

/// A finished per-source table, handed over by value.
#[derive(Debug)]
pub struct SourceResult {
    pub index: usize,
    pub id: String,
    pub table: FrequencyTable,
    pub stats: ChunkStats,
}

/// Runs every source in isolation and merges their tables.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: EngineConfig,
}

impl Aggregator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Count every source on its own thread and merge the results.
    ///
    /// Any failed source aborts the whole run: the error is returned and no
    /// table is produced. Zero sources yield an empty table.
    pub fn aggregate<S: Source>(&self, sources: &[S]) -> Result<FrequencyTable, EngineError> {
        self.aggregate_with_stats(sources).map(|(table, _)| table)
    }

    /// [`aggregate`](Self::aggregate), also returning the tokenizer stats
    /// summed over every source.
    pub fn aggregate_with_stats<S: Source>(
        &self,
        sources: &[S],
    ) -> Result<(FrequencyTable, ChunkStats), EngineError> {
        let ids: Vec<&str> = sources.iter().map(Source::id).collect();
        let chunks = self.config.chunks_per_source;
        self.drive(&ids, |index| count_source(&sources[index], index, chunks))
    }

    /// Outer-tier driver shared by thread and process isolation.
    ///
    /// `job(index)` must produce the finished table for source `index`. Each
    /// job runs on its own thread; results are collected as they arrive.
    pub(crate) fn drive<F>(
        &self,
        ids: &[&str],
        job: F,
    ) -> Result<(FrequencyTable, ChunkStats), EngineError>
    where
        F: Fn(usize) -> Result<SourceResult, EngineError> + Sync,
    {
        let global = FrequencyTable::new();
        let mut totals = ChunkStats::default();
        if ids.is_empty() {
            info!("no sources to aggregate");
            return Ok((global, totals));
        }

        let start = Instant::now();
        let cancelled = AtomicBool::new(false);
        let mut pending: Vec<Option<FrequencyTable>> = ids.iter().map(|_| None).collect();

        let failure = thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<Result<SourceResult, EngineError>>();
            let mut failure = None;
            let mut handles = Vec::with_capacity(ids.len());

            for (index, id) in ids.iter().enumerate() {
                let tx = tx.clone();
                let job = &job;
                let cancelled = &cancelled;
                let spawned = thread::Builder::new()
                    .name(format!("wordfreq-source-{index}"))
                    .spawn_scoped(scope, move || {
                        if cancelled.load(Ordering::Acquire) {
                            return;
                        }
                        // The receiver outlives every sender.
                        let _ = tx.send(job(index));
                    });
                match spawned {
                    Ok(handle) => handles.push((*id, handle)),
                    Err(source) => {
                        cancelled.store(true, Ordering::Release);
                        failure = Some(EngineError::Spawn {
                            what: format!("worker for source {id}"),
                            source,
                        });
                        break;
                    }
                }
            }
            drop(tx);

            for received in rx {
                match received {
                    Ok(result) => {
                        debug!(
                            "received {} distinct words from {}",
                            result.table.len(),
                            result.id
                        );
                        if failure.is_some() {
                            continue;
                        }
                        totals += result.stats;
                        match self.config.merge_order {
                            MergeOrder::Arrival => global.merge(result.table),
                            MergeOrder::Input => pending[result.index] = Some(result.table),
                        }
                    }
                    Err(err) => {
                        if failure.is_none() {
                            warn!("aborting aggregation: {err}");
                            cancelled.store(true, Ordering::Release);
                            failure = Some(err);
                        }
                    }
                }
            }

            for (id, handle) in handles {
                if let Err(payload) = handle.join() {
                    failure.get_or_insert_with(|| EngineError::SourcePanicked {
                        id: id.to_string(),
                        message: panic_message(&*payload),
                    });
                }
            }
            failure
        });

        if let Some(err) = failure {
            return Err(err);
        }
        for table in pending.into_iter().flatten() {
            global.merge(table);
        }

        if totals.overflowed > 0 {
            warn!(
                "{} overlong alphabetic runs were discarded across all sources",
                totals.overflowed
            );
        }
        info!(
            "aggregated {} sources into {} distinct words ({} total, {} rejected, {} overflowed) in {} ms",
            ids.len(),
            global.len(),
            global.total(),
            totals.rejected,
            totals.overflowed,
            start.elapsed().as_millis()
        );
        Ok((global, totals))
    }
}

fn count_source<S: Source>(
    source: &S,
    index: usize,
    default_chunks: usize,
) -> Result<SourceResult, EngineError> {
    let id = source.id();
    let start = Instant::now();
    let bytes = source
        .load()
        .map_err(|err| EngineError::source_unavailable(id, &err))?;
    let buffer = bytes.as_ref();
    let chunks = source.concurrency().unwrap_or(default_chunks);
    let (table, stats) = ChunkScheduler::new(chunks).run(id, buffer)?;
    info!(
        "{id}: {} distinct words from {} bytes ({} counted, {} rejected, {} overflowed) in {} ms",
        table.len(),
        buffer.len(),
        stats.counted,
        stats.rejected,
        stats.overflowed,
        start.elapsed().as_millis()
    );
    Ok(SourceResult {
        index,
        id: id.to_string(),
        table,
        stats,
    })
}
