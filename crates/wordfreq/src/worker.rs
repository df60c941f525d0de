//! Outer tier as separate OS processes.
//!
//! The parent re-executes its own binary once per file with the
//! [`WORKER_SUBCOMMAND`]; each child counts one file and writes the finished
//! table and its [`ChunkStats`] to stdout using the [`wire`](crate::wire)
//! framing.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::{debug, info};
use wordfreq_source::SourceFile;

use crate::aggregator::{Aggregator, SourceResult};
use crate::error::EngineError;
use crate::scheduler::ChunkScheduler;
use crate::table::FrequencyTable;
use crate::tokenizer::ChunkStats;
use crate::wire;

pub const WORKER_SUBCOMMAND: &str = "worker";

/// Exit status a worker uses when its file could not be loaded.
pub const EXIT_SOURCE_UNAVAILABLE: i32 = 3;

/// Child side: count `file` and stream the table and stats to `out`.
pub fn run_worker<W: Write>(
    file: &SourceFile,
    chunks: usize,
    out: W,
) -> Result<ChunkStats, EngineError> {
    let id = file.display_name();
    let buffer = file
        .load()
        .map_err(|err| EngineError::source_unavailable(id, &err))?;
    let (table, stats) = ChunkScheduler::new(chunks).run(id, &buffer)?;
    debug!("{id}: sending {} distinct words", table.len());

    let mut out = BufWriter::new(out);
    wire::encode(&table, &stats, &mut out)
        .and_then(|()| out.flush().map_err(wire::WireError::from))
        .map_err(|source| EngineError::Transfer {
            id: id.to_string(),
            source,
        })?;
    Ok(stats)
}

impl Aggregator {
    /// Count each file in its own child process of `program` and merge the
    /// tables the children send back.
    ///
    /// Failure policy matches [`Aggregator::aggregate`].
    pub fn aggregate_processes(
        &self,
        program: &Path,
        files: &[SourceFile],
    ) -> Result<FrequencyTable, EngineError> {
        self.aggregate_processes_with_stats(program, files)
            .map(|(table, _)| table)
    }

    /// [`aggregate_processes`](Self::aggregate_processes), also returning the
    /// tokenizer stats the children reported, summed over every file.
    pub fn aggregate_processes_with_stats(
        &self,
        program: &Path,
        files: &[SourceFile],
    ) -> Result<(FrequencyTable, ChunkStats), EngineError> {
        let ids: Vec<&str> = files.iter().map(SourceFile::display_name).collect();
        let chunks = self.config().chunks_per_source.max(1);
        self.drive(&ids, |index| run_child(program, &files[index], index, chunks))
    }
}

fn run_child(
    program: &Path,
    file: &SourceFile,
    index: usize,
    chunks: usize,
) -> Result<SourceResult, EngineError> {
    let id = file.display_name();
    let start = Instant::now();
    let output = Command::new(program)
        .arg(WORKER_SUBCOMMAND)
        .arg("--chunks")
        .arg(chunks.to_string())
        .arg("--load-mode")
        .arg(file.mode().as_str())
        .arg(file.path())
        .stdin(Stdio::null())
        .output()
        .map_err(|source| EngineError::Spawn {
            what: format!("worker process for {id}"),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        if output.status.code() == Some(EXIT_SOURCE_UNAVAILABLE) {
            return Err(EngineError::SourceUnavailable {
                id: id.to_string(),
                reason: stderr,
            });
        }
        return Err(EngineError::WorkerFailed {
            id: id.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }
    for line in stderr.lines() {
        debug!("[{id}] {line}");
    }

    let (table, stats) =
        wire::decode_all(&output.stdout).map_err(|source| EngineError::Transfer {
            id: id.to_string(),
            source,
        })?;
    info!(
        "{id}: {} distinct words from worker process ({} counted, {} rejected, {} overflowed) in {} ms",
        table.len(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use wordfreq_source::LoadMode;

    #[test]
    fn worker_streams_a_decodable_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"dog dog bird").unwrap();
        let source = SourceFile::new(file.path(), LoadMode::Owned);

        let mut out = Vec::new();
        let stats = run_worker(&source, 2, &mut out).unwrap();
        assert_eq!(stats.counted, 3);

        let (table, sent) = wire::decode_all(&out).unwrap();
        assert_eq!(sent, stats);
        assert_eq!(table.get("dog"), Some(2));
        assert_eq!(table.get("bird"), Some(1));
    }

    #[test]
    fn worker_reports_missing_file_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceFile::new(dir.path().join("absent"), LoadMode::Mmap);
        let err = run_worker(&source, 2, Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_worker_program_is_a_worker_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"cat dog").unwrap();
        let files = vec![SourceFile::new(file.path(), LoadMode::Owned)];

        // `false` ignores its arguments and exits with status 1.
        let err = Aggregator::default()
            .aggregate_processes(Path::new("false"), &files)
            .unwrap_err();
        assert!(err.is_concurrency_failure());
        match err {
            EngineError::WorkerFailed { id, status, .. } => {
                assert_eq!(id, files[0].display_name());
                assert!(status.contains('1'), "status: {status}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn garbage_on_stdout_is_a_transfer_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"cat dog").unwrap();
        let files = vec![SourceFile::new(file.path(), LoadMode::Owned)];

        // `echo` exits 0 and prints its arguments, which is not a table.
        let err = Aggregator::default()
            .aggregate_processes(Path::new("echo"), &files)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transfer {
                source: wire::WireError::BadMagic,
                ..
            }
        ));
    }
}
