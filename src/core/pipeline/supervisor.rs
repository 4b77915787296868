//! Bounded-concurrency supervisor: dedupe, dispatch, in-order write.
//!
//! Workers process cues in parallel; the writer appends records to the
//! ledger strictly in cue-index order, parking out-of-order arrivals in a
//! waiting room keyed by index. Cues whose resumption needle is already in
//! the ledger never reach a worker. The first worker error cancels the
//! supervisor scope exactly once; partial output already written stays on
//! disk, which is the restartable contract.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::{CueProcessor, ProcessedRecord};
use crate::Result;
use crate::core::paths::timecode;
use crate::core::resume::{ResumptionStore, search_needle};
use crate::core::subtitle::Cue;
use crate::error::LingoError;

/// Progress callback: called with (written + skipped, total) after every
/// ledger append and skip.
pub type ProgressSink = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Supervisor tuning.
#[derive(Clone)]
pub struct SupervisorOptions {
    /// Worker count, `W >= 1`.
    pub workers: usize,
    /// Ledger field separator.
    pub field_sep: char,
    /// Optional progress observer.
    pub progress: Option<ProgressSink>,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            field_sep: '\t',
            progress: None,
        }
    }
}

/// What a supervisor run accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Records appended this run.
    pub written: usize,
    /// Cues skipped because their needle was already in the ledger.
    pub skipped: usize,
}

/// Process `cues` with bounded parallelism and write results in index order.
///
/// The ledger at `ledger_path` is opened in append mode; this writer holds
/// exclusive append access for the duration of the run. Cancelling `parent`
/// cancels every worker at its next suspension point.
pub async fn run_supervisor(
    parent: &CancellationToken,
    cues: Vec<Cue>,
    processor: Arc<dyn CueProcessor>,
    store: &ResumptionStore,
    ledger_path: &Path,
    options: SupervisorOptions,
) -> Result<SupervisorReport> {
    let cancel = parent.child_token();
    let total = cues.len();
    let workers = options.workers.max(1);

    // Dedupe up front: the store already holds the full ledger content.
    let skip: BTreeSet<usize> = cues
        .iter()
        .filter(|cue| {
            store.is_already_processed(&search_needle(options.field_sep, &timecode(cue.start)))
        })
        .map(|cue| cue.index)
        .collect();
    if !skip.is_empty() {
        info!("{} of {} cues already in ledger; skipping", skip.len(), total);
    }

    let (cues_tx, cues_rx) = mpsc::channel::<Cue>(1);
    let (results_tx, mut results_rx) = mpsc::channel::<ProcessedRecord>(total.max(1));
    let (errors_tx, mut errors_rx) = mpsc::channel::<LingoError>(workers);
    let shared_rx = Arc::new(Mutex::new(cues_rx));

    // Producer: dispatch non-skipped cues in order.
    let producer = {
        let cancel = cancel.clone();
        let skip = skip.clone();
        let cues = cues.clone();
        tokio::spawn(async move {
            for cue in cues {
                if skip.contains(&cue.index) {
                    continue;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = cues_tx.send(cue) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    };

    // Workers: consume, process, emit a result or a first error.
    let mut worker_handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let cancel = cancel.clone();
        let shared_rx = Arc::clone(&shared_rx);
        let results_tx = results_tx.clone();
        let errors_tx = errors_tx.clone();
        let processor = Arc::clone(&processor);
        worker_handles.push(tokio::spawn(async move {
            loop {
                let cue = {
                    let mut rx = shared_rx.lock().await;
                    tokio::select! {
                        _ = cancel.cancelled() => None,
                        cue = rx.recv() => cue,
                    }
                };
                let Some(cue) = cue else { break };

                let index = cue.index;
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err(LingoError::Cancelled),
                    result = processor.process(&cancel, &cue) => result,
                };
                match outcome {
                    Ok(record) => {
                        debug!("worker {} finished cue {}", worker_id, index);
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            sent = results_tx.send(record) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!("worker {} failed on cue {}: {}", worker_id, index, e);
                        let _ = errors_tx.send(e).await;
                        break;
                    }
                }
            }
        }));
    }
    drop(results_tx);
    drop(errors_tx);

    // Error sentinel: first error wins and cancels the scope exactly once.
    let first_error: Arc<StdMutex<Option<LingoError>>> = Arc::new(StdMutex::new(None));
    let sentinel = {
        let cancel = cancel.clone();
        let first_error = Arc::clone(&first_error);
        tokio::spawn(async move {
            if let Some(error) = errors_rx.recv().await {
                *first_error.lock().unwrap() = Some(error);
                cancel.cancel();
                // Drain peers' errors so nobody blocks on a full channel.
                while errors_rx.recv().await.is_some() {}
            }
        })
    };

    // Writer: this stage's own task. Strictly ascending index order.
    let mut ledger = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(ledger_path)
        .await?;
    let mut waiting: BTreeMap<usize, ProcessedRecord> = BTreeMap::new();
    let mut next_index = 0usize;
    let mut written = 0usize;
    let skipped = skip.len();
    let report_progress = |done: usize| {
        if let Some(progress) = &options.progress {
            progress(done, total);
        }
    };
    report_progress(skipped);

    loop {
        while skip.contains(&next_index) {
            next_index += 1;
        }
        if let Some(record) = waiting.remove(&next_index) {
            write_record(&mut ledger, &record, options.field_sep).await?;
            written += 1;
            next_index += 1;
            report_progress(written + skipped);
            continue;
        }
        if written + skipped >= total {
            break;
        }

        let received = tokio::select! {
            _ = cancel.cancelled() => None,
            record = results_rx.recv() => record,
        };
        let Some(record) = received else { break };
        if record.index == next_index {
            write_record(&mut ledger, &record, options.field_sep).await?;
            written += 1;
            next_index += 1;
            report_progress(written + skipped);
        } else {
            waiting.insert(record.index, record);
        }
    }

    // Flush the contiguous prefix that arrived before shutdown; anything
    // beyond the first gap is dropped and will be reprocessed next run.
    loop {
        while skip.contains(&next_index) {
            next_index += 1;
        }
        let Some(record) = waiting.remove(&next_index) else { break };
        write_record(&mut ledger, &record, options.field_sep).await?;
        written += 1;
        next_index += 1;
        report_progress(written + skipped);
    }
    ledger.flush().await?;

    cancel.cancel();
    producer.abort();
    let _ = producer.await;
    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = sentinel.await;

    if let Some(error) = first_error.lock().unwrap().take() {
        return Err(error);
    }
    if parent.is_cancelled() {
        return Err(LingoError::Cancelled);
    }
    Ok(SupervisorReport { written, skipped })
}

async fn write_record(
    ledger: &mut tokio::fs::File,
    record: &ProcessedRecord,
    field_sep: char,
) -> Result<()> {
    // One buffered write per record keeps torn lines unlikely; a torn line
    // can only lack the trailing fields, never fake another cue's needle.
    let mut line = record.ledger_line(field_sep);
    line.push('\n');
    ledger.write_all(line.as_bytes()).await?;
    Ok(())
}
