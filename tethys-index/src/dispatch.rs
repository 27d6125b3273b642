//! Parallel batch indexing.
//!
//! A fixed pool of workers pulls raw records from a shared source in
//! batches, runs each through its own [`RecordPreparer`], and hands the
//! finished batch to a single collector over a channel. The collector
//! delivers results in completion order, which is unspecified relative
//! to submission order; callers needing stable order sort by id.
//!
//! Each prepared record is passed to the result sink by value. Per-record
//! parse and consistency failures go to the error sink and never stop
//! the run; any other failure aborts the run and is re-raised with the
//! offending record id. Termination is cooperative: workers check the
//! flag between batches and between records, finish the record in hand,
//! and every already-produced result is still delivered.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel as channel;
use parking_lot::Mutex;

use tethys_core::{Result, TethysError};

use crate::dict::LzwDict;
use crate::prepare::{PrepareOptions, PreparedRecord, RecordPreparer};

/// Pull interface over raw `(id, bytes)` records. An empty return means
/// exhaustion.
pub trait RecordSource: Send {
    fn pull(&mut self, max: usize) -> Vec<(u64, Vec<u8>)>;
}

/// Any iterator of records is a source.
impl<I> RecordSource for I
where
    I: Iterator<Item = (u64, Vec<u8>)> + Send,
{
    fn pull(&mut self, max: usize) -> Vec<(u64, Vec<u8>)> {
        let mut out = Vec::with_capacity(max);
        while out.len() < max {
            match self.next() {
                Some(record) => out.push(record),
                None => break,
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub worker_count: usize,
    /// Records pulled per lock acquisition.
    pub batch_size: usize,
    pub prepare: PrepareOptions,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions { worker_count: 4, batch_size: 16, prepare: PrepareOptions::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatchState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Done = 3,
}

/// Observer handle: request cooperative termination, read the state.
#[derive(Clone)]
pub struct DispatchHandle {
    terminate: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl DispatchHandle {
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> DispatchState {
        match self.state.load(Ordering::SeqCst) {
            0 => DispatchState::Idle,
            1 => DispatchState::Running,
            2 => DispatchState::Draining,
            _ => DispatchState::Done,
        }
    }
}

/// Counts reported by a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub prepared: usize,
    pub failed: usize,
}

struct Batch {
    records: Vec<PreparedRecord>,
    errors: Vec<(u64, String)>,
    /// Unrecognized failure; poisons the whole run.
    fatal: Option<(u64, TethysError)>,
}

pub struct Dispatcher {
    options: DispatchOptions,
    dict: Arc<Mutex<LzwDict>>,
    terminate: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl Dispatcher {
    pub fn new(options: DispatchOptions, dict: Arc<Mutex<LzwDict>>) -> Self {
        Dispatcher {
            options,
            dict,
            terminate: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(DispatchState::Idle as u8)),
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle { terminate: self.terminate.clone(), state: self.state.clone() }
    }

    /// Run the pool to exhaustion (or termination), collecting on the
    /// calling thread. Sinks are called in completion order with the
    /// result passed by value.
    pub fn run<S>(
        &mut self,
        source: S,
        mut result_sink: impl FnMut(PreparedRecord),
        mut error_sink: impl FnMut(u64, String),
    ) -> Result<DispatchSummary>
    where
        S: RecordSource,
    {
        let worker_count = self.options.worker_count.max(1);
        let batch_size = self.options.batch_size.max(1);
        let source = Mutex::new(source);
        let (batch_tx, batch_rx) = channel::bounded::<Batch>(worker_count * 2);

        self.terminate.store(false, Ordering::SeqCst);
        self.state.store(DispatchState::Running as u8, Ordering::SeqCst);

        let mut summary = DispatchSummary::default();
        let mut fatal: Option<(u64, TethysError)> = None;

        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                let tx = batch_tx.clone();
                let source = &source;
                let terminate = &self.terminate;
                let state = &self.state;
                let preparer =
                    RecordPreparer::new(self.options.prepare.clone(), self.dict.clone());
                scope.spawn(move || {
                    worker_loop(&preparer, source, batch_size, terminate, state, tx);
                });
            }
            drop(batch_tx);

            // Completion-order collection; the channel closes when the
            // last worker exits.
            for batch in batch_rx {
                for record in batch.records {
                    summary.prepared += 1;
                    result_sink(record);
                }
                for (id, message) in batch.errors {
                    summary.failed += 1;
                    error_sink(id, message);
                }
                if let Some((id, err)) = batch.fatal {
                    if fatal.is_none() {
                        fatal = Some((id, err));
                    }
                    // Stop the other workers, but keep draining so every
                    // already-produced result is delivered.
                    self.terminate.store(true, Ordering::SeqCst);
                }
            }
        });

        self.state.store(DispatchState::Done as u8, Ordering::SeqCst);
        match fatal {
            Some((id, err)) => Err(TethysError::Internal(format!("record {id}: {err}"))),
            None => Ok(summary),
        }
    }
}

fn worker_loop<S: RecordSource>(
    preparer: &RecordPreparer,
    source: &Mutex<S>,
    batch_size: usize,
    terminate: &AtomicBool,
    state: &AtomicU8,
    tx: channel::Sender<Batch>,
) {
    loop {
        if terminate.load(Ordering::SeqCst) {
            return;
        }
        let pulled = source.lock().pull(batch_size);
        if pulled.is_empty() {
            // Exhausted source: the pool is draining in-flight batches.
            let _ = state.compare_exchange(
                DispatchState::Running as u8,
                DispatchState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            return;
        }

        let mut batch =
            Batch { records: Vec::with_capacity(pulled.len()), errors: Vec::new(), fatal: None };
        for (id, raw) in pulled {
            if terminate.load(Ordering::SeqCst) {
                break;
            }
            match preparer.prepare(id, &raw) {
                Ok(record) => batch.records.push(record),
                Err(err) if err.is_record_level() => batch.errors.push((id, err.to_string())),
                Err(err) => {
                    batch.fatal = Some((id, err));
                    break;
                }
            }
        }
        let poisoned = batch.fatal.is_some();
        if tx.send(batch).is_err() || poisoned {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn records(raws: &[&str]) -> impl Iterator<Item = (u64, Vec<u8>)> + Send {
        raws.iter()
            .map(|s| s.as_bytes().to_vec())
            .collect::<Vec<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, raw)| (i as u64, raw))
    }

    fn dispatcher(worker_count: usize) -> Dispatcher {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        Dispatcher::new(
            DispatchOptions { worker_count, batch_size: 2, ..Default::default() },
            dict,
        )
    }

    #[test]
    fn malformed_record_does_not_poison_the_run() {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        let before = dict.lock().code_count();
        let mut d = Dispatcher::new(
            DispatchOptions { worker_count: 2, batch_size: 2, ..Default::default() },
            dict.clone(),
        );

        let mut ok = Vec::new();
        let mut errs = Vec::new();
        let summary = d
            .run(
                records(&["C1CCCCC1", "not-a-molecule", "c1ccccc1"]),
                |rec| ok.push(rec.id),
                |id, _msg| errs.push(id),
            )
            .unwrap();

        ok.sort_unstable();
        assert_eq!(ok, vec![0, 2]);
        assert_eq!(errs, vec![1]);
        assert_eq!(summary, DispatchSummary { prepared: 2, failed: 1 });
        assert!(dict.lock().code_count() > before, "dictionary grew during the run");
        assert_eq!(d.handle().state(), DispatchState::Done);
    }

    #[test]
    fn batch_isolation_any_worker_count() {
        let raws: Vec<String> = (0..20)
            .map(|i| if i == 13 { "<garbage>".to_string() } else { format!("{}O", "C".repeat(i + 1)) })
            .collect();
        for workers in [1, 2, 4] {
            let mut d = dispatcher(workers);
            let mut ok = Vec::new();
            let mut errs = Vec::new();
            let source = raws
                .clone()
                .into_iter()
                .enumerate()
                .map(|(i, s)| (i as u64, s.into_bytes()));
            d.run(source, |rec| ok.push(rec.id), |id, _| errs.push(id)).unwrap();
            assert_eq!(ok.len(), 19, "workers={workers}");
            assert_eq!(errs, vec![13], "workers={workers}");
        }
    }

    #[test]
    fn results_carry_full_records() {
        let mut d = dispatcher(2);
        let mut by_id = BTreeMap::new();
        d.run(
            records(&["CCO", "c1ccccc1"]),
            |rec| {
                by_id.insert(rec.id, rec);
            },
            |_, _| panic!("no errors expected"),
        )
        .unwrap();
        assert_eq!(by_id[&0].gross, "C2H6O");
        assert_eq!(by_id[&1].gross, "C6H6");
    }

    #[test]
    fn reject_invalid_aborts_run_with_offending_id() {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        let mut d = Dispatcher::new(
            DispatchOptions {
                worker_count: 1,
                batch_size: 1,
                prepare: PrepareOptions { reject_invalid: true, ..Default::default() },
            },
            dict,
        );
        let err = d
            .run(
                records(&["CCO", "C(C)(C)(C)(C)C", "CC"]),
                |_| {},
                |_, _| panic!("consistency failures escalate, not sink"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("record 1"), "{err}");
    }

    #[test]
    fn terminate_mid_run_still_delivers_produced_results() {
        let total = 500usize;
        let mut d = dispatcher(2);
        let handle = d.handle();

        let source = (0..total).map(|i| (i as u64, b"CCO".to_vec()));
        let mut ok = Vec::new();
        let summary = d
            .run(
                source,
                |rec| {
                    // Stop the pool as soon as the first result lands;
                    // workers finish the record in hand and drain.
                    handle.terminate();
                    assert!(!rec.blob.is_empty());
                    assert!(rec.fingerprint.is_some());
                    ok.push(rec.id);
                },
                |_, _| panic!("no errors expected"),
            )
            .unwrap();

        assert_eq!(summary.prepared, ok.len());
        assert_eq!(summary.failed, 0);
        assert!(
            !ok.is_empty() && ok.len() < total,
            "terminate cut the run short after {} of {total}",
            ok.len()
        );
        let mut ids = ok.clone();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ok.len(), "no record delivered twice");
        assert_eq!(handle.state(), DispatchState::Done);
    }

    #[test]
    fn run_resets_a_stale_terminate_request() {
        let mut d = dispatcher(2);
        d.handle().terminate();
        let mut count = 0;
        d.run(records(&["C", "CC"]), |_| count += 1, |_, _| {}).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn empty_source_completes_immediately() {
        let mut d = dispatcher(3);
        let summary = d
            .run(std::iter::empty::<(u64, Vec<u8>)>(), |_| {}, |_, _| {})
            .unwrap();
        assert_eq!(summary, DispatchSummary::default());
        assert_eq!(d.handle().state(), DispatchState::Done);
    }
}
