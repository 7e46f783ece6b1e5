//! Series orchestration across node counts.
//!
//! A series runs one algorithm at every node count in [`NODE_COUNTS`],
//! strictly ascending and strictly sequential. The first trial's duration is
//! the baseline for every speedup in the series. Completed trials are
//! persisted immediately, so a failure partway through never loses earlier
//! results.

use std::sync::Arc;

use log::{info, warn};

use crate::cluster::Algorithm;
use crate::dataset::{
    select_features, summarize, ColumnStats, Dataset, DatasetError, FeatureSet, WorkingTable,
};
use crate::store::{BenchmarkRun, NewBenchmarkRun, ResultStore};

use super::metrics::{round_to, scaling_metrics};
use super::runner::{TrialOutcome, TrialRunner};
use super::BenchError;

/// The fixed node counts of a series, ascending.
pub const NODE_COUNTS: [usize; 4] = [1, 2, 4, 8];

/// Where a series currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesState {
    Idle,
    Preparing,
    Running(usize),
    Persisting(usize),
    Done,
    Failed,
}

/// Snapshot passed to the progress observer between steps.
#[derive(Debug)]
pub struct ProgressUpdate<'a> {
    /// Human-readable status line.
    pub status: &'a str,
    /// Dataset statistics, computed once after preparation.
    pub stats: &'a [ColumnStats],
    /// Trials completed and persisted so far.
    pub completed: &'a [BenchmarkRun],
}

/// Consumer of between-trial progress.
///
/// This is the series' only suspension point: the observer runs on the
/// orchestrating thread, before the next trial starts.
pub trait ProgressObserver {
    fn on_progress(&mut self, update: ProgressUpdate<'_>);
}

/// No-op observer for unattended runs.
impl ProgressObserver for () {
    fn on_progress(&mut self, _update: ProgressUpdate<'_>) {}
}

/// Runs one trial; implemented by [`TrialRunner`] and by test doubles.
pub trait TrialExecutor {
    fn execute(&mut self, algorithm: Algorithm, nodes: usize) -> Result<TrialOutcome, BenchError>;
}

/// Everything a completed series produced.
#[derive(Debug)]
pub struct SeriesReport {
    pub algorithm: Algorithm,
    pub runs: Vec<BenchmarkRun>,
    pub stats: Vec<ColumnStats>,
}

/// Drives benchmark series and owns the injected result store.
pub struct SeriesRunner<S: ResultStore> {
    store: S,
    state: SeriesState,
}

impl<S: ResultStore> SeriesRunner<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: SeriesState::Idle,
        }
    }

    /// Current state of the most recent series.
    pub fn state(&self) -> SeriesState {
        self.state
    }

    /// The injected store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Prepare `dataset` and run a full series for `algorithm`.
    ///
    /// Preparation (feature selection, staging, statistics) happens before
    /// any compute session exists; an empty dataset or a schema with no
    /// usable features aborts here without acquiring resources. Passing a
    /// seed pins every trial; otherwise each trial draws its own.
    pub fn run_dataset<O: ProgressObserver>(
        &mut self,
        dataset: &Dataset,
        algorithm: Algorithm,
        seed: Option<u64>,
        observer: &mut O,
    ) -> Result<SeriesReport, BenchError> {
        self.state = SeriesState::Preparing;
        observer.on_progress(ProgressUpdate {
            status: "preparing data and updating the working table",
            stats: &[],
            completed: &[],
        });

        let (features, table) = match prepare(dataset) {
            Ok(p) => p,
            Err(err) => {
                self.state = SeriesState::Failed;
                return Err(BenchError::Dataset(err));
            }
        };
        let stats = summarize(dataset);

        let mut runner = TrialRunner::new(table, features);
        if let Some(seed) = seed {
            runner = runner.with_fixed_seed(seed);
        }

        self.run_series(&mut runner, algorithm, &stats, observer)
    }

    /// Run a full series with an explicit trial executor.
    pub fn run_series<E: TrialExecutor, O: ProgressObserver>(
        &mut self,
        executor: &mut E,
        algorithm: Algorithm,
        stats: &[ColumnStats],
        observer: &mut O,
    ) -> Result<SeriesReport, BenchError> {
        let mut completed: Vec<BenchmarkRun> = Vec::new();
        let mut baseline: Option<f64> = None;

        for &nodes in NODE_COUNTS.iter() {
            self.state = SeriesState::Running(nodes);
            let status = format!("processing {algorithm} on {nodes} node(s)");
            observer.on_progress(ProgressUpdate {
                status: &status,
                stats,
                completed: &completed,
            });

            let outcome = match executor.execute(algorithm, nodes) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.state = SeriesState::Failed;
                    return Err(err);
                }
            };

            // The first (n=1) duration anchors every speedup in the series.
            let t1 = *baseline.get_or_insert(outcome.duration_seconds);
            let metrics = scaling_metrics(t1, outcome.duration_seconds, nodes);
            let record = NewBenchmarkRun {
                algorithm: algorithm.to_string(),
                nodes: nodes as u32,
                duration_seconds: round_to(outcome.duration_seconds, 4),
                speedup: metrics.speedup,
                efficiency_percent: metrics.efficiency_percent,
                row_count: outcome.rows_used as u64,
                timestamp: None,
            };

            self.state = SeriesState::Persisting(nodes);
            let saved = self.save_with_retry(record)?;
            info!(
                "{}: {} nodes in {:.4}s (speedup {:.2}, efficiency {:.1}%)",
                saved.algorithm,
                saved.nodes,
                saved.duration_seconds,
                saved.speedup,
                saved.efficiency_percent
            );
            completed.push(saved);
        }

        self.state = SeriesState::Done;
        let status = format!("{algorithm} series complete, results stored");
        observer.on_progress(ProgressUpdate {
            status: &status,
            stats,
            completed: &completed,
        });

        Ok(SeriesReport {
            algorithm,
            runs: completed,
            stats: stats.to_vec(),
        })
    }

    /// Persist one record, retrying a failed write once.
    fn save_with_retry(&mut self, record: NewBenchmarkRun) -> Result<BenchmarkRun, BenchError> {
        match self.store.save(&record) {
            Ok(saved) => Ok(saved),
            Err(first) => {
                warn!("persisting trial result failed, retrying once: {first}");
                match self.store.save(&record) {
                    Ok(saved) => Ok(saved),
                    Err(source) => {
                        self.state = SeriesState::Failed;
                        Err(BenchError::Persistence {
                            run: Box::new(record),
                            source,
                        })
                    }
                }
            }
        }
    }
}

/// Feature selection and staging, both ahead of any session acquisition.
fn prepare(dataset: &Dataset) -> Result<(FeatureSet, Arc<WorkingTable>), DatasetError> {
    let features = select_features(dataset)?;
    let table = WorkingTable::stage(dataset)?;
    Ok((features, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{FitError, FitSummary};
    use crate::store::MemoryStore;

    /// Scripted executor: a fixed duration per node count, or a failure.
    struct Scripted {
        durations: Vec<(usize, Result<f64, ()>)>,
        calls: Vec<usize>,
    }

    impl Scripted {
        fn new(durations: &[(usize, Result<f64, ()>)]) -> Self {
            Self {
                durations: durations.to_vec(),
                calls: Vec::new(),
            }
        }
    }

    impl TrialExecutor for Scripted {
        fn execute(
            &mut self,
            algorithm: Algorithm,
            nodes: usize,
        ) -> Result<TrialOutcome, BenchError> {
            self.calls.push(nodes);
            let scripted = self
                .durations
                .iter()
                .find(|(n, _)| *n == nodes)
                .map(|(_, r)| *r)
                .unwrap_or(Ok(0.1));
            match scripted {
                Ok(duration_seconds) => Ok(TrialOutcome {
                    duration_seconds,
                    rows_used: 1000,
                    seed: 42,
                    summary: FitSummary {
                        algorithm,
                        clusters: 2,
                        iterations: 1,
                        objective: 0.0,
                    },
                }),
                Err(()) => Err(BenchError::Trial {
                    algorithm,
                    nodes,
                    source: FitError::NoData,
                }),
            }
        }
    }

    /// Observer that records every status line and completed count.
    #[derive(Default)]
    struct Recording {
        statuses: Vec<String>,
        completed_counts: Vec<usize>,
    }

    impl ProgressObserver for Recording {
        fn on_progress(&mut self, update: ProgressUpdate<'_>) {
            self.statuses.push(update.status.to_string());
            self.completed_counts.push(update.completed.len());
        }
    }

    fn known_curve() -> Scripted {
        Scripted::new(&[(1, Ok(10.0)), (2, Ok(6.0)), (4, Ok(3.5)), (8, Ok(2.0))])
    }

    #[test]
    fn full_series_persists_the_expected_curve() {
        let mut runner = SeriesRunner::new(MemoryStore::new());
        let mut observer = Recording::default();
        let report = runner
            .run_series(&mut known_curve(), Algorithm::KMeans, &[], &mut observer)
            .unwrap();

        assert_eq!(runner.state(), SeriesState::Done);
        let speedups: Vec<f64> = report.runs.iter().map(|r| r.speedup).collect();
        let efficiencies: Vec<f64> = report.runs.iter().map(|r| r.efficiency_percent).collect();
        assert_eq!(speedups, vec![1.0, 1.67, 2.86, 5.0]);
        assert_eq!(efficiencies, vec![100.0, 83.5, 71.5, 62.5]);

        // Persisted immediately, ascending node order.
        let nodes: Vec<u32> = runner.store().runs().iter().map(|r| r.nodes).collect();
        assert_eq!(nodes, vec![1, 2, 4, 8]);
    }

    #[test]
    fn node_counts_run_strictly_ascending() {
        let mut executor = known_curve();
        let mut runner = SeriesRunner::new(MemoryStore::new());
        runner
            .run_series(&mut executor, Algorithm::Lda, &[], &mut ())
            .unwrap();
        assert_eq!(executor.calls, vec![1, 2, 4, 8]);
    }

    #[test]
    fn progress_is_reported_between_every_step() {
        let mut runner = SeriesRunner::new(MemoryStore::new());
        let mut observer = Recording::default();
        runner
            .run_series(&mut known_curve(), Algorithm::KMeans, &[], &mut observer)
            .unwrap();

        // One update per trial plus the completion update.
        assert_eq!(observer.statuses.len(), 5);
        assert_eq!(observer.completed_counts, vec![0, 1, 2, 3, 4]);
        assert!(observer.statuses[0].contains("1 node"));
        assert!(observer.statuses.last().unwrap().contains("complete"));
    }

    #[test]
    fn mid_series_failure_keeps_persisted_trials() {
        // Trial at n=4 fails after 1 and 2 succeeded.
        let mut executor =
            Scripted::new(&[(1, Ok(10.0)), (2, Ok(6.0)), (4, Err(())), (8, Ok(2.0))]);
        let mut runner = SeriesRunner::new(MemoryStore::new());
        let err = runner
            .run_series(&mut executor, Algorithm::GaussianMixture, &[], &mut ())
            .unwrap_err();

        assert_eq!(runner.state(), SeriesState::Failed);
        assert!(matches!(err, BenchError::Trial { nodes: 4, .. }));
        // n=8 never ran.
        assert_eq!(executor.calls, vec![1, 2, 4]);
        let nodes: Vec<u32> = runner.store().runs().iter().map(|r| r.nodes).collect();
        assert_eq!(nodes, vec![1, 2]);
    }

    #[test]
    fn baseline_failure_persists_nothing() {
        let mut executor = Scripted::new(&[(1, Err(()))]);
        let mut runner = SeriesRunner::new(MemoryStore::new());
        let err = runner
            .run_series(&mut executor, Algorithm::KMeans, &[], &mut ())
            .unwrap_err();

        assert!(matches!(err, BenchError::Trial { nodes: 1, .. }));
        assert_eq!(runner.state(), SeriesState::Failed);
        assert!(runner.store().runs().is_empty());
    }

    #[test]
    fn zero_duration_baseline_uses_fallback_speedup() {
        let mut executor =
            Scripted::new(&[(1, Ok(0.0)), (2, Ok(0.0)), (4, Ok(0.0)), (8, Ok(0.0))]);
        let mut runner = SeriesRunner::new(MemoryStore::new());
        let report = runner
            .run_series(&mut executor, Algorithm::KMeans, &[], &mut ())
            .unwrap();

        for run in &report.runs {
            assert_eq!(run.speedup, 1.0);
        }
        assert_eq!(report.runs[0].efficiency_percent, 100.0);
    }

    #[test]
    fn one_persistence_failure_is_retried_and_absorbed() {
        let mut store = MemoryStore::new();
        store.fail_next_saves(1);
        let mut runner = SeriesRunner::new(store);
        let report = runner
            .run_series(&mut known_curve(), Algorithm::KMeans, &[], &mut ())
            .unwrap();

        assert_eq!(runner.state(), SeriesState::Done);
        assert_eq!(report.runs.len(), 4);
        assert_eq!(runner.store().runs().len(), 4);
    }

    #[test]
    fn repeated_persistence_failure_fails_the_series_but_reports_the_run() {
        let mut store = MemoryStore::new();
        store.fail_next_saves(2);
        let mut runner = SeriesRunner::new(store);
        let err = runner
            .run_series(&mut known_curve(), Algorithm::KMeans, &[], &mut ())
            .unwrap_err();

        assert_eq!(runner.state(), SeriesState::Failed);
        match err {
            BenchError::Persistence { run, .. } => {
                // The computed duration still reaches the caller.
                assert_eq!(run.nodes, 1);
                assert_eq!(run.duration_seconds, 10.0);
            }
            other => panic!("expected persistence failure, got {other}"),
        }
        assert!(runner.store().runs().is_empty());
    }

    #[test]
    fn empty_dataset_aborts_before_any_trial() {
        let dataset = crate::dataset::Dataset::new(vec![crate::dataset::Column::numeric(
            "x",
            Vec::new(),
        )])
        .unwrap();
        let mut runner = SeriesRunner::new(MemoryStore::new());
        let err = runner
            .run_dataset(&dataset, Algorithm::KMeans, Some(1), &mut ())
            .unwrap_err();

        assert!(matches!(
            err,
            BenchError::Dataset(crate::dataset::DatasetError::EmptyOrMissingDataset { .. })
        ));
        assert_eq!(runner.state(), SeriesState::Failed);
        assert!(runner.store().runs().is_empty());
    }
}
