mod cancel;

pub use cancel::CancellationToken;

use crate::domain::{
    CheckConfiguration, Diagnostic, EXIT_FAILED, EXIT_PASSED, FailureKind, FixtureFailure,
    FixtureIdentity, FixtureStatus, FixtureVerdict, HarnessError, HarnessResult,
    OracleExpectation, SourceFixture,
};
use crate::modules::checker::{CheckerAdapter, CheckerRegistry};
use crate::modules::comparator::OracleComparator;
use crate::modules::store::{FixtureStore, ProjectFilter, StoreError};
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// What happens to a fixture whose oracle file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OraclePolicy {
    /// The fixture fails with `no_oracle`.
    #[default]
    Required,
    /// The fixture is skipped.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub jobs: usize,
    pub oracle_policy: OraclePolicy,
    /// Fail fixtures whose diagnostics match the oracle in a different order.
    pub strict_order: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            oracle_policy: OraclePolicy::default(),
            strict_order: false,
        }
    }
}

pub fn default_jobs() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Per-fixture lifecycle. Every fixture ends in `Passed`, `Failed` or `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Pending,
    Loaded,
    Checked,
    Compared,
    Passed,
    Failed,
    Skipped,
}

impl Display for FixtureState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Loaded => "loaded",
            Self::Checked => "checked",
            Self::Compared => "compared",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Verdicts of one batch, sorted by fixture identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub checker: String,
    pub verdicts: Vec<FixtureVerdict>,
    /// Set when the batch stopped early; fixtures never started are absent.
    pub cancelled: bool,
}

impl RunOutcome {
    pub fn failed_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|verdict| verdict.is_failed())
            .count()
    }

    /// Passed or skipped fixtures only, and the batch ran to completion.
    pub fn all_passed(&self) -> bool {
        !self.cancelled && self.failed_count() == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            EXIT_PASSED
        } else {
            EXIT_FAILED
        }
    }
}

/// Drives resolve, check and compare for batches of fixtures.
///
/// Fixture-level problems end up in that fixture's verdict; only conditions
/// that prevent the batch from starting are returned as errors.
#[derive(Debug)]
pub struct HarnessRunner {
    store: FixtureStore,
    registry: CheckerRegistry,
    comparator: OracleComparator,
    options: RunOptions,
    cancellation: CancellationToken,
    span: tracing::Span,
}

impl HarnessRunner {
    pub fn new(store: FixtureStore, registry: CheckerRegistry) -> Self {
        Self {
            store,
            registry,
            comparator: OracleComparator::default(),
            options: RunOptions::default(),
            cancellation: CancellationToken::new(),
            span: tracing::Span::none(),
        }
    }

    pub fn with_comparator(mut self, comparator: OracleComparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Parent span for every event the runner emits.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Runs every listed fixture under `config`.
    ///
    /// Identities are pulled lazily by the workers, so a walk over the store is
    /// never materialized up front. Repeated identities are run once.
    pub fn run_all<I>(
        &self,
        identities: I,
        config: &CheckConfiguration,
    ) -> HarnessResult<RunOutcome>
    where
        I: IntoIterator<Item = FixtureIdentity>,
        I::IntoIter: Send,
    {
        let adapter = self.registry.select(config)?;
        let jobs = self.options.jobs.max(1);
        let batch_span = tracing::info_span!(
            parent: &self.span,
            "harness_run",
            checker = %adapter.name(),
            jobs
        );
        let _entered = batch_span.enter();
        tracing::info!(root = %self.store.root().display(), "starting batch");

        let queue = Mutex::new(FixtureQueue {
            identities: identities.into_iter(),
            seen: HashSet::new(),
        });

        let worker_results = thread::scope(|scope| {
            let handles = (0..jobs)
                .map(|worker| {
                    let queue = &queue;
                    let adapter = &adapter;
                    let parent = batch_span.clone();
                    scope.spawn(move || {
                        let worker_span = tracing::debug_span!(parent: &parent, "worker", worker);
                        let _entered = worker_span.enter();
                        self.work(queue, adapter, config)
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        });

        let mut verdicts = Vec::new();
        let mut cancelled = false;
        for result in worker_results {
            match result {
                Ok(report) => {
                    cancelled |= report.stopped_early;
                    verdicts.extend(report.verdicts);
                }
                // Fixture work is unwind-isolated, so only a bug in the loop itself lands here.
                Err(payload) => {
                    return Err(HarnessError::internal(
                        "INTERNAL.WORKER",
                        format!("worker thread panicked: {}", panic_message(payload.as_ref())),
                    ));
                }
            }
        }
        verdicts.sort_by(|left, right| left.identity.cmp(&right.identity));

        let outcome = RunOutcome {
            checker: adapter.name().to_string(),
            verdicts,
            cancelled,
        };
        tracing::info!(
            fixtures = outcome.verdicts.len(),
            failed = outcome.failed_count(),
            cancelled = outcome.cancelled,
            "batch finished"
        );
        Ok(outcome)
    }

    /// Runs every fixture the store lists, optionally narrowed to matching projects.
    pub fn run_listed(
        &self,
        filter: Option<&ProjectFilter>,
        config: &CheckConfiguration,
    ) -> HarnessResult<RunOutcome> {
        self.run_all(self.store.list_fixtures(filter), config)
    }

    fn work<I>(
        &self,
        queue: &Mutex<FixtureQueue<I>>,
        adapter: &CheckerAdapter,
        config: &CheckConfiguration,
    ) -> WorkerReport
    where
        I: Iterator<Item = FixtureIdentity>,
    {
        let mut report = WorkerReport::default();
        loop {
            if self.cancellation.is_cancelled() {
                report.stopped_early = true;
                break;
            }
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_unseen();
            let Some(identity) = next else {
                break;
            };
            report
                .verdicts
                .push(self.run_fixture(&identity, adapter, config));
        }
        report
    }

    fn run_fixture(
        &self,
        identity: &FixtureIdentity,
        adapter: &CheckerAdapter,
        config: &CheckConfiguration,
    ) -> FixtureVerdict {
        transition(identity, FixtureState::Pending);
        let verdict = match self.load(identity) {
            Loaded::Ready(source, oracle) => {
                transition(identity, FixtureState::Loaded);
                match invoke_checker(adapter, config, &source) {
                    Ok(diagnostics) => {
                        transition(identity, FixtureState::Checked);
                        let comparison = self.comparator.compare(identity, &diagnostics, &oracle);
                        transition(identity, FixtureState::Compared);
                        let passed = comparison.entries_match()
                            && (comparison.ordered || !self.options.strict_order);
                        if comparison.entries_match() && !comparison.ordered {
                            tracing::info!(
                                fixture = %identity,
                                position = comparison.first_order_mismatch,
                                strict = self.options.strict_order,
                                "diagnostic order differs from oracle"
                            );
                        }
                        FixtureVerdict::compared(comparison, passed)
                    }
                    Err(failure) => FixtureVerdict::failed(identity.clone(), failure),
                }
            }
            Loaded::Skip => FixtureVerdict::skipped(identity.clone()),
            Loaded::Fail(failure) => FixtureVerdict::failed(identity.clone(), failure),
        };

        if let Some(failure) = &verdict.failure {
            tracing::warn!(
                fixture = %identity,
                kind = failure.kind.as_str(),
                "{}",
                failure.message
            );
        }
        transition(identity, terminal_state(&verdict));
        verdict
    }

    fn load(&self, identity: &FixtureIdentity) -> Loaded {
        let source = match self.store.resolve(identity) {
            Ok(source) => source,
            Err(error) => return Loaded::Fail(store_failure(&error)),
        };
        match self.store.load_oracle(identity) {
            Ok(oracle) => Loaded::Ready(source, oracle),
            Err(StoreError::NoOracle { .. })
                if self.options.oracle_policy == OraclePolicy::Optional =>
            {
                tracing::debug!(fixture = %identity, "no oracle recorded, skipping");
                Loaded::Skip
            }
            Err(error) => Loaded::Fail(store_failure(&error)),
        }
    }
}

enum Loaded {
    Ready(SourceFixture, OracleExpectation),
    Skip,
    Fail(FixtureFailure),
}

struct FixtureQueue<I> {
    identities: I,
    seen: HashSet<FixtureIdentity>,
}

impl<I> FixtureQueue<I>
where
    I: Iterator<Item = FixtureIdentity>,
{
    fn next_unseen(&mut self) -> Option<FixtureIdentity> {
        for identity in self.identities.by_ref() {
            if self.seen.insert(identity.clone()) {
                return Some(identity);
            }
            tracing::debug!(fixture = %identity, "duplicate identity ignored");
        }
        None
    }
}

#[derive(Default)]
struct WorkerReport {
    verdicts: Vec<FixtureVerdict>,
    stopped_early: bool,
}

fn invoke_checker(
    adapter: &CheckerAdapter,
    config: &CheckConfiguration,
    source: &SourceFixture,
) -> Result<Vec<Diagnostic>, FixtureFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| adapter.run(config, source))) {
        Ok(Ok(diagnostics)) => Ok(diagnostics),
        Ok(Err(failure)) => Err(FixtureFailure::new(
            FailureKind::CheckerFailure,
            failure.to_string(),
        )),
        Err(payload) => Err(FixtureFailure::new(
            FailureKind::CheckerFailure,
            format!(
                "checker '{}' panicked on '{}': {}",
                adapter.name(),
                source.identity,
                panic_message(payload.as_ref())
            ),
        )),
    }
}

fn store_failure(error: &StoreError) -> FixtureFailure {
    let kind = match error {
        StoreError::NotFound { .. } | StoreError::InvalidIdentity { .. } => FailureKind::NotFound,
        StoreError::NoOracle { .. } => FailureKind::NoOracle,
        StoreError::ReadFixture { .. }
        | StoreError::ReadOracle { .. }
        | StoreError::ParseOracle { .. }
        | StoreError::ReadDirectory { .. } => FailureKind::ReadFailure,
    };
    FixtureFailure::new(kind, error.to_string())
}

fn terminal_state(verdict: &FixtureVerdict) -> FixtureState {
    match verdict.status {
        FixtureStatus::Passed => FixtureState::Passed,
        FixtureStatus::Failed => FixtureState::Failed,
        FixtureStatus::Skipped => FixtureState::Skipped,
    }
}

fn transition(identity: &FixtureIdentity, state: FixtureState) {
    tracing::debug!(fixture = %identity, state = %state, "fixture state");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
