//! Concurrent extraction orchestrator.

use crate::archive::ArchiveSource;
use crate::error::ExtractError;
use crate::gate::ConcurrencyGate;
use crate::member::extract_member;
use crate::progress::{NoopMonitor, ProgressMonitor};
use crate::sink::OutputSink;
use crate::types::{ExtractOptions, ExtractReport, ExtractStats, Member, MemberError, Progress};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extracts every member of an archive into an output sink, one blocking task
/// per member, with at most `concurrency` members in flight.
///
/// Scheduling follows archive order. Once any member has failed no further
/// member is admitted, but members already running are allowed to finish.
/// Cancelling the token has the same effect: it stops admission and does not
/// interrupt members that are already being written.
///
/// # Example
///
/// ```rust,no_run
/// use punzip::{DirSink, Extractor, ZipSource};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), punzip::ExtractError> {
/// let source = Arc::new(ZipSource::open("archive.zip")?);
/// let stats = Extractor::new()
///     .with_concurrency(4)
///     .with_monitor(|p: punzip::Progress| println!("{}/{}", p.completed, p.total))
///     .extract(source, Arc::new(DirSink::new("out")))
///     .await?;
/// println!("{} members in {:?}", stats.completed, stats.duration);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Extractor {
    concurrency: usize,
    monitor: Arc<dyn ProgressMonitor>,
    cancel: CancellationToken,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::from_options(&ExtractOptions::default())
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("concurrency", &self.concurrency)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// Extractor with one slot per CPU, no monitor and a token nobody cancels.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &ExtractOptions) -> Self {
        Self {
            concurrency: options.concurrency,
            monitor: Arc::new(NoopMonitor),
            cancel: CancellationToken::new(),
        }
    }

    /// Current concurrency limit (0 = unlimited).
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Set the concurrency limit. 0 means no limit.
    pub fn set_concurrency(&mut self, n: usize) {
        self.concurrency = n;
    }

    /// Builder form of [`set_concurrency`](Self::set_concurrency).
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.set_concurrency(n);
        self
    }

    /// Install a progress monitor.
    pub fn with_monitor(mut self, monitor: impl ProgressMonitor + 'static) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Use `token` to stop admitting new members.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token observed while waiting for a slot.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Extract every member and collapse the outcome to one result.
    ///
    /// When several members fail, the error of the member with the lowest
    /// archive index is returned. A cancelled run that recorded no member
    /// error returns [`ExtractError::Cancelled`].
    pub async fn extract(
        &self,
        source: Arc<dyn ArchiveSource>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<ExtractStats, ExtractError> {
        self.extract_report(source, sink).await.into_result()
    }

    /// Extract every member and report all recorded failures.
    pub async fn extract_report(
        &self,
        source: Arc<dyn ArchiveSource>,
        sink: Arc<dyn OutputSink>,
    ) -> ExtractReport {
        let started = Instant::now();
        let total = source.members().len();
        let gate = ConcurrencyGate::new(self.concurrency);
        let run = Arc::new(Run::new(total, Arc::clone(&self.monitor)));

        info!(total, concurrency = self.concurrency, "starting extraction");
        run.announce();

        let mut tasks = JoinSet::new();
        let mut cancelled = false;
        for member in source.members() {
            let permit = match gate.acquire(&self.cancel).await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(next = %member.name, "extraction cancelled, no more members admitted");
                    cancelled = true;
                    break;
                }
            };
            if run.has_failed() {
                drop(permit);
                debug!(next = %member.name, "a member failed, no more members admitted");
                break;
            }

            let member = member.clone();
            let source = Arc::clone(&source);
            let sink = Arc::clone(&sink);
            let run = Arc::clone(&run);
            tasks.spawn_blocking(move || {
                debug!(index = member.index, name = %member.name, "extracting");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    extract_member(source.as_ref(), sink.as_ref(), &member)
                }))
                .unwrap_or_else(|payload| {
                    Err(ExtractError::TaskFailed {
                        name: member.name.clone(),
                        reason: panic_message(payload.as_ref()),
                    })
                });
                run.finish_member(&member, outcome);
                drop(permit);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // panics are caught inside the task, so this is runtime shutdown
                warn!(error = %e, "extraction task did not complete");
            }
        }

        let (completed, bytes_written, errors) = run.take();
        let stats = ExtractStats {
            total,
            completed,
            failed: errors.len(),
            bytes_written,
            duration: started.elapsed(),
            cancelled,
        };
        info!(
            completed = stats.completed,
            failed = stats.failed,
            bytes = stats.bytes_written,
            elapsed_ms = stats.duration.as_millis() as u64,
            "extraction finished"
        );
        ExtractReport { stats, errors }
    }
}

/// State shared by every task of one run. Everything lives behind a single
/// lock so the monitor always sees `completed` and the error list agree.
struct Run {
    total: usize,
    monitor: Arc<dyn ProgressMonitor>,
    state: Mutex<RunState>,
}

#[derive(Default)]
struct RunState {
    completed: usize,
    bytes_written: u64,
    errors: Vec<MemberError>,
}

impl Run {
    fn new(total: usize, monitor: Arc<dyn ProgressMonitor>) -> Self {
        Self {
            total,
            monitor,
            state: Mutex::new(RunState::default()),
        }
    }

    fn announce(&self) {
        let state = self.state.lock();
        self.monitor.notify(Progress {
            completed: state.completed,
            total: self.total,
        });
    }

    fn has_failed(&self) -> bool {
        !self.state.lock().errors.is_empty()
    }

    /// Record the outcome, then notify. A monitor that panics still leaves
    /// the member's error recorded.
    fn finish_member(&self, member: &Member, outcome: Result<u64, ExtractError>) {
        let mut state = self.state.lock();
        state.completed += 1;
        match outcome {
            Ok(written) => {
                debug!(index = member.index, name = %member.name, written, "member done");
                state.bytes_written += written;
            }
            Err(error) => {
                warn!(index = member.index, name = %member.name, %error, "member failed");
                state.errors.push(MemberError {
                    index: member.index,
                    name: member.name.clone(),
                    error,
                });
            }
        }
        self.monitor.notify(Progress {
            completed: state.completed,
            total: self.total,
        });
    }

    fn take(&self) -> (usize, u64, Vec<MemberError>) {
        let mut state = self.state.lock();
        (
            state.completed,
            state.bytes_written,
            std::mem::take(&mut state.errors),
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
