/// Statistics load/reload cycle.
///
/// A refresh turns the current [`FilterState`] into query parameters, issues
/// one statistics request and hands the result to a [`Renderer`]. Two
/// guarantees hold for every refresh:
///
/// - **No stale overwrite.** Each refresh takes a ticket from a monotonically
///   increasing [`RefreshSequence`]. Its outcome (success or failure) reaches
///   the renderer only if no newer refresh was issued in the meantime;
///   otherwise it is reported as [`RefreshOutcome::Superseded`] and dropped.
/// - **Indicator always released.** The loading indicator is shown while any
///   request is in flight and hidden by a drop guard on every exit path,
///   once the last overlapping request has finished.
///
/// Failures never clear what is already on screen: the renderer is told about
/// the failure and nothing else.
pub mod sequence;

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::api::{ApiError, DashboardApi, StatisticsResult};
use crate::diagnostics::{EventKind, EventOutcome, RefreshEvent, RefreshLog};
use crate::filter::FilterState;

pub use sequence::{RefreshSequence, RefreshTicket};

// ---------------------------------------------------------------------------
// Presentation capabilities
// ---------------------------------------------------------------------------

/// Where refresh results are displayed.
///
/// Implemented once per target (terminal, JSON, test recorder). The pipeline
/// never formats anything itself.
pub trait Renderer {
    /// Show headline metrics for a successful refresh.
    fn render_metrics(&self, result: &StatisticsResult);

    /// Show charts for a successful refresh.
    fn render_charts(&self, result: &StatisticsResult);

    /// Tell the user a refresh failed. Previously rendered output stays.
    fn report_failure(&self, message: &str);
}

/// A busy indicator shown while a request is in flight.
pub trait LoadingIndicator {
    fn show(&self);
    fn hide(&self);
}

/// Indicator that displays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl LoadingIndicator for NoIndicator {
    fn show(&self) {}
    fn hide(&self) {}
}

/// Number of requests currently holding a [`LoadingGuard`].
///
/// The indicator is shared by overlapping refreshes: it is shown when the
/// first request starts and hidden when the last one ends.
#[derive(Debug, Default)]
pub struct InFlight {
    count: Mutex<usize>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks one request in flight; shows the indicator on the first and hides
/// it when the last guard is dropped, including during unwinding.
pub struct LoadingGuard<'a, L: LoadingIndicator + ?Sized> {
    indicator: &'a L,
    in_flight: &'a InFlight,
}

impl<'a, L: LoadingIndicator + ?Sized> LoadingGuard<'a, L> {
    pub fn new(indicator: &'a L, in_flight: &'a InFlight) -> Self {
        // show/hide run while the count is locked.
        let mut count = in_flight.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count == 0 {
            indicator.show();
        }
        *count += 1;
        Self {
            indicator,
            in_flight,
        }
    }
}

impl<L: LoadingIndicator + ?Sized> Drop for LoadingGuard<'_, L> {
    fn drop(&mut self) {
        let mut count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.indicator.hide();
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a single refresh ended.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The result was rendered.
    Applied(StatisticsResult),
    /// The request failed and the failure was reported.
    Failed(ApiError),
    /// A newer refresh was issued first; nothing was rendered or reported.
    Superseded { sequence: u64 },
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn event_outcome(&self) -> EventOutcome {
        match self {
            Self::Applied(_) => EventOutcome::Applied,
            Self::Failed(_) => EventOutcome::Failed,
            Self::Superseded { .. } => EventOutcome::Superseded,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Fetches statistics for a filter selection and applies them in order.
///
/// Safe to share between threads: concurrent refreshes are allowed and the
/// newest one always wins.
#[derive(Debug)]
pub struct StatisticsPipeline<A> {
    api: A,
    sequence: RefreshSequence,
    apply_lock: Mutex<()>,
    in_flight: InFlight,
    log: RefreshLog,
}

impl<A: DashboardApi> StatisticsPipeline<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            sequence: RefreshSequence::new(),
            apply_lock: Mutex::new(()),
            in_flight: InFlight::new(),
            log: RefreshLog::disabled(),
        }
    }

    /// Record every refresh in `log`.
    pub fn with_log(mut self, log: RefreshLog) -> Self {
        self.log = log;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn log(&self) -> &RefreshLog {
        &self.log
    }

    /// Refreshes currently waiting on the backend.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Sequence number of the most recently issued refresh (0 before any).
    pub fn latest_sequence(&self) -> u64 {
        self.sequence.latest()
    }

    /// Issue one statistics request for `state` and return the parsed result.
    ///
    /// Does not touch the sequence, the renderer or the log.
    pub fn fetch(&self, state: &FilterState) -> Result<StatisticsResult, ApiError> {
        self.api.fetch_statistics(&state.to_query_params())
    }

    /// Run a full refresh: fetch, then render or report, unless superseded.
    pub fn refresh<R, L>(&self, state: &FilterState, renderer: &R, indicator: &L) -> RefreshOutcome
    where
        R: Renderer + ?Sized,
        L: LoadingIndicator + ?Sized,
    {
        let ticket = self.sequence.issue();
        let params = state.to_query_params();
        let _loading = LoadingGuard::new(indicator, &self.in_flight);

        let started = Instant::now();
        let result = self.api.fetch_statistics(&params);
        let latency_ms = started.elapsed().as_millis() as u64;

        // Check-and-apply is atomic so an older response can never land
        // after a newer one has been rendered.
        let _applying = self.apply_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let outcome = if !self.sequence.is_current(ticket) {
            RefreshOutcome::Superseded {
                sequence: ticket.value(),
            }
        } else {
            match result {
                Ok(stats) => {
                    renderer.render_metrics(&stats);
                    renderer.render_charts(&stats);
                    RefreshOutcome::Applied(stats)
                }
                Err(err) => {
                    eprintln!("[spendboard] statistics refresh #{} failed: {err}", ticket.value());
                    renderer.report_failure(&err.user_message());
                    RefreshOutcome::Failed(err)
                }
            }
        };

        let mut event = RefreshEvent::now(EventKind::Statistics, outcome.event_outcome(), latency_ms)
            .with_sequence(ticket.value());
        if let Ok(params) = serde_json::to_value(&params) {
            event = event.with_params(params);
        }
        if let RefreshOutcome::Failed(err) = &outcome {
            event = event.with_message(err.to_string());
        }
        self.log.record(&event);

        outcome
    }
}
