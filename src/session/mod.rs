/// Dashboard session: one controller per running dashboard.
///
/// Owns everything that lives for the length of a session: the available
/// filter options, the current [`FilterState`], the statistics pipeline and
/// the renderer. Nothing is shared at module level, so independent sessions
/// can coexist (one per test, for instance).
///
/// Flow: [`DashboardSession::start`] loads options and runs the first
/// refresh; every [`FilterCommand`] then mutates the state and refreshes
/// again.
pub mod command;

use std::io::Write;
use std::time::Instant;

use crate::api::{ApiError, DashboardApi};
use crate::diagnostics::{EventKind, EventOutcome, RefreshEvent};
use crate::filter::{FilterOptions, FilterState};
use crate::pipeline::{LoadingIndicator, RefreshOutcome, Renderer, StatisticsPipeline};

pub use command::{CommandError, FilterCommand};

pub struct DashboardSession<A, R, L> {
    pipeline: StatisticsPipeline<A>,
    renderer: R,
    indicator: L,
    options: Option<FilterOptions>,
    state: FilterState,
}

impl<A, R, L> DashboardSession<A, R, L>
where
    A: DashboardApi,
    R: Renderer,
    L: LoadingIndicator,
{
    pub fn new(pipeline: StatisticsPipeline<A>, renderer: R, indicator: L) -> Self {
        Self {
            pipeline,
            renderer,
            indicator,
            options: None,
            state: FilterState::new(),
        }
    }

    /// Load filter options, then run the first refresh.
    ///
    /// An options failure is logged and the session carries on with empty
    /// filters; statistics are still requested.
    pub fn start(&mut self) -> RefreshOutcome {
        if let Err(err) = self.reload_options() {
            eprintln!("[spendboard] failed to load filter options: {err}");
        }
        self.refresh()
    }

    /// Fetch options and adopt them, replacing any previous set.
    ///
    /// On failure the previous options and selection are left as they were.
    pub fn reload_options(&mut self) -> Result<&FilterOptions, ApiError> {
        let started = Instant::now();
        let result = self.pipeline.api().fetch_options();
        let latency_ms = started.elapsed().as_millis() as u64;

        let event = match &result {
            Ok(_) => RefreshEvent::now(EventKind::Options, EventOutcome::Applied, latency_ms),
            Err(err) => RefreshEvent::now(EventKind::Options, EventOutcome::Failed, latency_ms)
                .with_message(err.to_string()),
        };
        self.pipeline.log().record(&event);

        let options = result?;
        self.state.initialize_from_options(&options);
        for field in self.state.violations(&options) {
            eprintln!(
                "[spendboard] selected {field} '{}' is no longer offered by the server",
                self.state.get(field).unwrap_or_default()
            );
        }
        Ok(self.options.insert(options))
    }

    /// Re-run the statistics pipeline with the current selection.
    pub fn refresh(&mut self) -> RefreshOutcome {
        self.pipeline
            .refresh(&self.state, &self.renderer, &self.indicator)
    }

    /// Apply a user action and refresh.
    pub fn apply(&mut self, command: FilterCommand) -> RefreshOutcome {
        match command {
            FilterCommand::Set { field, value } => self.state.update_field(field, &value),
            FilterCommand::Unset(field) => self.state.update_field(field, ""),
            FilterCommand::Targeting(values) => self.state.set_targeting(values),
            FilterCommand::ClearTargeting => self.state.clear_targeting(),
            FilterCommand::Reset => self.state.reset_filters(),
            FilterCommand::Reload => {}
            FilterCommand::ReloadOptions => {
                if let Err(err) = self.reload_options() {
                    eprintln!("[spendboard] failed to reload filter options: {err}");
                }
            }
        }
        self.refresh()
    }

    /// Download the full data export into `out`.
    pub fn export(&self, out: &mut dyn Write) -> Result<u64, ApiError> {
        let started = Instant::now();
        let result = self.pipeline.api().download_export(out);
        let latency_ms = started.elapsed().as_millis() as u64;

        let event = match &result {
            Ok(_) => RefreshEvent::now(EventKind::Export, EventOutcome::Applied, latency_ms),
            Err(err) => RefreshEvent::now(EventKind::Export, EventOutcome::Failed, latency_ms)
                .with_message(err.to_string()),
        };
        self.pipeline.log().record(&event);
        result
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    pub fn options(&self) -> Option<&FilterOptions> {
        self.options.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn pipeline(&self) -> &StatisticsPipeline<A> {
        &self.pipeline
    }
}
