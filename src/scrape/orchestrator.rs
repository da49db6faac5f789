//! Per-source scrape machines and the concurrent fan-out over all sources.
//!
//! Each source runs through an explicit state machine:
//!
//! ```text
//! Pending -> Fetching -> Parsing -> Normalizing -> Succeeded
//!               ^            |           |
//!               +-- retry ---+           +--> Failed (terminal)
//! ```
//!
//! Transport and parse failures loop back to `Fetching` with exponential
//! backoff until the attempt budget runs out; validation failures are
//! terminal immediately, because refetching the same wrong page cannot fix
//! a date mismatch. One machine failing never touches the others: the
//! fan-out collects successes and failures side by side.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::ScrapeSettings;
use crate::errors::FailureReason;
use crate::models::{CanonicalResult, Lottery, SourceFailure};
use crate::proxy::{Egress, ProxyRotator};
use crate::scrape::fetch::Fetch;
use crate::scrape::normalize::normalize;
use crate::scrape::strategy::{extract_first_plausible, CompiledSource};
use crate::utils::truncate_for_log;

/// States of one per-source scrape machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MachineState {
    Pending,
    Fetching,
    Parsing,
    Normalizing,
    Succeeded,
    Failed,
}

impl MachineState {
    fn name(self) -> &'static str {
        match self {
            MachineState::Pending => "pending",
            MachineState::Fetching => "fetching",
            MachineState::Parsing => "parsing",
            MachineState::Normalizing => "normalizing",
            MachineState::Succeeded => "succeeded",
            MachineState::Failed => "failed",
        }
    }
}

/// Drives one source from `Pending` to `Succeeded` or `Failed`.
pub struct ScrapeMachine<'a, F> {
    source: &'a CompiledSource,
    fetcher: &'a F,
    rotator: &'a Mutex<ProxyRotator>,
    settings: &'a ScrapeSettings,
    date: NaiveDate,
    state: MachineState,
}

impl<'a, F: Fetch> ScrapeMachine<'a, F> {
    pub fn new(
        source: &'a CompiledSource,
        fetcher: &'a F,
        rotator: &'a Mutex<ProxyRotator>,
        settings: &'a ScrapeSettings,
        date: NaiveDate,
    ) -> Self {
        Self {
            source,
            fetcher,
            rotator,
            settings,
            date,
            state: MachineState::Pending,
        }
    }

    fn lottery(&self) -> Lottery {
        self.source.config.lottery_id
    }

    fn enter(&mut self, next: MachineState) {
        debug!(
            lottery = self.lottery().id_str(),
            from = self.state.name(),
            to = next.name(),
            "scrape state"
        );
        self.state = next;
    }

    fn fail(&mut self, reason: FailureReason, detail: String) -> SourceFailure {
        self.enter(MachineState::Failed);
        warn!(
            lottery = self.lottery().id_str(),
            reason = %reason,
            detail = detail.as_str(),
            "source failed"
        );
        SourceFailure {
            lottery_id: self.lottery(),
            reason,
            detail,
        }
    }

    async fn pick_egress(&self) -> Egress {
        if self.source.config.proxy_enabled {
            self.rotator.lock().await.next()
        } else {
            Egress::Direct
        }
    }

    /// Run the machine to completion.
    #[instrument(level = "info", skip_all, fields(lottery = %self.source.config.lottery_id.id_str()))]
    pub async fn run(mut self) -> Result<CanonicalResult, SourceFailure> {
        let max_attempts = self.settings.max_retries + 1;
        let mut attempt = 1u32;

        loop {
            self.enter(MachineState::Fetching);
            let egress = self.pick_egress().await;
            let label = egress.label();

            let via_proxy = matches!(egress, Egress::Proxy(_));

            let doc = match self.fetcher.fetch(&self.source.config, &egress).await {
                Ok(doc) => {
                    if via_proxy {
                        self.rotator.lock().await.report_success(&label);
                    }
                    doc
                }
                Err(err) => {
                    if via_proxy {
                        self.rotator.lock().await.report_failure(&label);
                    }
                    warn!(
                        lottery = self.lottery().id_str(),
                        egress = label.as_str(),
                        attempt,
                        error = %err,
                        "fetch failed"
                    );
                    if attempt >= max_attempts {
                        return Err(self.fail(FailureReason::Transport, err.to_string()));
                    }
                    sleep(backoff_delay(self.settings, attempt)).await;
                    attempt += 1;
                    continue;
                }
            };

            self.enter(MachineState::Parsing);
            let digit_len = self.lottery().digit_len();
            let Some((draw, kind)) =
                extract_first_plausible(&self.source.strategies, &doc, digit_len)
            else {
                warn!(
                    lottery = self.lottery().id_str(),
                    attempt,
                    body_preview = %truncate_for_log(&doc.body, 200),
                    "no strategy produced a plausible draw"
                );
                if attempt >= max_attempts {
                    return Err(self.fail(
                        FailureReason::Parse,
                        "no strategy produced a plausible draw".to_string(),
                    ));
                }
                sleep(backoff_delay(self.settings, attempt)).await;
                attempt += 1;
                continue;
            };

            self.enter(MachineState::Normalizing);
            match normalize(draw, self.lottery(), self.date, &doc.url, doc.fetched_at) {
                Ok(result) => {
                    self.enter(MachineState::Succeeded);
                    info!(
                        lottery = self.lottery().id_str(),
                        date = %self.date,
                        strategy = kind,
                        first = result.first().unwrap_or(""),
                        positions = result.positions.len(),
                        "result scraped"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    return Err(self.fail(FailureReason::Validation, err.to_string()));
                }
            }
        }
    }
}

/// Exponential backoff with proportional jitter: base doubles per attempt,
/// capped at ten times the base, plus up to a quarter of random spread.
fn backoff_delay(settings: &ScrapeSettings, attempt: u32) -> Duration {
    let base = settings.backoff_base_ms.max(1);
    let exp = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = exp.min(base.saturating_mul(10));
    let jitter = rand::rng().random_range(0..=capped / 4);
    Duration::from_millis(capped + jitter)
}

/// Scrape every compiled source for `date`, at most `max_in_flight` at a
/// time. Failures are collected, never propagated: one broken source must
/// not cost the others their run.
#[instrument(level = "info", skip_all, fields(date = %date, sources = sources.len()))]
pub async fn run_all<F: Fetch>(
    sources: &[CompiledSource],
    fetcher: &F,
    rotator: &Mutex<ProxyRotator>,
    settings: &ScrapeSettings,
    date: NaiveDate,
) -> (BTreeMap<Lottery, CanonicalResult>, Vec<SourceFailure>) {
    let mut machines = stream::iter(
        sources
            .iter()
            .map(|source| ScrapeMachine::new(source, fetcher, rotator, settings, date).run()),
    )
    .buffer_unordered(settings.max_in_flight.max(1));

    let mut results = BTreeMap::new();
    let mut failures = Vec::new();
    while let Some(outcome) = machines.next().await {
        match outcome {
            Ok(result) => {
                results.insert(result.lottery_id, result);
            }
            Err(failure) => {
                failures.push(failure);
            }
        }
    }

    info!(
        succeeded = results.len(),
        failed = failures.len(),
        "scrape pass finished"
    );
    (results, failures)
}
