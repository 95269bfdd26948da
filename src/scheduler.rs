// src/scheduler.rs
//! Daily trigger state machine and the run-once pipeline it drives.
//!
//! The scheduler is an explicit two-state machine driven by `tick(now)` so
//! tests never depend on wall-clock time: one eager run at boot, then one
//! run per local day at the configured trigger time. While a run is in
//! flight additional triggers are dropped, not queued.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use metrics::counter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::Aggregator;
use crate::briefing::{self, Briefing};
use crate::cache::write_atomic;
use crate::generate::DocumentGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug)]
pub struct DailyScheduler {
    state: RunState,
    trigger: NaiveTime,
    last_fired: Option<NaiveDate>,
    booted: bool,
}

impl DailyScheduler {
    pub fn new(trigger: NaiveTime) -> Self {
        Self {
            state: RunState::Idle,
            trigger,
            last_fired: None,
            booted: false,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns true when the caller should run the pipeline now. The first
    /// tick always fires (eager boot run); an eager run at/after the trigger
    /// time consumes that day's scheduled fire, one before it does not.
    pub fn tick(&mut self, now: NaiveDateTime) -> bool {
        if self.state == RunState::Running {
            return false;
        }
        let due = if !self.booted {
            true
        } else {
            now.time() >= self.trigger && self.last_fired != Some(now.date())
        };
        if !due {
            return false;
        }
        self.booted = true;
        if now.time() >= self.trigger {
            self.last_fired = Some(now.date());
        }
        self.state = RunState::Running;
        true
    }

    pub fn complete(&mut self) {
        self.state = RunState::Idle;
    }
}

/// Limits applied to one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub per_source: usize,
    pub total: usize,
    pub highlights_per_kind: usize,
    pub handoff_cap: usize,
}

/// One full run: aggregate, build the briefing, persist it, then hand off to
/// the generation collaborator.
pub struct Pipeline {
    aggregator: Aggregator,
    generator: Option<Arc<dyn DocumentGenerator>>,
    out_dir: PathBuf,
    limits: RunLimits,
}

impl Pipeline {
    pub fn new(
        aggregator: Aggregator,
        generator: Option<Arc<dyn DocumentGenerator>>,
        out_dir: impl Into<PathBuf>,
        limits: RunLimits,
    ) -> Self {
        Self {
            aggregator,
            generator,
            out_dir: out_dir.into(),
            limits,
        }
    }

    /// Errors here mean the briefing itself could not be persisted; that is
    /// fatal to this run only, and the scheduler will try again at the next
    /// trigger. A generation failure never fails the run.
    pub async fn run_once(&self) -> Result<Briefing> {
        counter!("briefing_runs_total").increment(1);

        let (scored, stats) = self
            .aggregator
            .aggregate(self.limits.per_source, self.limits.total)
            .await;
        if !stats.failed.is_empty() {
            tracing::warn!(failed = ?stats.failed, "sources contributed no items this run");
        }

        let briefing = briefing::build(&scored, &stats, self.limits.highlights_per_kind);
        let day = Local::now().format("%Y-%m-%d").to_string();

        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating output dir {}", self.out_dir.display()))?;
        let json =
            serde_json::to_string_pretty(&briefing).context("serializing briefing")?;
        write_atomic(&self.out_dir.join(format!("briefing-{day}.json")), &json)
            .context("persisting briefing json")?;
        write_atomic(
            &self.out_dir.join(format!("briefing-{day}.md")),
            &briefing::render_markdown(&briefing),
        )
        .context("persisting briefing rendering")?;
        tracing::info!(
            total = stats.total,
            relevant = stats.relevant,
            "briefing persisted"
        );

        if let Some(generator) = &self.generator {
            let items = briefing::handoff_items(&briefing, self.limits.handoff_cap);
            match generator.generate(&items).await {
                Ok(text) => {
                    let path = self.out_dir.join(format!("digest-{day}.md"));
                    match write_atomic(&path, &text) {
                        Ok(()) => tracing::info!(path = %path.display(), "digest written"),
                        // The briefing is already persisted; losing the
                        // prose document is not fatal.
                        Err(e) => tracing::warn!(error = %e, "failed to write digest"),
                    }
                }
                Err(e) => tracing::warn!(
                    error = %e,
                    generator = generator.name(),
                    "document generation failed, briefing kept"
                ),
            }
        }

        Ok(briefing)
    }
}

/// Driver loop: polls the state machine once a minute and runs the pipeline
/// inline, so at most one run is ever in flight.
pub async fn run(pipeline: Pipeline, trigger: NaiveTime) -> Result<()> {
    let mut sched = DailyScheduler::new(trigger);
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !sched.tick(Local::now().naive_local()) {
            continue;
        }
        match pipeline.run_once().await {
            Ok(b) => tracing::info!(total = b.total_count, "scheduled run complete"),
            Err(e) => {
                tracing::error!(error = %e, "pipeline run failed, no briefing for this trigger")
            }
        }
        sched.complete();
    }
}
