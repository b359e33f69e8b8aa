// One scoring cycle: reload config, poll every target, credit claims,
// persist, render.
//
// Fetches may run concurrently, but outcomes are applied to the store by this
// module alone, in config order.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::engine::allow_list;
use crate::engine::config::{GameConfig, Target};
use crate::engine::extractor::{self, OwnerToken};
use crate::engine::poller::TargetPoller;
use crate::engine::store::{ScoreStore, Scope};
use crate::error::{CycleError, TargetError};
use crate::metrics;
use crate::render::{self, Scoreboard};
use crate::worker_pool::{FetchResult, WorkerPool};

/// What happened to one target this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Scored {
        owner: OwnerToken,
        total: u64,
        target: u64,
    },
    Skipped(TargetError),
}

impl TargetOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TargetOutcome::Scored { .. } => "scored",
            TargetOutcome::Skipped(TargetError::Unreachable { .. }) => "unreachable",
            TargetOutcome::Skipped(TargetError::NoClaim) => "no_claim",
            TargetOutcome::Skipped(TargetError::NotAllowed { .. }) => "not_allowed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub outcome: TargetOutcome,
}

/// Result of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub targets: Vec<TargetReport>,
    pub scoreboard: Scoreboard,
    /// Delay before the next cycle, from this cycle's config.
    pub sleep_time: Duration,
}

impl CycleReport {
    pub fn points_awarded(&self) -> usize {
        self.targets
            .iter()
            .filter(|r| matches!(r.outcome, TargetOutcome::Scored { .. }))
            .count()
    }
}

/// Create the total scope and one scope per target if they are missing.
pub fn ensure_scopes(store: &mut ScoreStore, config: &GameConfig) {
    store.ensure_scope(&Scope::Total);
    for target in &config.targets {
        store.ensure_scope(&Scope::target(target.name.clone()));
    }
}

/// Turn one fetch result into an outcome, crediting the store on success.
pub fn evaluate(
    store: &mut ScoreStore,
    config: &GameConfig,
    target: &Target,
    fetched: FetchResult,
) -> TargetOutcome {
    let claim = fetched.and_then(|body| extractor::extract(&body)).and_then(|owner| {
        allow_list::check(&owner, &config.allow_list, config.allow_list_enabled).map(|()| owner)
    });

    let outcome = match claim {
        Ok(owner) => {
            let (total, own) = store.credit(&target.name, &owner);
            TargetOutcome::Scored {
                owner,
                total,
                target: own,
            }
        }
        Err(e) => TargetOutcome::Skipped(e),
    };

    match &outcome {
        TargetOutcome::Scored { owner, total, target: own } => {
            tracing::info!(server = %target.name, owner = %owner, total, target_score = own, "server pwned");
            metrics::POINTS_AWARDED_TOTAL
                .with_label_values(&[target.name.as_str()])
                .inc();
        }
        TargetOutcome::Skipped(e @ TargetError::Unreachable { .. }) => {
            tracing::warn!(server = %target.name, url = %target.url, "{e}, skipping it");
        }
        TargetOutcome::Skipped(TargetError::NoClaim) => {
            tracing::debug!(server = %target.name, "server might not be pwned yet");
        }
        TargetOutcome::Skipped(TargetError::NotAllowed { owner }) => {
            tracing::warn!(server = %target.name, owner = %owner, "owner not in allow-list, score was not updated");
        }
    }
    metrics::POLLS_TOTAL.with_label_values(&[outcome.label()]).inc();
    outcome
}

/// Poll, credit and persist against an already loaded config. `save` runs
/// exactly once, after every target has been evaluated. If it fails, the
/// store is rolled back to what was loaded so no credit outlives the cycle.
pub async fn score_targets(
    config: &GameConfig,
    store: &mut ScoreStore,
    poller: &TargetPoller,
    pool: &WorkerPool,
) -> Result<Vec<TargetReport>, CycleError> {
    store.load()?;
    let loaded = store.clone();
    ensure_scopes(store, config);

    let fetched = pool.fetch_all(poller, config).await;
    let reports: Vec<TargetReport> = fetched
        .into_iter()
        .map(|(target, result)| TargetReport {
            target: target.name.clone(),
            outcome: evaluate(store, config, target, result),
        })
        .collect();

    if let Err(e) = store.save() {
        *store = loaded;
        return Err(e.into());
    }
    Ok(reports)
}

/// Collaborators shared by every cycle of the process.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub config_path: PathBuf,
    pub template_path: PathBuf,
    pub poller: TargetPoller,
    pub pool: WorkerPool,
}

/// Run one full cycle. Any error aborts this cycle only.
pub async fn run_cycle(ctx: &CycleContext, store: &mut ScoreStore) -> Result<CycleReport, CycleError> {
    let started = Instant::now();
    metrics::CYCLES_TOTAL.inc();

    let result = async {
        tracing::info!(config = %ctx.config_path.display(), "loading configuration");
        let config = GameConfig::load(&ctx.config_path)?;
        metrics::TARGETS_CONFIGURED.set(config.targets.len() as i64);

        let targets = score_targets(&config, store, &ctx.poller, &ctx.pool).await?;
        let scoreboard = Scoreboard::snapshot(&config, store);
        render::publish(&ctx.template_path, &config.outfile, &scoreboard)?;

        Ok::<_, CycleError>(CycleReport {
            targets,
            scoreboard,
            sleep_time: config.sleep_time,
        })
    }
    .await;

    metrics::CYCLE_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::CYCLE_FAILURES_TOTAL.with_label_values(&[e.kind()]).inc();
    }
    result
}

/// Run cycles until `shutdown` flips to true. A dropped sender never stops
/// the loop. A failed cycle is logged and
/// the loop carries on after the last known interval. Only the inter-cycle
/// sleep is interrupted by shutdown; a cycle in progress always finishes.
pub async fn run_loop(
    ctx: &CycleContext,
    store: &mut ScoreStore,
    mut sleep_time: Duration,
    scoreboard: &watch::Sender<Scoreboard>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        match run_cycle(ctx, store).await {
            Ok(report) => {
                tracing::info!(
                    targets = report.targets.len(),
                    points = report.points_awarded(),
                    "cycle complete"
                );
                sleep_time = report.sleep_time;
                scoreboard.send_replace(report.scoreboard);
            }
            Err(e) => tracing::error!("cycle failed: {e}"),
        }

        if *shutdown.borrow() {
            break;
        }
        tracing::info!("next update in {} second(s)", sleep_time.as_secs());
        let requested = async {
            // With the sender gone no shutdown can ever be requested.
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(sleep_time) => {}
            _ = requested => {
                tracing::info!("shutdown requested, stopping");
                break;
            }
        }
    }
}
