use tokio::sync::watch;

use propane::api;
use propane::config::Config;
use propane::engine::config::GameConfig;
use propane::engine::cycle::{self, CycleContext};
use propane::engine::poller::TargetPoller;
use propane::engine::store::ScoreStore;
use propane::metrics;
use propane::render::{self, Scoreboard};
use propane::worker_pool::WorkerPool;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Config::load();

    // A broken config at startup is fatal; later cycles only skip.
    let game = GameConfig::load(&config.config_path).expect("Failed to load game configuration");

    tracing::info!(outdir = %game.outdir.display(), "game setup: copying template files");
    render::materialize(&config.template_dir, &game.outdir)
        .expect("Failed to copy template files");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (scoreboard_tx, scoreboard_rx) = watch::channel(Scoreboard::default());

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Dropping the sender would read as a shutdown request.
            tracing::error!("failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("received interrupt");
        let _ = shutdown_tx.send(true);
    });

    if let Some(addr) = config.listen {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));
        let app = api::router(scoreboard_rx, game.outdir.clone());
        let shutdown = shutdown_rx.clone();
        tracing::info!("scoreboard listening on {addr}");
        tokio::spawn(async move {
            if let Err(e) = api::serve(listener, app, shutdown).await {
                tracing::error!("HTTP server failed: {e}");
            }
        });
    }

    let ctx = CycleContext {
        config_path: config.config_path.clone(),
        template_path: config.template_path(),
        poller: TargetPoller::new(),
        pool: WorkerPool::new(config.poll_concurrency),
    };
    let mut store = ScoreStore::new(config.scores_path.clone());

    if config.once {
        if let Err(e) = cycle::run_cycle(&ctx, &mut store).await {
            tracing::error!("cycle failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    cycle::run_loop(&ctx, &mut store, game.sleep_time, &scoreboard_tx, shutdown_rx).await;
}
