use std::sync::Arc;

use hbus_core::ConversionRegistry;
use hbus_supervisor::ProcessSupervisor;
use hbus_webd::config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = config::load_config().unwrap_or_else(|err| {
        eprintln!("failed to load config, using defaults: {err}");
        config::load_config_from_str("").expect("empty config always parses")
    });

    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(config.log_level.clone())).init();

    let process = ProcessSupervisor::new();
    let conversions = Arc::new(ConversionRegistry::with_standard_conversions());
    let datalog = Arc::new(
        hbus_datalog::SqliteBackend::open(std::path::Path::new(&config.datalog.sqlite_path))
            .expect("failed to open datalog sqlite database"),
    );
    let state = hbus_webd::AppState::new(process.clone(), conversions, config.server.index_page.clone(), datalog);

    for timer_config in &config.timers {
        let schedule = hbus_timer::Every::new(timer_config.every)
            .aligned(timer_config.align)
            .with_offset(std::time::Duration::from_secs_f64(timer_config.offset_secs))
            .with_jitter(std::time::Duration::from_secs_f64(timer_config.random_secs), timer_config.random_fn);
        let timer = hbus_timer::Timer::new(timer_config.name.clone(), schedule);
        process.register_timer(timer).await;
    }

    process.start_all().await.expect("process startup failed");
    info!("hbus-webd started");

    let router = hbus_webd::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await.expect("failed to bind");
    info!(addr = %config.server.bind_addr, "hbus-webd listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal(process.clone())).await.expect("server error");

    let exit_code = process.wait_for_stop().await;
    info!(exit_code, "hbus-webd shut down");
    std::process::exit(exit_code);
}

/// Waits for SIGINT, SIGTERM, or SIGHUP, then drives the process
/// supervisor's shutdown sequence so interfaces and timers tear down
/// before the HTTP listener closes (spec.md §4.G/§6).
async fn shutdown_signal(process: Arc<ProcessSupervisor>) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(unix)]
    let hangup = async {
        signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect("failed to install SIGHUP handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
        _ = hangup => info!("received SIGHUP, shutting down"),
    }

    process.shutdown_all().await;
}
