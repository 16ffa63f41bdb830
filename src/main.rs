//! idlewarden - session inactivity monitor.
//!
//! Runs the monitor next to the dashboard and bridges it to the page over
//! HTTP and WebSocket.

use idlewarden::monitor::{ActivityHub, InactivityMonitor};
use idlewarden::server::{self, AppState, Broadcaster, WsNavigator, WsWarningSurface};
use idlewarden::session::{HttpSessionBackend, SessionBackend};
use idlewarden::Config;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("idlewarden=info")),
        )
        .init();

    let config = Config::load().map_err(idlewarden::Error::from)?;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              idlewarden - Session Monitor                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let backend: Arc<dyn SessionBackend> = Arc::new(
        HttpSessionBackend::from_config(&config.monitor).map_err(idlewarden::Error::from)?,
    );
    let broadcaster = Broadcaster::new(config.server.broadcast_capacity);

    // One monitor per page session; a page load after expiry gets a new one
    let new_monitor = {
        let monitor_config = config.monitor.clone();
        let broadcaster = broadcaster.clone();
        move || {
            InactivityMonitor::new(
                monitor_config.clone(),
                Arc::clone(&backend),
                Arc::new(WsWarningSurface::new(broadcaster.clone())),
                Arc::new(WsNavigator::new(broadcaster.clone())),
                ActivityHub::default(),
            )
        }
    };
    let monitor = new_monitor();

    // Shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        println!("\n🛑 Shutdown signal received...");
        let _ = shutdown_tx.send(true);
    })?;

    monitor.start();
    println!(
        "   ✓ Monitoring idle time (warning at {}s, logout at {}s)",
        config.monitor.timeout_secs - config.monitor.warning_secs,
        config.monitor.timeout_secs
    );

    let state = Arc::new(AppState::new(broadcaster, monitor).with_factory(new_monitor));
    let mut server_shutdown = shutdown_rx.clone();
    let mut server_task = tokio::spawn(server::run_server(
        config.server.port,
        Arc::clone(&state),
        async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        },
    ));

    println!();
    println!("🌐 Bridge available at http://127.0.0.1:{}", config.server.port);
    println!("   • GET  /api/session         - Session phase and countdown");
    println!("   • POST /api/session/start   - Page load (renews expired session)");
    println!("   • POST /api/activity        - Report page activity");
    println!("   • POST /api/session/extend  - Stay logged in");
    println!("   • POST /api/session/logout  - Logout now");
    println!("   • WS   /ws                  - Dialog commands and activity");
    println!();

    let outcome = tokio::select! {
        _ = shutdown_rx.wait_for(|stop| *stop) => {
            println!("\n⏳ Shutting down...");
            server_task.await
        }
        result = &mut server_task => result,
    };
    state.monitor().stop();

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP bridge failed"),
        Err(e) => tracing::error!(error = %e, "HTTP bridge task panicked"),
    }

    println!("👋 idlewarden has exited. Goodbye!");
    Ok(())
}
