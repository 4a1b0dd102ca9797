//! Minimal embedder: connects to team 4533, enables once code is running,
//! restarts user code once, and prints state transitions.

use std::sync::Arc;
use std::time::Duration;

use open_station::codec::AllianceColor;
use open_station::config::StationConfig;
use open_station::connection::ConnectionState;
use open_station::Coordinator;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = StationConfig { team_number: 4533, ..StationConfig::default() };
    let coordinator = Arc::new(Coordinator::new(&config));
    coordinator.set_alliance(AllianceColor::Red, 1).expect("station 1 is valid");

    let shutdown = CancellationToken::new();
    let mut states = coordinator.subscribe();

    let runner = {
        let coordinator = coordinator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { coordinator.run(shutdown).await })
    };

    let watcher = tokio::spawn(async move {
        let mut was_code_running = false;
        loop {
            if states.changed().await.is_err() {
                break;
            }
            let state = states.borrow().clone();
            let code_running = state.connection == ConnectionState::CodeRunning;
            if code_running && !was_code_running {
                tracing::info!("user code is running, enabling teleop");
                coordinator.enable();
            }
            was_code_running = code_running;
            println!("connection={:?} enabled={} battery={:.2}", state.connection, state.control.enabled(), state.battery_voltage);
        }
    });

    tokio::time::sleep(Duration::from_secs(60)).await;
    shutdown.cancel();
    let _ = tokio::join!(runner, watcher);
}
