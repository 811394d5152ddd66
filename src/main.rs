use brewtrack_rs::controller::ProcessController;
use brewtrack_rs::protocol::CommandChannel;
use brewtrack_rs::server::console::{console_output_task, spawn_stdin_reader};
use brewtrack_rs::system::config::ProcessConfig;
use brewtrack_rs::system::events::EventBus;
use embassy_executor::Spawner;
use embassy_sync::channel::Channel;
use log::{error, info, warn};
use std::sync::Arc;

static EVENT_BUS: EventBus = EventBus::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // stdout carries the protocol, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("Starting brewing process tracker");

    let code = match run(spawner).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Process tracker failed: {:#}", e);
            1
        }
    };

    // The executor never returns on its own
    std::process::exit(code);
}

async fn run(spawner: Spawner) -> anyhow::Result<()> {
    let config = ProcessConfig::from_env()?;
    info!(
        "Loaded {} stages, tick interval {}ms",
        config.stages.len(),
        config.tick_interval_ms
    );

    let command_channel: Arc<CommandChannel> = Arc::new(Channel::new());
    let mut controller = Box::new(ProcessController::new(
        &config,
        &EVENT_BUS,
        Arc::clone(&command_channel),
    )?);

    // Output task subscribes before the controller publishes anything
    let subscriber = EVENT_BUS.subscriber()?;
    if spawner.spawn(console_output_task(subscriber)).is_err() {
        warn!("Failed to spawn console output task - events will not be printed");
    }

    spawn_stdin_reader(Arc::clone(&command_channel), &EVENT_BUS)?;

    controller.run().await;

    // Let the output task flush the shutdown event
    embassy_time::Timer::after_millis(50).await;
    Ok(())
}
