mod audio;
mod client;
mod conversation;
mod hotkey;
mod protocol;
mod settings;
mod state;
mod transport;

use client::VoiceClient;
use log::{error, info};
use state::{AppState, Trigger};
use std::sync::Arc;

fn main() {
    env_logger::init();

    let settings = settings::load();
    // Materialize defaults on first run so the endpoint and mic device can
    // be edited on disk.
    if let Ok(path) = settings::settings_path() {
        if !path.exists() {
            if let Err(e) = settings::save(&settings) {
                error!("could not write default settings: {}", e);
            }
        }
    }
    let app_state = Arc::new(AppState::new());
    let (trigger_tx, trigger_rx) = tokio::sync::mpsc::unbounded_channel::<Trigger>();

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");

    // Ctrl-C feeds the same trigger queue, so teardown (mic release + socket
    // close) runs on the actor like everything else.
    {
        let shutdown_tx = trigger_tx.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(Trigger::Shutdown);
            }
        });
    }

    hotkey::start_listener(app_state.clone(), trigger_tx.clone());
    info!("push-to-talk active: press Right Ctrl to speak");

    let mut client = VoiceClient::new(settings, app_state);
    // The recorder holds a cpal stream, which is not Send; the whole actor
    // therefore runs under block_on instead of spawn.
    runtime.block_on(async {
        if let Err(e) = client.connect(trigger_tx.clone()).await {
            error!("failed to reach backend: {}", e);
        }
        client.run(trigger_rx).await;
    });
}
