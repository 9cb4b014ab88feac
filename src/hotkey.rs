use crate::state::{AppState, Trigger};
use log::{error, info};
use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

static LISTENER_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Global push-to-talk listener. Right Ctrl toggles capture on/off; the
/// actual start/stop decision runs on the client actor, this thread only
/// emits triggers.
pub fn start_listener(state: Arc<AppState>, trigger_tx: UnboundedSender<Trigger>) {
    if LISTENER_ACTIVE.swap(true, Ordering::SeqCst) {
        return;
    }

    std::thread::spawn(move || {
        let key_held = Arc::new(AtomicBool::new(false));
        let key_held_cb = key_held.clone();

        let callback = move |event: Event| match event.event_type {
            EventType::KeyPress(Key::ControlRight) => {
                // Ignore key auto-repeat while held.
                if key_held_cb.swap(true, Ordering::SeqCst) {
                    return;
                }
                if state.recording.load(Ordering::SeqCst) {
                    info!("push-to-talk: stop");
                    let _ = trigger_tx.send(Trigger::StopCapture);
                } else {
                    info!("push-to-talk: start");
                    let _ = trigger_tx.send(Trigger::StartCapture);
                }
            }
            EventType::KeyRelease(Key::ControlRight) => {
                key_held_cb.store(false, Ordering::SeqCst);
            }
            _ => {}
        };

        if let Err(e) = listen(callback) {
            error!("rdev listener error: {:?}", e);
        }

        LISTENER_ACTIVE.store(false, Ordering::SeqCst);
    });
}
