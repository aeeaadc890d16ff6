use stepbeat::messaging::channels::SharedNotificationProducer;
use stepbeat::ui::StepBeatApp;
use stepbeat::{
    AudioEngine, ClockSource, MonotonicClock, Session, SessionConfig, ThreadScheduler,
    create_notification_channel,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// Notifications are rare (device errors, config fallbacks); a small buffer suffices
const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 64;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match SessionConfig::load_or_default(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "cannot load configuration");
            std::process::exit(1);
        }
    };

    let clock: Arc<dyn ClockSource> = Arc::new(MonotonicClock::new());

    let (notification_tx, notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    let notification_tx: SharedNotificationProducer = Arc::new(Mutex::new(notification_tx));

    // The output stream opens on the first Play, not here
    let engine = AudioEngine::new(Arc::clone(&clock), config.audio.clone())
        .with_notifications(Arc::clone(&notification_tx));
    let volume = engine.volume();

    let scheduler = ThreadScheduler::new(Arc::clone(&clock), config.audio.lookahead_secs);
    let session = match Session::new(&config, Arc::new(engine), Box::new(scheduler), clock) {
        Ok(session) => session.with_notifications(notification_tx),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(bpm = session.tempo().bpm(), "StepBeat starting");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([820.0, 420.0])
            .with_title("StepBeat"),
        ..Default::default()
    };

    let app = StepBeatApp::new(session, volume, notification_rx);
    if let Err(e) = eframe::run_native(
        "StepBeat",
        native_options,
        Box::new(|_cc| Ok(Box::new(app))),
    ) {
        tracing::error!(error = %e, "UI exited with an error");
    }
}
