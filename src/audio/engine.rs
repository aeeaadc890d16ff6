// Audio engine - cpal output stream playing scheduled voice triggers
//
// The stream is opened lazily by `ensure_ready` (the explicit audio unlock)
// and lives on its own thread, since `cpal::Stream` is not Send on every
// platform. Triggers reach the callback through a lock-free ring buffer and
// start on the sample matching their scheduled clock time.
//
// Supported sample formats: F32, I16, U16. Everything is rendered in f32 and
// converted when written to the device buffer.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::audio::device::find_output_device;
use crate::audio::dsp_utils::{OnePoleSmoother, flush_denormals_to_zero, soft_clip};
use crate::audio::parameters::{AtomicF32, MasterVolume};
use crate::audio::status::{AtomicDeviceStatus, DeviceStatus};
use crate::audio::timing::AudioTiming;
use crate::audio::{EngineError, SoundEngine, VoiceTrigger};
use crate::config::AudioConfig;
use crate::messaging::channels::{
    CommandConsumer, CommandProducer, SharedNotificationProducer, create_command_channel,
    push_notification,
};
use crate::messaging::command::AudioCommand;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::ClockSource;
use crate::synth::voice_manager::VoiceManager;

/// How long `ensure_ready` waits for the device to open
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);
/// Re-anchor the sample clock when it drifts this far from the wall clock
const RESYNC_THRESHOLD: f64 = 0.02;
const VOLUME_SMOOTHING_MS: f32 = 10.0;

struct StreamThread {
    shutdown: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl StreamThread {
    fn stop(self) {
        self.shutdown.store(true, Ordering::Release);
        self.handle.thread().unpark();
        if self.handle.join().is_err() {
            tracing::error!("audio stream thread panicked");
        }
    }
}

/// Everything the stream thread needs to open the device
struct StreamSetup {
    device_name: Option<String>,
    clock: Arc<dyn ClockSource>,
    volume: MasterVolume,
    status: AtomicDeviceStatus,
    notifications: Option<SharedNotificationProducer>,
    consumer: CommandConsumer,
    pending_capacity: usize,
}

/// cpal-backed `SoundEngine`
pub struct AudioEngine {
    clock: Arc<dyn ClockSource>,
    config: AudioConfig,
    status: AtomicDeviceStatus,
    volume: MasterVolume,
    sample_rate: AtomicF32,
    commands: Mutex<Option<CommandProducer>>,
    stream_thread: Mutex<Option<StreamThread>>,
    notifications: Option<SharedNotificationProducer>,
}

impl AudioEngine {
    /// Create an engine; no device is touched until `ensure_ready`
    pub fn new(clock: Arc<dyn ClockSource>, config: AudioConfig) -> Self {
        Self {
            clock,
            volume: MasterVolume::new(config.master_volume),
            config,
            status: AtomicDeviceStatus::new(DeviceStatus::Disconnected),
            sample_rate: AtomicF32::new(0.0),
            commands: Mutex::new(None),
            stream_thread: Mutex::new(None),
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, tx: SharedNotificationProducer) -> Self {
        self.notifications = Some(tx);
        self
    }

    /// Master volume handle (shared with the audio callback)
    pub fn volume(&self) -> MasterVolume {
        self.volume.clone()
    }

    pub fn status(&self) -> DeviceStatus {
        self.status.get()
    }

    /// Output sample rate, once the device is open
    pub fn sample_rate(&self) -> Option<f32> {
        let rate = self.sample_rate.get();
        (rate > 0.0).then_some(rate)
    }

    fn open(&self) -> Result<(), EngineError> {
        let mut stream_thread = self
            .stream_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished opening while we waited
        if self.status.get() == DeviceStatus::Connected {
            return Ok(());
        }
        if let Some(previous) = stream_thread.take() {
            previous.stop();
        }

        self.status.set(DeviceStatus::Connecting);

        let capacity = self.config.command_queue_capacity.max(1);
        let (producer, consumer) = create_command_channel(capacity);
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        let setup = StreamSetup {
            device_name: self.config.output_device.clone(),
            clock: Arc::clone(&self.clock),
            volume: self.volume.clone(),
            status: self.status.clone(),
            notifications: self.notifications.clone(),
            consumer,
            pending_capacity: capacity,
        };

        let thread_shutdown = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("stepbeat-audio".to_string())
            .spawn(move || run_stream_thread(setup, ready_tx, thread_shutdown))
            .map_err(|e| {
                self.status.set(DeviceStatus::Error);
                EngineError::Stream(e.to_string())
            })?;

        let opened = ready_rx
            .recv_timeout(OPEN_TIMEOUT)
            .unwrap_or_else(|_| Err(EngineError::Stream("timed out opening audio output".into())));

        let thread = StreamThread { shutdown, handle };
        match opened {
            Ok(sample_rate) => {
                *self.commands.lock().unwrap_or_else(PoisonError::into_inner) = Some(producer);
                *stream_thread = Some(thread);
                self.sample_rate.set(sample_rate);
                self.status.set(DeviceStatus::Connected);
                tracing::info!(sample_rate, "audio output ready");
                Ok(())
            }
            Err(e) => {
                // The thread exits on its own once it sees the flag
                thread.shutdown.store(true, Ordering::Release);
                thread.handle.thread().unpark();
                self.status.set(DeviceStatus::Error);
                Err(e)
            }
        }
    }

    fn push(&self, command: AudioCommand) -> Result<(), EngineError> {
        if self.status.get() != DeviceStatus::Connected {
            return Err(EngineError::NotReady);
        }
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        let producer = commands.as_mut().ok_or(EngineError::NotReady)?;
        producer
            .try_push(command)
            .map_err(|_| EngineError::QueueFull)
    }
}

impl SoundEngine for AudioEngine {
    fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.status.get() == DeviceStatus::Connected {
            return Ok(());
        }
        self.open()
    }

    fn trigger(&self, trigger: &VoiceTrigger) -> Result<(), EngineError> {
        self.push(AudioCommand::Trigger(*trigger))
    }

    fn cancel_from(&self, time: f64) {
        if let Err(e) = self.push(AudioCommand::CancelFrom(time)) {
            tracing::debug!(error = %e, "could not cancel pending triggers");
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let stream_thread = self
            .stream_thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = stream_thread {
            thread.stop();
        }
    }
}

fn run_stream_thread(
    setup: StreamSetup,
    ready_tx: mpsc::SyncSender<Result<f32, EngineError>>,
    shutdown: Arc<AtomicBool>,
) {
    let stream = match open_output_stream(setup) {
        Ok((stream, sample_rate)) => {
            let _ = ready_tx.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while !shutdown.load(Ordering::Acquire) {
        thread::park();
    }

    drop(stream);
    tracing::debug!("audio stream closed");
}

fn open_output_stream(setup: StreamSetup) -> Result<(Stream, f32), EngineError> {
    let host = cpal::default_host();
    let device =
        find_output_device(&host, setup.device_name.as_deref()).ok_or(EngineError::NoDevice)?;

    tracing::info!(
        device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
        "opening audio output"
    );

    let supported_config = device
        .default_output_config()
        .map_err(|e| EngineError::Stream(e.to_string()))?;

    let sample_format = supported_config.sample_format();
    let sample_rate = supported_config.sample_rate().0 as f32;
    let channels = supported_config.channels() as usize;
    let config: StreamConfig = supported_config.into();

    tracing::debug!(?sample_format, sample_rate, channels, "audio config");

    let renderer = Renderer::new(
        sample_rate,
        setup.clock,
        setup.volume,
        setup.pending_capacity,
    );
    let parts = CallbackParts {
        renderer,
        consumer: setup.consumer,
        status: setup.status,
        notifications: setup.notifications,
        channels,
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, parts),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, parts),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, parts),
        other => return Err(EngineError::UnsupportedFormat(format!("{other:?}"))),
    }?;

    stream
        .play()
        .map_err(|e| EngineError::Stream(e.to_string()))?;

    Ok((stream, sample_rate))
}

struct CallbackParts {
    renderer: Renderer,
    consumer: CommandConsumer,
    status: AtomicDeviceStatus,
    notifications: Option<SharedNotificationProducer>,
    channels: usize,
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    parts: CallbackParts,
) -> Result<Stream, EngineError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let CallbackParts {
        mut renderer,
        mut consumer,
        status,
        notifications,
        channels,
    } = parts;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // ========== SACRED ZONE ==========
                // No allocations, no I/O, no blocking locks
                renderer.sync_clock();
                while let Some(command) = consumer.try_pop() {
                    renderer.handle(command);
                }
                renderer.render(data, channels);
                // ========== SACRED ZONE END ==========
            },
            move |err| {
                // Runs outside the audio callback, I/O is fine here
                tracing::error!(error = %err, "audio stream error");
                status.set(DeviceStatus::Error);
                if let Some(tx) = &notifications {
                    push_notification(
                        tx,
                        Notification::error(
                            NotificationCategory::Audio,
                            format!("Audio stream error: {err}"),
                        ),
                    );
                }
            },
            None,
        )
        .map_err(|e| EngineError::Stream(e.to_string()))
}

#[derive(Debug, Clone, Copy)]
struct PendingTrigger {
    start_sample: u64,
    trigger: VoiceTrigger,
}

/// Audio-thread state: pending triggers, voices and output stage
struct Renderer {
    timing: AudioTiming,
    clock: Arc<dyn ClockSource>,
    voices: VoiceManager,
    /// Pre-allocated; never grows inside the callback
    pending: Vec<PendingTrigger>,
    volume: MasterVolume,
    smoother: OnePoleSmoother,
}

impl Renderer {
    fn new(
        sample_rate: f32,
        clock: Arc<dyn ClockSource>,
        volume: MasterVolume,
        pending_capacity: usize,
    ) -> Self {
        Self {
            timing: AudioTiming::new(sample_rate),
            clock,
            voices: VoiceManager::new(sample_rate),
            pending: Vec::with_capacity(pending_capacity.max(1)),
            smoother: OnePoleSmoother::new(volume.get(), VOLUME_SMOOTHING_MS, sample_rate),
            volume,
        }
    }

    /// Keep the sample counter aligned with the shared clock
    fn sync_clock(&mut self) {
        let now = self.clock.now();
        if !self.timing.is_anchored() {
            self.timing.anchor(now);
            return;
        }
        let expected = self.timing.time_of_sample(self.timing.current_sample());
        if (now - expected).abs() > RESYNC_THRESHOLD {
            self.timing.anchor(now);
        }
    }

    fn handle(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Trigger(trigger) => {
                // Full queue: drop the trigger rather than allocate
                if self.pending.len() < self.pending.capacity() {
                    let start_sample = self.timing.sample_for_time(trigger.time);
                    self.pending.push(PendingTrigger {
                        start_sample,
                        trigger,
                    });
                }
            }
            AudioCommand::CancelFrom(time) => {
                self.pending.retain(|p| p.trigger.time < time);
            }
        }
    }

    fn start_due_voices(&mut self) {
        let position = self.timing.current_sample();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start_sample <= position {
                let due = self.pending.swap_remove(i);
                self.voices.trigger(&due.trigger);
            } else {
                i += 1;
            }
        }
    }

    fn next_sample(&mut self) -> f32 {
        self.start_due_voices();
        let volume = self.smoother.process(self.volume.get());
        let sample = flush_denormals_to_zero(self.voices.next_sample()) * volume;
        self.timing.advance(1);
        soft_clip(sample)
    }

    fn render<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        for frame in data.chunks_mut(channels.max(1)) {
            let value = T::from_sample(self.next_sample());
            for channel_sample in frame.iter_mut() {
                *channel_sample = value;
            }
        }
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
