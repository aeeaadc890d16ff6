// Transport - Step clock driving the sequencer loop
// Owns the tempo, the step cursor and the most recent step boundary

use crate::sequencer::scheduler::{ClockSource, Scheduler};
use crate::sequencer::tempo::Tempo;
use crate::sequencer::wrap_step;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Transport state (stopped/running)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

/// Last boundary and step period, read together
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySnapshot {
    /// Intended time of the most recent tick, in clock seconds
    pub last_boundary: f64,
    /// Step period in seconds
    pub step_period: f64,
}

/// One step of the loop, as delivered to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTick {
    pub step: usize,
    /// Intended playback time in clock seconds
    pub time: f64,
    pub step_period: f64,
}

// Boundary and period are packed into one word so readers never see a torn
// pair: upper 44 bits hold the boundary in microseconds (about 200 days),
// lower 20 bits the period in microseconds (up to ~1.05 s, 20 BPM needs 0.75 s).
const PERIOD_BITS: u32 = 20;
const PERIOD_MASK: u64 = (1 << PERIOD_BITS) - 1;
const BOUNDARY_MAX_MICROS: u64 = (1 << (64 - PERIOD_BITS)) - 1;

fn to_micros(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1_000_000.0).round() as u64
    } else {
        0
    }
}

fn pack(boundary_micros: u64, period_micros: u64) -> u64 {
    (boundary_micros.min(BOUNDARY_MAX_MICROS) << PERIOD_BITS) | period_micros.min(PERIOD_MASK)
}

fn unpack(word: u64) -> BoundarySnapshot {
    BoundarySnapshot {
        last_boundary: (word >> PERIOD_BITS) as f64 / 1_000_000.0,
        step_period: (word & PERIOD_MASK) as f64 / 1_000_000.0,
    }
}

/// Shared clock state
/// Written by the tick thread, read lock-free by the judge and the UI
#[derive(Debug)]
pub struct SharedClockState {
    running: AtomicBool,
    step: AtomicUsize,
    /// Ticks dispatched since the last start
    ticks: AtomicU64,
    boundary: AtomicU64,
}

impl SharedClockState {
    pub fn new(step_period: f64) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            step: AtomicUsize::new(0),
            ticks: AtomicU64::new(0),
            boundary: AtomicU64::new(pack(0, to_micros(step_period))),
        })
    }

    pub fn state(&self) -> TransportState {
        if self.running.load(Ordering::Acquire) {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    /// Step of the most recent tick (0 while stopped)
    pub fn current_step(&self) -> usize {
        self.step.load(Ordering::Acquire)
    }

    /// Step sounding at clock time `now`
    ///
    /// Ticks are dispatched ahead of their playback time, so until the most
    /// recent boundary is reached the previous step is still the one heard.
    pub fn audible_step(&self, now: f64) -> usize {
        let step = self.current_step();
        let ticks = self.ticks.load(Ordering::Acquire);
        if ticks > 1 && now < self.boundary().last_boundary {
            wrap_step(step as i64 - 1)
        } else {
            step
        }
    }

    pub fn boundary(&self) -> BoundarySnapshot {
        unpack(self.boundary.load(Ordering::Acquire))
    }

    fn record_tick(&self, step: usize, time: f64) {
        self.step.store(step, Ordering::Release);
        self.ticks.fetch_add(1, Ordering::AcqRel);
        let boundary = to_micros(time);
        // The closure always returns Some, so the update cannot fail
        let _ = self
            .boundary
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some(pack(boundary, word & PERIOD_MASK))
            });
    }

    fn set_step_period(&self, step_period: f64) {
        let period = to_micros(step_period);
        let _ = self
            .boundary
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some(pack(word >> PERIOD_BITS, period))
            });
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    fn reset_cursor(&self) {
        self.step.store(0, Ordering::Release);
        self.ticks.store(0, Ordering::Release);
    }
}

/// Transport controller
///
/// Drives a single recurring task through a `Scheduler`. Each tick computes
/// its step from a tick counter, records its intended time as the last
/// boundary and hands a `StepTick` to the tick handler.
pub struct TransportClock {
    shared: Arc<SharedClockState>,
    scheduler: Box<dyn Scheduler>,
    clock: Arc<dyn ClockSource>,
    tempo: Tempo,
}

impl TransportClock {
    pub fn new(tempo: Tempo, scheduler: Box<dyn Scheduler>, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            shared: SharedClockState::new(tempo.step_period()),
            scheduler,
            clock,
            tempo,
        }
    }

    /// Get shared state (for readers on other threads)
    pub fn shared_state(&self) -> Arc<SharedClockState> {
        Arc::clone(&self.shared)
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn current_step(&self) -> usize {
        self.shared.current_step()
    }

    /// Step the listener hears right now (trails `current_step` by the lookahead)
    pub fn audible_step(&self) -> usize {
        self.shared.audible_step(self.clock.now())
    }

    pub fn boundary(&self) -> BoundarySnapshot {
        self.shared.boundary()
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Current time on the transport's clock
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Start the loop; the first tick plays step 0
    ///
    /// Does nothing if already running.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut(StepTick) + Send + 'static,
    {
        if self.is_running() {
            tracing::debug!("start ignored, transport already running");
            return;
        }

        self.shared.reset_cursor();
        self.shared.set_running(true);

        let shared = Arc::clone(&self.shared);
        let mut tick_count: i64 = 0;
        let first_tick = self.clock.now() + self.scheduler.lookahead();

        self.scheduler.schedule_repeating(
            first_tick,
            self.tempo.step_period(),
            Box::new(move |time, step_period| {
                let step = wrap_step(tick_count);
                tick_count = tick_count.wrapping_add(1);
                shared.record_tick(step, time);
                on_tick(StepTick {
                    step,
                    time,
                    step_period,
                });
            }),
        );

        tracing::info!(bpm = self.tempo.bpm(), "transport started");
    }

    /// Stop the loop and rewind the cursor
    ///
    /// No tick runs after this returns. Returns the clock time of the stop.
    pub fn stop(&mut self) -> f64 {
        let was_running = self.is_running();
        self.scheduler.cancel();
        self.shared.set_running(false);
        self.shared.reset_cursor();
        if was_running {
            tracing::info!("transport stopped");
        }
        self.clock.now()
    }

    /// Change the tempo; takes effect from the next tick
    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
        self.shared.set_step_period(tempo.step_period());
        self.scheduler.set_period(tempo.step_period());
        tracing::debug!(bpm = tempo.bpm(), "tempo changed");
    }
}

impl Drop for TransportClock {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::scheduler::{ManualClock, ManualScheduler};
    use std::sync::Mutex;

    fn manual_transport(bpm: f64) -> (TransportClock, ManualScheduler, ManualClock) {
        let clock = ManualClock::new(0.0);
        let scheduler = ManualScheduler::with_clock(clock.clone());
        let transport = TransportClock::new(
            Tempo::new(bpm).unwrap(),
            Box::new(scheduler.clone()),
            Arc::new(clock.clone()),
        );
        (transport, scheduler, clock)
    }

    fn collect_ticks(transport: &mut TransportClock) -> Arc<Mutex<Vec<StepTick>>> {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        transport.start(move |tick| sink.lock().unwrap().push(tick));
        ticks
    }

    #[test]
    fn test_pack_roundtrip() {
        let snapshot = unpack(pack(to_micros(12.5), to_micros(0.125)));
        assert_eq!(snapshot.last_boundary, 12.5);
        assert_eq!(snapshot.step_period, 0.125);
    }

    #[test]
    fn test_pack_saturates_oversized_fields() {
        let snapshot = unpack(pack(u64::MAX, u64::MAX));
        assert_eq!(snapshot.step_period, PERIOD_MASK as f64 / 1_000_000.0);
        assert_eq!(
            snapshot.last_boundary,
            BOUNDARY_MAX_MICROS as f64 / 1_000_000.0
        );
        assert_eq!(to_micros(-1.0), 0);
        assert_eq!(to_micros(f64::NAN), 0);
    }

    #[test]
    fn test_slowest_tempo_period_fits() {
        let period = Tempo::new(20.0).unwrap().step_period();
        assert!(to_micros(period) <= PERIOD_MASK);
    }

    #[test]
    fn test_initial_state() {
        let (transport, _, _) = manual_transport(120.0);
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.current_step(), 0);
        assert_eq!(transport.boundary().step_period, 0.125);
    }

    #[test]
    fn test_first_tick_plays_step_zero() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let ticks = collect_ticks(&mut transport);
        assert!(transport.is_running());

        scheduler.advance_to(0.0);
        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].step, 0);
        assert_eq!(ticks[0].time, 0.0);
        assert_eq!(ticks[0].step_period, 0.125);
    }

    #[test]
    fn test_steps_cycle_through_loop() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let ticks = collect_ticks(&mut transport);

        scheduler.run_ticks(40);
        let steps: Vec<usize> = ticks.lock().unwrap().iter().map(|t| t.step).collect();
        let expected: Vec<usize> = (0..40).map(|n| n % 16).collect();
        assert_eq!(steps, expected);
        assert_eq!(transport.current_step(), 39 % 16);
    }

    #[test]
    fn test_boundary_tracks_last_tick() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let _ticks = collect_ticks(&mut transport);

        scheduler.advance_to(0.3);
        let boundary = transport.boundary();
        assert_eq!(boundary.last_boundary, 0.25);
        assert_eq!(boundary.step_period, 0.125);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let ticks = collect_ticks(&mut transport);
        scheduler.advance_to(0.2);
        let _second = collect_ticks(&mut transport);
        scheduler.advance_to(0.3);
        assert_eq!(ticks.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_stop_cancels_and_rewinds() {
        let (mut transport, scheduler, clock) = manual_transport(120.0);
        let ticks = collect_ticks(&mut transport);
        scheduler.advance_to(0.4);
        clock.set(0.45);

        let stopped_at = transport.stop();
        assert_eq!(stopped_at, 0.45);
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.current_step(), 0);
        assert!(!scheduler.is_scheduled());

        let count = ticks.lock().unwrap().len();
        scheduler.advance_to(5.0);
        assert_eq!(ticks.lock().unwrap().len(), count);
    }

    #[test]
    fn test_restart_begins_at_step_zero() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let _first = collect_ticks(&mut transport);
        scheduler.advance_to(0.6);
        transport.stop();

        let ticks = collect_ticks(&mut transport);
        scheduler.advance_to(0.6);
        assert_eq!(ticks.lock().unwrap()[0].step, 0);
    }

    #[test]
    fn test_set_tempo_affects_following_ticks() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let ticks = collect_ticks(&mut transport);
        scheduler.advance_to(0.125);

        transport.set_tempo(Tempo::new(60.0).unwrap());
        assert!(transport.is_running());
        assert_eq!(transport.boundary().step_period, 0.25);

        scheduler.advance_to(1.0);
        let times: Vec<f64> = ticks.lock().unwrap().iter().map(|t| t.time).collect();
        assert_eq!(times, vec![0.0, 0.125, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_set_tempo_while_stopped() {
        let (mut transport, _, _) = manual_transport(120.0);
        transport.set_tempo(Tempo::new(150.0).unwrap());
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.tempo().bpm(), 150.0);
        assert_eq!(transport.boundary().step_period, 0.1);
    }

    #[test]
    fn test_tick_period_matches_following_interval() {
        let (mut transport, scheduler, _) = manual_transport(120.0);
        let ticks = collect_ticks(&mut transport);
        scheduler.advance_to(0.125);

        // The tick at 0.25 s is already due when the tempo changes
        transport.set_tempo(Tempo::new(100.0).unwrap());
        scheduler.run_ticks(3);

        let ticks = ticks.lock().unwrap();
        for pair in ticks.windows(2) {
            assert!((pair[1].time - pair[0].time - pair[0].step_period).abs() < 1e-9);
        }
        assert_eq!(ticks[1].step_period, 0.125);
        assert!((ticks[2].step_period - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_audible_step_trails_early_dispatch() {
        let clock = ManualClock::new(0.0);
        let scheduler = ManualScheduler::new();
        let mut transport = TransportClock::new(
            Tempo::new(120.0).unwrap(),
            Box::new(scheduler.clone()),
            Arc::new(clock.clone()),
        );
        let _ticks = collect_ticks(&mut transport);

        scheduler.advance_to(0.0);
        assert_eq!(transport.audible_step(), 0);

        // Step 1 dispatched 50 ms before it plays
        clock.set(0.075);
        scheduler.advance_to(0.125);
        assert_eq!(transport.current_step(), 1);
        assert_eq!(transport.audible_step(), 0);

        clock.set(0.125);
        assert_eq!(transport.audible_step(), 1);

        // Wraps from step 0 back to 15
        scheduler.run_ticks(14);
        clock.set(1.95);
        scheduler.advance_to(2.0);
        assert_eq!(transport.current_step(), 0);
        assert_eq!(transport.audible_step(), 15);
    }
}
