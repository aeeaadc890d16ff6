// Scheduler - Recurring tick task behind the transport clock
// A real-time implementation on a dedicated thread and a manual one for tests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single park of the tick thread; bounds the reaction to period changes
const MAX_PARK_SECONDS: f64 = 0.005;

/// Monotonic time source, in seconds since an arbitrary origin
pub trait ClockSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock based on `Instant`
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Settable clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, delta: f64) {
        self.set(self.now() + delta);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Acquire))
    }
}

/// Tick body; receives the tick's intended time and the period until the
/// tick after it
pub type TickCallback = Box<dyn FnMut(f64, f64) + Send + 'static>;

/// Drives a single recurring task
///
/// Implementations must guarantee that once `cancel` returns the callback is
/// not running and will never run again.
pub trait Scheduler: Send {
    /// Start (or replace) the recurring task; first tick at `first_tick`
    fn schedule_repeating(&mut self, first_tick: f64, period: f64, callback: TickCallback);

    /// Change the period; applies from the next tick on
    fn set_period(&mut self, period: f64);

    /// Stop the task
    fn cancel(&mut self);

    fn is_scheduled(&self) -> bool;

    /// How far ahead of its intended time a tick is delivered
    fn lookahead(&self) -> f64 {
        0.0
    }
}

fn valid_period(period: f64) -> bool {
    period.is_finite() && period > 0.0
}

/// State shared between a `ThreadScheduler` and its tick thread
struct TaskControl {
    /// Held while a tick runs; `false` once cancelled
    active: Mutex<bool>,
    period_bits: AtomicU64,
    finished: AtomicBool,
}

impl TaskControl {
    fn is_active(&self) -> bool {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn period(&self) -> f64 {
        f64::from_bits(self.period_bits.load(Ordering::Acquire))
    }
}

struct RunningTask {
    control: Arc<TaskControl>,
    thread: thread::Thread,
}

/// Real-time scheduler running the tick body on a dedicated thread
///
/// Deadlines are computed as `first_tick + n * period` (with period changes
/// applied between ticks), so ticks do not drift with wake-up jitter. Ticks
/// are delivered `lookahead` seconds early to give the sound engine time to
/// place them sample-accurately. A late thread catches up on missed ticks
/// instead of skipping them.
pub struct ThreadScheduler {
    clock: Arc<dyn ClockSource>,
    lookahead: f64,
    task: Option<RunningTask>,
}

impl ThreadScheduler {
    pub fn new(clock: Arc<dyn ClockSource>, lookahead: f64) -> Self {
        let lookahead = if lookahead.is_finite() {
            lookahead.max(0.0)
        } else {
            0.0
        };
        Self {
            clock,
            lookahead,
            task: None,
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_repeating(&mut self, first_tick: f64, period: f64, callback: TickCallback) {
        self.cancel();

        if !valid_period(period) {
            tracing::warn!(period, "refusing to schedule task with invalid period");
            return;
        }

        let control = Arc::new(TaskControl {
            active: Mutex::new(true),
            period_bits: AtomicU64::new(period.to_bits()),
            finished: AtomicBool::new(false),
        });

        let clock = Arc::clone(&self.clock);
        let lookahead = self.lookahead;
        let thread_control = Arc::clone(&control);

        let spawned = thread::Builder::new()
            .name("stepbeat-clock".to_string())
            .spawn(move || tick_loop(clock, lookahead, thread_control, callback, first_tick));

        match spawned {
            Ok(handle) => {
                self.task = Some(RunningTask {
                    control,
                    thread: handle.thread().clone(),
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn clock thread");
            }
        }
    }

    fn set_period(&mut self, period: f64) {
        if !valid_period(period) {
            tracing::warn!(period, "ignoring invalid tick period");
            return;
        }
        if let Some(task) = &self.task {
            task.control
                .period_bits
                .store(period.to_bits(), Ordering::Release);
            task.thread.unpark();
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            // Waits for an in-flight tick to finish
            *task
                .control
                .active
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = false;
            task.thread.unpark();
        }
    }

    fn is_scheduled(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.control.finished.load(Ordering::Acquire))
    }

    fn lookahead(&self) -> f64 {
        self.lookahead
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn tick_loop(
    clock: Arc<dyn ClockSource>,
    lookahead: f64,
    control: Arc<TaskControl>,
    mut callback: TickCallback,
    first_tick: f64,
) {
    let mut next_tick = first_tick;

    loop {
        let due = next_tick - lookahead;
        let now = clock.now();

        if now < due {
            thread::park_timeout(Duration::from_secs_f64((due - now).min(MAX_PARK_SECONDS)));
            if !control.is_active() {
                break;
            }
            continue;
        }

        {
            let active = control
                .active
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !*active {
                break;
            }
            let period = control.period();
            callback(next_tick, period);
            next_tick += period;
        }
    }

    control.finished.store(true, Ordering::Release);
    tracing::debug!("clock thread exiting");
}

struct ManualTask {
    next_tick: f64,
    period: f64,
    callback: Option<TickCallback>,
    generation: u64,
}

#[derive(Default)]
struct ManualState {
    task: Option<ManualTask>,
    generation: u64,
}

/// Deterministic scheduler driven by `advance_to`
///
/// Clones share the same task, so a test can keep one handle while the
/// transport owns another. When built with a `ManualClock`, the clock is moved
/// to each tick's time before the tick runs.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
    clock: Option<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            state: Arc::default(),
            clock: Some(clock),
        }
    }

    /// Intended time of the next tick, if a task is scheduled
    pub fn next_tick(&self) -> Option<f64> {
        self.lock().task.as_ref().map(|task| task.next_tick)
    }

    /// Current period of the scheduled task
    pub fn period(&self) -> Option<f64> {
        self.lock().task.as_ref().map(|task| task.period)
    }

    /// Run every tick due at or before `time`, returning how many ran
    pub fn advance_to(&self, time: f64) -> usize {
        let mut fired = 0;

        loop {
            let (deadline, period, mut callback, generation) = {
                let mut state = self.lock();
                let Some(task) = state.task.as_mut() else {
                    break;
                };
                if task.next_tick > time {
                    break;
                }
                let Some(callback) = task.callback.take() else {
                    break;
                };
                (task.next_tick, task.period, callback, task.generation)
            };

            if let Some(clock) = &self.clock {
                clock.set(deadline);
            }
            callback(deadline, period);
            fired += 1;

            let mut state = self.lock();
            if let Some(task) = state.task.as_mut() {
                if task.generation == generation {
                    task.callback = Some(callback);
                    task.next_tick = deadline + period;
                }
            }
        }

        if let Some(clock) = &self.clock {
            clock.set(time);
        }
        fired
    }

    /// Run exactly `count` ticks (fewer if the task is cancelled)
    pub fn run_ticks(&self, count: usize) -> usize {
        let mut fired = 0;
        for _ in 0..count {
            let Some(next) = self.next_tick() else {
                break;
            };
            let ran = self.advance_to(next);
            if ran == 0 {
                break;
            }
            fired += ran;
        }
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&mut self, first_tick: f64, period: f64, callback: TickCallback) {
        let mut state = self.lock();
        if !valid_period(period) {
            tracing::warn!(period, "refusing to schedule task with invalid period");
            state.task = None;
            return;
        }
        state.generation += 1;
        let generation = state.generation;
        state.task = Some(ManualTask {
            next_tick: first_tick,
            period,
            callback: Some(callback),
            generation,
        });
    }

    fn set_period(&mut self, period: f64) {
        if !valid_period(period) {
            return;
        }
        if let Some(task) = self.lock().task.as_mut() {
            task.period = period;
        }
    }

    fn cancel(&mut self) {
        self.lock().task = None;
    }

    fn is_scheduled(&self) -> bool {
        self.lock().task.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_callback() -> (Arc<Mutex<Vec<f64>>>, TickCallback) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        let callback: TickCallback = Box::new(move |time, _| sink.lock().unwrap().push(time));
        (ticks, callback)
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1.0);
        let other = clock.clone();
        other.advance(0.5);
        assert_eq!(clock.now(), 1.5);
    }

    #[test]
    fn test_manual_scheduler_fires_due_ticks() {
        let (ticks, callback) = recording_callback();
        let mut scheduler = ManualScheduler::new();
        scheduler.schedule_repeating(0.0, 0.125, callback);

        assert_eq!(scheduler.advance_to(0.3), 3);
        assert_eq!(*ticks.lock().unwrap(), vec![0.0, 0.125, 0.25]);
        assert_eq!(scheduler.next_tick(), Some(0.375));
    }

    #[test]
    fn test_manual_scheduler_period_change_applies_to_next_tick() {
        let (ticks, callback) = recording_callback();
        let mut scheduler = ManualScheduler::new();
        scheduler.schedule_repeating(0.0, 0.1, callback);
        scheduler.advance_to(0.0);

        scheduler.set_period(0.2);
        assert_eq!(scheduler.next_tick(), Some(0.1));
        scheduler.advance_to(0.55);
        let ticks = ticks.lock().unwrap();
        let expected = [0.0, 0.1, 0.3, 0.5];
        assert_eq!(ticks.len(), expected.len());
        for (got, want) in ticks.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_manual_scheduler_cancel() {
        let (ticks, callback) = recording_callback();
        let mut scheduler = ManualScheduler::new();
        let handle = scheduler.clone();
        scheduler.schedule_repeating(0.0, 0.1, callback);
        handle.advance_to(0.15);
        scheduler.cancel();

        assert!(!handle.is_scheduled());
        assert_eq!(handle.advance_to(10.0), 0);
        assert_eq!(ticks.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_manual_scheduler_moves_clock() {
        let clock = ManualClock::new(0.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = clock.clone();
        let mut scheduler = ManualScheduler::with_clock(clock.clone());
        scheduler.schedule_repeating(
            0.5,
            0.5,
            Box::new(move |_, _| sink.lock().unwrap().push(observer.now())),
        );

        scheduler.advance_to(1.2);
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
        assert_eq!(clock.now(), 1.2);
    }

    #[test]
    fn test_invalid_period_is_not_scheduled() {
        let (_, callback) = recording_callback();
        let mut scheduler = ManualScheduler::new();
        scheduler.schedule_repeating(0.0, 0.0, callback);
        assert!(!scheduler.is_scheduled());
    }

    #[test]
    fn test_thread_scheduler_ticks_and_cancels() {
        let clock: Arc<dyn ClockSource> = Arc::new(MonotonicClock::new());
        let (ticks, callback) = recording_callback();
        let mut scheduler = ThreadScheduler::new(Arc::clone(&clock), 0.0);

        scheduler.schedule_repeating(clock.now(), 0.01, callback);
        assert!(scheduler.is_scheduled());
        thread::sleep(Duration::from_millis(120));
        scheduler.cancel();

        let count = ticks.lock().unwrap().len();
        assert!(count >= 5, "expected several ticks, got {count}");

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.lock().unwrap().len(), count);
        assert!(!scheduler.is_scheduled());
    }

    #[test]
    fn test_thread_scheduler_deadlines_do_not_drift() {
        let clock: Arc<dyn ClockSource> = Arc::new(MonotonicClock::new());
        let (ticks, callback) = recording_callback();
        let mut scheduler = ThreadScheduler::new(Arc::clone(&clock), 0.0);

        let start = clock.now();
        scheduler.schedule_repeating(start, 0.02, callback);
        thread::sleep(Duration::from_millis(110));
        scheduler.cancel();

        let ticks = ticks.lock().unwrap();
        for (n, time) in ticks.iter().enumerate() {
            assert!((time - (start + n as f64 * 0.02)).abs() < 1e-9);
        }
    }
}
