//! Tick scheduler: run state, repeating timer, and the per-tick handler
//!
//! All mutable state sits behind one mutex shared with the timer thread.
//! The timer runs each tick while holding that lock and only after checking
//! that its generation is still current, so `stop` and `restart` cancel
//! synchronously: once they return, no tick of the old timer is observed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use metronomo_core::{
    Configuration, IndicatorSink, MeasureLayout, MetronomeError, Position, PositionTracker, Result,
    RunState, TempoPreset, TickKind, VisualSync,
};
use metronomo_core::visual::{DEFAULT_CELL_WIDTH, PULSE_DURATION};
use tracing::{debug, info, trace, warn};

use crate::tone::TonePlayer;

struct SchedulerState<T, S> {
    run_state: RunState,
    config: Configuration,
    tracker: PositionTracker,
    visual: VisualSync<S>,
    tone: T,
    /// Identifies the armed timer; bumped on every stop
    generation: u64,
    /// Dropping this wakes and ends the armed timer thread
    cancel: Option<Sender<()>>,
    ticks: u64,
    available_width: f32,
    cell_width: f32,
}

impl<T: TonePlayer, S: IndicatorSink> SchedulerState<T, S> {
    /// Sound and visuals for the current position, then step forward
    fn fire_tick(&mut self) {
        let position = self.tracker.position();
        let kind = TickKind::classify(&position);
        let layout = self.visual.layout();

        self.tone.play(kind.tone());
        self.visual.update(
            &position,
            &self.config,
            layout.visible_measures,
            layout.subdivisions_per_measure,
        );
        self.tracker.advance(&self.config, layout.visible_measures);
        self.ticks += 1;

        trace!(
            measure = position.measure,
            beat = position.beat,
            subdivision = position.subdivision,
            ?kind,
            "Tick"
        );
    }

    fn cancel_timer(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cancel = None;
    }

    /// Recompute the visible measures; true if the layout changed
    fn relayout(&mut self, force: bool) -> bool {
        let layout = MeasureLayout::fit(self.available_width, self.cell_width, &self.config);
        if !force && layout == self.visual.layout() {
            return false;
        }
        self.visual.relayout(layout);
        self.tracker.wrap_measures(layout.visible_measures);
        true
    }
}

/// Drives the metronome: owns the run state, timer, position and indicators
pub struct Scheduler<T, S> {
    shared: Arc<Mutex<SchedulerState<T, S>>>,
}

impl<T, S> Scheduler<T, S>
where
    T: TonePlayer + Send + 'static,
    S: IndicatorSink + Send + 'static,
{
    pub fn new(config: Configuration, tone: T, sink: S) -> Self {
        Self::with_display(config, tone, sink, DEFAULT_CELL_WIDTH, PULSE_DURATION)
    }

    /// `cell_width` is the width of one measure cell in the same units
    /// later passed to [`Scheduler::resize`]
    pub fn with_display(
        config: Configuration,
        tone: T,
        sink: S,
        cell_width: f32,
        pulse_duration: Duration,
    ) -> Self {
        let layout = MeasureLayout::fit(0.0, cell_width, &config);
        let mut visual = VisualSync::new(sink, layout).with_pulse_duration(pulse_duration);
        visual.reset_to_origin();

        let state = SchedulerState {
            run_state: RunState::Idle,
            config,
            tracker: PositionTracker::new(),
            visual,
            tone,
            generation: 0,
            cancel: None,
            ticks: 0,
            available_width: 0.0,
            cell_width,
        };
        Self { shared: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState<T, S>> {
        lock_state(&self.shared)
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state().is_running()
    }

    pub fn config(&self) -> Configuration {
        self.lock().config
    }

    /// Position the next tick will play
    pub fn position(&self) -> Position {
        self.lock().tracker.position()
    }

    /// Ticks fired since this scheduler was created
    pub fn tick_count(&self) -> u64 {
        self.lock().ticks
    }

    pub fn layout(&self) -> MeasureLayout {
        self.lock().visual.layout()
    }

    /// Read access to the indicator state, e.g. for rendering
    pub fn with_indicators<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&VisualSync<S>) -> R,
    {
        f(&self.lock().visual)
    }

    /// Start ticking. No-op if already running.
    ///
    /// The first tick (downbeat) fires before this returns.
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock();
        self.start_locked(&mut state)
    }

    /// Stop ticking and show the rest state. No-op if idle.
    pub fn stop(&self) {
        let mut state = self.lock();
        Self::halt_locked(&mut state);
    }

    /// Stop then start under one lock
    pub fn restart(&self) -> Result<()> {
        let mut state = self.lock();
        Self::stop_locked(&mut state);
        self.start_locked(&mut state)?;
        info!(bpm = state.config.bpm(), "Metronome restarted");
        Ok(())
    }

    /// Stop and restore the default configuration (does not start)
    pub fn reset(&self) {
        let mut state = self.lock();
        Self::halt_locked(&mut state);
        state.config = Configuration::default();
        state.relayout(true);
        state.tracker.reset();
        state.visual.reset_to_origin();
        info!("Metronome reset to defaults");
    }

    pub fn toggle(&self) -> Result<()> {
        let mut state = self.lock();
        match state.run_state {
            RunState::Idle => self.start_locked(&mut state),
            RunState::Running => {
                Self::halt_locked(&mut state);
                Ok(())
            }
        }
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        self.update_config(|c| c.set_bpm(bpm))
    }

    pub fn set_note_value(&self, note_value: u32) -> Result<()> {
        self.update_config(|c| c.set_note_value(note_value))
    }

    pub fn set_beats_per_measure(&self, beats: u32) -> Result<()> {
        self.update_config(|c| c.set_beats_per_measure(beats))
    }

    pub fn set_subdivisions_per_beat(&self, subdivisions: u32) -> Result<()> {
        self.update_config(|c| c.set_subdivisions_per_beat(subdivisions))
    }

    pub fn apply_preset(&self, name: &str) -> Result<()> {
        let preset = TempoPreset::by_name(name).ok_or_else(|| MetronomeError::InvalidConfiguration {
            field: "preset",
            value: name.to_string(),
        })?;
        self.set_bpm(preset.bpm)
    }

    pub fn set_configuration(&self, config: Configuration) -> Result<()> {
        self.update_config(|c| {
            *c = config;
            Ok(())
        })
    }

    /// Validate a change, apply it, and restart if running.
    ///
    /// Invalid input is rejected before the scheduler is touched.
    pub fn update_config<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Configuration) -> Result<()>,
    {
        let mut state = self.lock();
        let mut next = state.config;
        f(&mut next)?;
        if next == state.config {
            return Ok(());
        }

        let was_running = state.run_state.is_running();
        if was_running {
            Self::stop_locked(&mut state);
        }

        let meter_changed = next.beats_per_measure() != state.config.beats_per_measure()
            || next.subdivisions_per_beat() != state.config.subdivisions_per_beat();
        state.config = next;
        debug!(
            bpm = next.bpm(),
            beats = next.beats_per_measure(),
            subdivisions = next.subdivisions_per_beat(),
            note_value = next.note_value(),
            "Configuration changed"
        );

        if meter_changed {
            state.relayout(true);
            state.tracker.reset();
            state.visual.reset_to_origin();
        }

        if was_running {
            self.start_locked(&mut state)?;
        }
        Ok(())
    }

    /// New available width for the indicator row
    pub fn resize(&self, available_width: f32) {
        let mut state = self.lock();
        state.available_width = available_width;
        if state.relayout(false) {
            debug!(visible = state.visual.layout().visible_measures, "Indicator layout changed");
            if !state.run_state.is_running() {
                state.visual.reset_to_origin();
            }
        }
    }

    fn start_locked(&self, state: &mut SchedulerState<T, S>) -> Result<()> {
        if state.run_state.is_running() {
            return Ok(());
        }

        let interval = state.config.tick_interval();
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let generation = state.generation;
        let shared = Arc::downgrade(&self.shared);
        let armed_at = Instant::now();

        thread::Builder::new()
            .name("metronomo-timer".into())
            .spawn(move || run_timer(shared, generation, interval, armed_at, cancel_rx))
            .map_err(|e| MetronomeError::TimerUnsupported(e.to_string()))?;

        state.cancel = Some(cancel_tx);
        state.run_state = RunState::Running;
        state.tracker.reset();
        state.fire_tick();

        info!(
            bpm = state.config.bpm(),
            interval_ms = state.config.tick_interval_ms(),
            "Metronome started"
        );
        Ok(())
    }

    /// Stop for good: the tone output may idle afterwards
    fn halt_locked(state: &mut SchedulerState<T, S>) {
        if state.run_state.is_running() {
            Self::stop_locked(state);
            state.tone.rest();
        }
    }

    fn stop_locked(state: &mut SchedulerState<T, S>) {
        if !state.run_state.is_running() {
            return;
        }
        state.cancel_timer();
        state.run_state = RunState::Idle;
        state.tracker.reset();
        state.visual.reset_to_origin();
        info!(ticks = state.ticks, "Metronome stopped");
    }
}

impl<T, S> Drop for Scheduler<T, S> {
    fn drop(&mut self) {
        let mut state = lock_state(&self.shared);
        state.generation = state.generation.wrapping_add(1);
        state.cancel = None;
        state.run_state = RunState::Idle;
    }
}

fn lock_state<T, S>(shared: &Mutex<SchedulerState<T, S>>) -> MutexGuard<'_, SchedulerState<T, S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timer thread body.
///
/// Deadlines are absolute (`armed_at + n * interval`) so scheduling jitter
/// does not accumulate into drift.
fn run_timer<T, S>(
    shared: Weak<Mutex<SchedulerState<T, S>>>,
    generation: u64,
    interval: Duration,
    armed_at: Instant,
    cancel: Receiver<()>,
) where
    T: TonePlayer,
    S: IndicatorSink,
{
    let mut deadline = armed_at + interval;
    loop {
        match cancel.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(shared) = shared.upgrade() else { break };
        let mut state = lock_state(&shared);
        if state.generation != generation || !state.run_state.is_running() {
            break;
        }
        state.fire_tick();
        drop(state);

        deadline += interval;
        let now = Instant::now();
        if deadline < now {
            // Fell more than a whole interval behind: skip instead of bursting
            let behind = now - deadline;
            warn!(behind_ms = behind.as_millis() as u64, "Timer fell behind, skipping ticks");
            let missed = (behind.as_nanos() / interval.as_nanos().max(1)) as u32 + 1;
            deadline += interval * missed;
        }
    }
    trace!(generation, "Timer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use metronomo_core::{IndicatorBoard, ToneSpec, MAX_BPM, MAX_METER};

    /// Records every tone instead of playing it
    #[derive(Clone, Default)]
    struct RecordingPlayer {
        tones: Arc<Mutex<Vec<ToneSpec>>>,
        rests: Arc<Mutex<usize>>,
    }

    impl RecordingPlayer {
        fn kinds(&self) -> Vec<TickKind> {
            self.tones
                .lock()
                .unwrap()
                .iter()
                .map(|t| match t.timbre {
                    metronomo_core::Timbre::Square => TickKind::Downbeat,
                    _ if t.frequency_hz > 700.0 => TickKind::Beat,
                    _ => TickKind::Subdivision,
                })
                .collect()
        }

        fn count(&self) -> usize {
            self.tones.lock().unwrap().len()
        }

        fn rests(&self) -> usize {
            *self.rests.lock().unwrap()
        }
    }

    impl TonePlayer for RecordingPlayer {
        fn play(&self, tone: ToneSpec) {
            self.tones.lock().unwrap().push(tone);
        }

        fn rest(&self) {
            *self.rests.lock().unwrap() += 1;
        }
    }

    fn scheduler(config: Configuration) -> (Scheduler<RecordingPlayer, IndicatorBoard>, RecordingPlayer) {
        let player = RecordingPlayer::default();
        let scheduler = Scheduler::new(config, player.clone(), IndicatorBoard::new());
        (scheduler, player)
    }

    /// Tick kinds for `n` ticks from the origin
    fn expected_kinds(config: &Configuration, n: usize) -> Vec<TickKind> {
        let mut tracker = PositionTracker::new();
        (0..n)
            .map(|_| {
                let kind = TickKind::classify(&tracker.position());
                tracker.advance(config, 64);
                kind
            })
            .collect()
    }

    #[test]
    fn test_start_fires_downbeat_immediately() {
        let (scheduler, player) = scheduler(Configuration::new(60.0, 4, 1, 4).unwrap());
        scheduler.start().unwrap();
        assert_eq!(scheduler.run_state(), RunState::Running);
        assert_eq!(scheduler.tick_count(), 1);
        assert_eq!(player.kinds(), vec![TickKind::Downbeat]);
        assert_eq!(scheduler.position(), Position { measure: 0, beat: 1, subdivision: 0 });
        scheduler.stop();
    }

    #[test]
    fn test_start_twice_arms_one_timer() {
        // 100ms interval
        let (scheduler, player) = scheduler(Configuration::new(150.0, 4, 4, 4).unwrap());
        scheduler.start().unwrap();
        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(250));
        scheduler.stop();

        let ticks = player.count();
        assert!((2..=4).contains(&ticks), "ticks = {}", ticks);
    }

    #[test]
    fn test_no_ticks_after_stop_returns() {
        let (scheduler, player) = scheduler(Configuration::new(400.0, 4, 4, 4).unwrap());
        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(120));
        scheduler.stop();
        let after_stop = player.count();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(player.count(), after_stop);
        assert_eq!(scheduler.run_state(), RunState::Idle);

        // Stopping again is a no-op
        scheduler.stop();
        assert_eq!(player.count(), after_stop);
    }

    #[test]
    fn test_restart_never_mixes_configurations() {
        let old = Configuration::new(400.0, 4, 1, 8).unwrap();
        let new = Configuration::new(400.0, 2, 3, 8).unwrap();
        let (scheduler, player) = scheduler(old);

        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        thread::scope(|s| {
            s.spawn(|| scheduler.set_configuration(new).unwrap());
        });
        thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        let kinds = player.kinds();
        let split_ok = (1..kinds.len()).any(|k| {
            kinds[..k] == expected_kinds(&old, k)[..] && kinds[k..] == expected_kinds(&new, kinds.len() - k)[..]
        });
        assert!(split_ok, "ticks did not split cleanly: {:?}", kinds);
    }

    #[test]
    fn test_classification_sequence() {
        let config = Configuration::new(120.0, 4, 2, 4).unwrap();
        let (scheduler, player) = scheduler(config);
        scheduler.start().unwrap();
        {
            let mut state = scheduler.lock();
            for _ in 0..15 {
                state.fire_tick();
            }
        }
        scheduler.stop();

        let kinds = player.kinds();
        assert!(kinds.len() >= 16);
        assert_eq!(kinds[..16], expected_kinds(&config, 16)[..]);
        for (tick, kind) in kinds[..16].iter().enumerate() {
            match tick {
                0 | 8 => assert_eq!(*kind, TickKind::Downbeat),
                t if t % 2 == 0 => assert_eq!(*kind, TickKind::Beat),
                _ => assert_eq!(*kind, TickKind::Subdivision),
            }
        }
    }

    #[test]
    fn test_sound_and_visual_describe_same_tick() {
        let config = Configuration::new(60.0, 3, 2, 4).unwrap();
        let (scheduler, player) = scheduler(config);
        scheduler.start().unwrap();

        let mut state = scheduler.lock();
        for _ in 0..20 {
            let expected = state.tracker.position();
            state.fire_tick();
            let board = state.visual.sink();
            assert_eq!(board.active_measure(), Some(expected.measure));
            assert_eq!(board.active_subdivision(), Some(expected.global_subdivision(&config)));
            let last = *player.tones.lock().unwrap().last().unwrap();
            assert_eq!(last, TickKind::classify(&expected).tone());
        }
        drop(state);
        scheduler.stop();
    }

    #[test]
    fn test_stop_then_reset_restores_defaults() {
        let (scheduler, _player) = scheduler(Configuration::new(200.0, 7, 3, 8).unwrap());
        scheduler.start().unwrap();
        scheduler.stop();
        scheduler.reset();

        assert_eq!(scheduler.config(), Configuration::default());
        assert_eq!(scheduler.run_state(), RunState::Idle);
        assert!(scheduler.position().is_origin());
        scheduler.with_indicators(|sync| {
            let board = sync.sink();
            assert_eq!(board.active_measure(), Some(0));
            assert_eq!(board.active_subdivision(), Some(0));
            assert_eq!(board.active_count(), (1, 1));
            assert_eq!(board.measures().len(), 4);
        });
    }

    #[test]
    fn test_invalid_config_never_reaches_scheduler() {
        let (scheduler, player) = scheduler(Configuration::default());
        scheduler.start().unwrap();
        assert!(scheduler.set_bpm(0.0).is_err());
        assert!(scheduler.set_beats_per_measure(0).is_err());
        assert!(scheduler.apply_preset("Fortissimo").is_err());
        assert_eq!(scheduler.config(), Configuration::default());
        // No restart happened
        assert_eq!(player.count(), 1);
        scheduler.stop();
    }

    #[test]
    fn test_setter_restarts_when_running() {
        let (scheduler, player) = scheduler(Configuration::new(60.0, 4, 1, 4).unwrap());
        scheduler.start().unwrap();
        scheduler.apply_preset("Allegro").unwrap();
        assert_eq!(scheduler.config().bpm(), 120.0);
        assert_eq!(scheduler.run_state(), RunState::Running);
        // Restart fired a fresh downbeat
        assert_eq!(player.kinds(), vec![TickKind::Downbeat, TickKind::Downbeat]);
        scheduler.stop();
    }

    #[test]
    fn test_setter_while_idle_does_not_start() {
        let (scheduler, player) = scheduler(Configuration::default());
        scheduler.set_subdivisions_per_beat(3).unwrap();
        assert_eq!(scheduler.run_state(), RunState::Idle);
        assert_eq!(player.count(), 0);
        assert_eq!(scheduler.layout().subdivisions_per_measure, 12);
    }

    #[test]
    fn test_resize_keeps_classification() {
        let config = Configuration::new(60.0, 4, 2, 4).unwrap();
        let (scheduler, player) = scheduler(config);
        scheduler.resize(1000.0);
        assert_eq!(scheduler.layout().visible_measures, 10);

        scheduler.start().unwrap();
        {
            let mut state = scheduler.lock();
            for _ in 0..30 {
                state.fire_tick();
            }
        }
        let before = scheduler.position();
        scheduler.resize(250.0);
        scheduler.resize(f32::NAN);
        scheduler.resize(-5.0);
        let after = scheduler.position();
        assert_eq!((before.beat, before.subdivision), (after.beat, after.subdivision));
        assert!(after.measure < scheduler.layout().visible_measures);

        scheduler.lock().fire_tick();
        let last = *player.tones.lock().unwrap().last().unwrap();
        assert_eq!(last, TickKind::classify(&after).tone());
        scheduler.stop();
    }

    #[test]
    fn test_restart_resets_position() {
        let (scheduler, player) = scheduler(Configuration::new(60.0, 4, 1, 4).unwrap());
        // Restart from idle simply starts
        scheduler.restart().unwrap();
        scheduler.lock().fire_tick();
        assert_eq!(scheduler.position().beat, 2);

        scheduler.restart().unwrap();
        assert_eq!(scheduler.position(), Position { measure: 0, beat: 1, subdivision: 0 });
        assert_eq!(
            player.kinds(),
            vec![TickKind::Downbeat, TickKind::Beat, TickKind::Downbeat]
        );
        scheduler.stop();
    }

    #[test]
    fn test_output_rests_only_when_playback_ends() {
        let (scheduler, player) = scheduler(Configuration::default());
        scheduler.stop();
        scheduler.reset();
        assert_eq!(player.rests(), 0);

        scheduler.start().unwrap();
        scheduler.restart().unwrap();
        scheduler.set_bpm(120.0).unwrap();
        assert_eq!(player.rests(), 0);

        // Reset while running ends playback like stop does
        scheduler.reset();
        assert_eq!(player.rests(), 1);

        scheduler.start().unwrap();
        scheduler.stop();
        scheduler.start().unwrap();
        scheduler.toggle().unwrap();
        assert_eq!(player.rests(), 3);
    }

    #[test]
    fn test_fastest_meter_keeps_timer_paced() {
        let fastest = Configuration::new(MAX_BPM, MAX_METER, MAX_METER, MAX_METER).unwrap();
        let (scheduler, player) = scheduler(fastest);
        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        // One tick per MIN_TICK_INTERVAL at most, plus the immediate downbeat
        let ticks = player.count();
        assert!(ticks >= 2, "ticks = {}", ticks);
        assert!(ticks <= 110, "ticks = {}", ticks);
    }

    #[test]
    fn test_toggle() {
        let (scheduler, _player) = scheduler(Configuration::default());
        scheduler.toggle().unwrap();
        assert!(scheduler.is_running());
        scheduler.toggle().unwrap();
        assert!(!scheduler.is_running());
    }
}
