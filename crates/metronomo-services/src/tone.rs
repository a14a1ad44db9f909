//! Tone generator on a process-wide output engine
//!
//! There is exactly one [`AudioEngine`] per process. It is created on the
//! first call to [`AudioEngine::global`] and lives until exit. Every
//! [`ToneGenerator`] shares it.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use metronomo_core::{MetronomeError, Timbre, ToneSpec};
use tracing::{debug, error, info, trace, warn};

use crate::audio_io::RealtimeOutputStream;

/// Peak loudness of every pulse
pub const PEAK_GAIN: f32 = 0.3;
/// Level the exponential decay reaches at the end of the pulse
pub const DECAY_FLOOR: f32 = 0.01;
const ATTACK_SECS: f32 = 0.002;
const MAX_VOICES: usize = 64;
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Anything that can emit a pulse. Must never block.
pub trait TonePlayer {
    fn play(&self, tone: ToneSpec);

    /// Playback stopped; the output may idle until the next `play`
    fn rest(&self) {}
}

/// One pulse: oscillator plus envelope, dropped once silent
#[derive(Debug, Clone)]
pub struct Voice {
    timbre: Timbre,
    phase: f32,
    phase_inc: f32,
    gain: f32,
    attack_step: f32,
    decay_factor: f32,
    attack_samples: usize,
    length: usize,
    age: usize,
}

impl Voice {
    pub fn new(tone: ToneSpec, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let length = (tone.duration_secs.max(0.0) * sr) as usize;
        let attack_samples = ((ATTACK_SECS * sr) as usize).min(length / 4).max(1);
        let decay_samples = length.saturating_sub(attack_samples).max(1);

        Self {
            timbre: tone.timbre,
            phase: 0.0,
            phase_inc: tone.frequency_hz / sr,
            gain: 0.0,
            attack_step: PEAK_GAIN / attack_samples as f32,
            decay_factor: (DECAY_FLOOR / PEAK_GAIN).powf(1.0 / decay_samples as f32),
            attack_samples,
            length,
            age: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.age >= self.length
    }

    /// Current envelope level
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }

        if self.age < self.attack_samples {
            self.gain = (self.gain + self.attack_step).min(PEAK_GAIN);
        } else {
            self.gain *= self.decay_factor;
        }

        let osc = match self.timbre {
            Timbre::Sine => (self.phase * TAU).sin(),
            Timbre::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        self.phase = (self.phase + self.phase_inc).fract();
        self.age += 1;
        osc * self.gain
    }
}

/// Mix pending and live voices into an interleaved buffer
fn render_voices(
    voices: &mut Vec<Voice>,
    incoming: &Receiver<ToneSpec>,
    buffer: &mut [f32],
    sample_rate: u32,
    channels: u16,
) {
    for tone in incoming.try_iter() {
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(Voice::new(tone, sample_rate));
    }

    let channels = channels.max(1) as usize;
    for frame in buffer.chunks_mut(channels) {
        let sample: f32 = voices.iter_mut().map(Voice::next_sample).sum();
        frame.fill(sample.clamp(-1.0, 1.0));
    }

    voices.retain(|v| !v.is_finished());
}

/// Power state of the shared engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Starting = 0,
    Running = 1,
    Suspended = 2,
    /// No device, or the stream could not be built
    Unavailable = 3,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Suspended,
            _ => Self::Unavailable,
        }
    }
}

/// Engine state as last requested by callers.
///
/// Transitions are recorded when they are requested, not when the audio
/// thread gets to them, so an `emit` right after `suspend` already sees
/// `Suspended` and queues the matching resume.
#[derive(Debug)]
struct EngineStatus(AtomicU8);

impl EngineStatus {
    fn new(state: EngineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move `from` to `to`; false if the state was something else
    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineCommand {
    Suspend,
    Resume,
}

static ENGINE: OnceLock<AudioEngine> = OnceLock::new();

/// Process-wide output engine.
///
/// A dedicated thread owns the device stream; callers talk to it through
/// channels, so the handle is `Sync` even where the stream is not.
pub struct AudioEngine {
    status: EngineStatus,
    tones: Sender<ToneSpec>,
    commands: Sender<EngineCommand>,
}

impl AudioEngine {
    /// The shared engine, opened on first use
    pub fn global() -> &'static AudioEngine {
        ENGINE.get_or_init(AudioEngine::open)
    }

    fn open() -> Self {
        let (tones_tx, tones_rx) = unbounded();
        let (commands_tx, commands_rx) = unbounded();
        let engine = Self::with_channels(EngineState::Starting, tones_tx, commands_tx);

        let (ready_tx, ready_rx) = bounded(1);
        let spawned = thread::Builder::new()
            .name("metronomo-audio".into())
            .spawn(move || Self::run(tones_rx, commands_rx, ready_tx));

        let state = match spawned {
            Ok(_) => ready_rx
                .recv_timeout(STARTUP_TIMEOUT)
                .unwrap_or(EngineState::Unavailable),
            Err(e) => {
                error!("Failed to spawn audio thread: {}", e);
                EngineState::Unavailable
            }
        };
        engine.status.set(state);
        info!(?state, "Audio engine opened");
        engine
    }

    fn with_channels(
        state: EngineState,
        tones: Sender<ToneSpec>,
        commands: Sender<EngineCommand>,
    ) -> Self {
        Self { status: EngineStatus::new(state), tones, commands }
    }

    /// Audio thread body: owns the stream until the process exits
    fn run(tones: Receiver<ToneSpec>, commands: Receiver<EngineCommand>, ready: Sender<EngineState>) {
        let mut voices: Vec<Voice> = Vec::with_capacity(MAX_VOICES);
        let stream = RealtimeOutputStream::start(move |buffer, sample_rate, channels| {
            render_voices(&mut voices, &tones, buffer, sample_rate, channels);
        });

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                let e = MetronomeError::from(e);
                warn!("{}, tones will be silent", e);
                let _ = ready.send(EngineState::Unavailable);
                return;
            }
        };
        debug!(
            sample_rate = stream.sample_rate(),
            channels = stream.channels(),
            "Audio thread ready"
        );
        let _ = ready.send(EngineState::Running);

        // Commands arrive in request order, so the stream always ends up
        // in the state the last caller asked for.
        for command in commands.iter() {
            match command {
                EngineCommand::Suspend => match stream.suspend() {
                    Ok(()) => debug!("Audio engine suspended"),
                    Err(e) => {
                        warn!("Suspend not supported: {}", e);
                        if let Some(engine) = ENGINE.get() {
                            engine.status.transition(EngineState::Suspended, EngineState::Running);
                        }
                    }
                },
                EngineCommand::Resume => match stream.resume() {
                    Ok(()) => debug!("Audio engine resumed"),
                    Err(e) => warn!("Resume not supported: {}", e),
                },
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.status.get()
    }

    pub fn is_available(&self) -> bool {
        self.state() != EngineState::Unavailable
    }

    /// Let the device idle while nothing is playing
    pub fn suspend(&self) {
        if self.status.transition(EngineState::Running, EngineState::Suspended) {
            let _ = self.commands.send(EngineCommand::Suspend);
        }
    }

    pub fn resume(&self) {
        if self.status.transition(EngineState::Suspended, EngineState::Running) {
            let _ = self.commands.send(EngineCommand::Resume);
        }
    }

    /// Queue one pulse. Never blocks; silent if no device.
    ///
    /// A suspended stream is resumed before the tone is queued.
    pub fn emit(&self, tone: ToneSpec) {
        match self.state() {
            EngineState::Unavailable => {
                trace!("Audio unavailable, skipping tone");
                return;
            }
            EngineState::Suspended => self.resume(),
            EngineState::Starting | EngineState::Running => {}
        }
        if self.tones.send(tone).is_err() {
            trace!("Audio thread gone, skipping tone");
        }
    }
}

/// Plays tick pulses through the shared engine
#[derive(Clone, Copy)]
pub struct ToneGenerator {
    engine: Option<&'static AudioEngine>,
}

impl ToneGenerator {
    pub fn new() -> Self {
        Self { engine: Some(AudioEngine::global()) }
    }

    /// Generator that never touches the audio device
    pub fn muted() -> Self {
        Self { engine: None }
    }

    pub fn engine(&self) -> Option<&'static AudioEngine> {
        self.engine
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TonePlayer for ToneGenerator {
    fn play(&self, tone: ToneSpec) {
        if let Some(engine) = self.engine {
            engine.emit(tone);
        }
    }

    fn rest(&self) {
        if let Some(engine) = self.engine {
            engine.suspend();
        }
    }
}
