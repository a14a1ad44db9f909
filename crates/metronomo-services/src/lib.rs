//! metronomo-services: Tick scheduler and tone output

pub mod audio_io;
pub mod scheduler;
pub mod tone;

pub use audio_io::{default_device_info, AudioOutputError, RealtimeOutputStream};
pub use scheduler::Scheduler;
pub use tone::{AudioEngine, EngineState, ToneGenerator, TonePlayer, Voice};
