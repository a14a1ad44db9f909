//! metronomo-core: Domain types for the metronomo metronome

mod config;
mod error;
mod input;
mod position;
mod tick;
mod transport;
pub mod visual;

pub use config::{
    Configuration, TempoPreset, DEFAULT_BEATS_PER_MEASURE, DEFAULT_BPM, DEFAULT_NOTE_VALUE,
    DEFAULT_SUBDIVISIONS_PER_BEAT, MAX_BPM, MAX_METER, MIN_BPM, MIN_TICK_INTERVAL, TEMPO_PRESETS,
};
pub use error::{MetronomeError, Result};
pub use input::{InputAction, SchedulerCommand};
pub use position::{Position, PositionTracker};
pub use tick::{TickKind, Timbre, ToneSpec};
pub use transport::RunState;
pub use visual::{CellRef, IndicatorBoard, IndicatorSink, MeasureCell, MeasureLayout, VisualSync};
