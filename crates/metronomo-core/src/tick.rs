//! Tick classification and the tone parameters for each tier

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timbre {
    Square,
    #[default]
    Sine,
}

/// Parameters for one audible pulse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub duration_secs: f32,
    pub timbre: Timbre,
}

/// Accent tier of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickKind {
    /// First beat of the measure
    Downbeat,
    Beat,
    Subdivision,
}

impl TickKind {
    pub fn classify(position: &Position) -> Self {
        match (position.beat, position.subdivision) {
            (0, 0) => TickKind::Downbeat,
            (_, 0) => TickKind::Beat,
            _ => TickKind::Subdivision,
        }
    }

    pub fn tone(self) -> ToneSpec {
        match self {
            TickKind::Downbeat => ToneSpec {
                frequency_hz: 1000.0,
                duration_secs: 0.15,
                timbre: Timbre::Square,
            },
            TickKind::Beat => ToneSpec {
                frequency_hz: 800.0,
                duration_secs: 0.1,
                timbre: Timbre::Sine,
            },
            TickKind::Subdivision => ToneSpec {
                frequency_hz: 600.0,
                duration_secs: 0.05,
                timbre: Timbre::Sine,
            },
        }
    }
}
