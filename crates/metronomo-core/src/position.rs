//! Musical position tracking (measure / beat / subdivision)

use serde::{Deserialize, Serialize};

use crate::config::Configuration;

/// Position of a tick within the visible measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub measure: usize,
    pub beat: usize,
    pub subdivision: usize,
}

impl Position {
    pub const ORIGIN: Position = Position { measure: 0, beat: 0, subdivision: 0 };

    /// Position one subdivision later.
    ///
    /// Carry cascades subdivision -> beat -> measure; the measure index
    /// wraps modulo `visible_measures` (treated as at least 1).
    pub fn next(self, config: &Configuration, visible_measures: usize) -> Position {
        let subdivisions = config.subdivisions_per_beat() as usize;
        let beats = config.beats_per_measure() as usize;
        let visible = visible_measures.max(1);

        let mut next = self;
        next.subdivision += 1;
        if next.subdivision >= subdivisions {
            next.subdivision = 0;
            next.beat += 1;
            if next.beat >= beats {
                next.beat = 0;
                next.measure = (next.measure + 1) % visible;
            }
        }
        next
    }

    /// Flattened subdivision index counted from the first visible measure
    pub fn global_subdivision(&self, config: &Configuration) -> usize {
        let per_beat = config.subdivisions_per_beat() as usize;
        let per_measure = config.subdivisions_per_measure() as usize;
        self.measure * per_measure + self.beat * per_beat + self.subdivision
    }

    /// Fold the measure index into a new visible measure count
    pub fn wrap_measures(self, visible_measures: usize) -> Position {
        Position {
            measure: self.measure % visible_measures.max(1),
            ..self
        }
    }

    pub fn is_origin(&self) -> bool {
        *self == Self::ORIGIN
    }
}

/// Holds the next position to be played
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    position: Position,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Step one subdivision forward and return the new position
    pub fn advance(&mut self, config: &Configuration, visible_measures: usize) -> Position {
        self.position = self.position.next(config, visible_measures);
        self.position
    }

    pub fn reset(&mut self) -> Position {
        self.position = Position::ORIGIN;
        self.position
    }

    pub fn wrap_measures(&mut self, visible_measures: usize) {
        self.position = self.position.wrap_measures(visible_measures);
    }
}
