//! Visual indicator state kept in step with the audible tick

use std::time::{Duration, Instant};

use crate::config::Configuration;
use crate::position::Position;

/// Default width of one measure cell, in points
pub const DEFAULT_CELL_WIDTH: f32 = 100.0;
/// Narrowest cell honoured when fitting measures to the width
pub const MIN_CELL_WIDTH: f32 = 20.0;
/// Cap on measures added because the window is wide
pub const MAX_VISIBLE_MEASURES: usize = 256;
/// How long the full-screen pulse stays lit after a tick
pub const PULSE_DURATION: Duration = Duration::from_millis(100);

/// Handle to one indicator cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRef {
    Measure(usize),
    /// Flattened index over the subdivisions of all visible measures
    Subdivision(usize),
}

/// Receiver of indicator updates (a renderer, or the in-memory board)
pub trait IndicatorSink {
    /// Drop every cell before a relayout
    fn clear_cells(&mut self);
    fn create_measure_cell(&mut self, index: usize, is_accent: bool, subdivisions: usize);
    fn mark_active(&mut self, cell: CellRef);
    fn clear_active(&mut self, cell: CellRef);
    /// Light the pulse flash; it goes out on its own after `duration`
    fn flash_pulse(&mut self, duration: Duration);
}

/// How many measure cells fit on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureLayout {
    pub visible_measures: usize,
    pub subdivisions_per_measure: usize,
}

impl MeasureLayout {
    /// At least one cell per beat, more if the width allows
    pub fn fit(available_width: f32, cell_width: f32, config: &Configuration) -> Self {
        let by_width = if available_width.is_finite() && cell_width > 0.0 {
            let cell_width = cell_width.max(MIN_CELL_WIDTH);
            ((available_width / cell_width).floor().max(0.0) as usize).min(MAX_VISIBLE_MEASURES)
        } else {
            0
        };
        Self {
            visible_measures: by_width.max(config.beats_per_measure() as usize).max(1),
            subdivisions_per_measure: config.subdivisions_per_measure() as usize,
        }
    }

    pub fn total_subdivisions(&self) -> usize {
        self.visible_measures * self.subdivisions_per_measure
    }
}

/// Maps positions to active indicator cells.
///
/// The marked cells are retained so that clearing touches only them
/// instead of sweeping the whole sink.
pub struct VisualSync<S> {
    sink: S,
    layout: MeasureLayout,
    active_measure: Option<usize>,
    active_subdivision: Option<usize>,
    pulse_duration: Duration,
}

impl<S: IndicatorSink> VisualSync<S> {
    pub fn new(sink: S, layout: MeasureLayout) -> Self {
        let mut sync = Self {
            sink,
            layout,
            active_measure: None,
            active_subdivision: None,
            pulse_duration: PULSE_DURATION,
        };
        sync.relayout(layout);
        sync
    }

    pub fn with_pulse_duration(mut self, duration: Duration) -> Self {
        self.pulse_duration = duration;
        self
    }

    pub fn layout(&self) -> MeasureLayout {
        self.layout
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn active_measure(&self) -> Option<usize> {
        self.active_measure
    }

    pub fn active_subdivision(&self) -> Option<usize> {
        self.active_subdivision
    }

    /// Rebuild every cell for a new layout. Leaves nothing marked.
    pub fn relayout(&mut self, layout: MeasureLayout) {
        self.layout = layout;
        self.active_measure = None;
        self.active_subdivision = None;
        self.sink.clear_cells();
        for index in 0..layout.visible_measures {
            self.sink.create_measure_cell(index, index == 0, layout.subdivisions_per_measure);
        }
    }

    /// Mark the cells for `position` and flash the pulse
    pub fn update(
        &mut self,
        position: &Position,
        config: &Configuration,
        visible_measures: usize,
        subdivisions_per_measure: usize,
    ) {
        self.clear();

        let visible = visible_measures.max(1);
        let total = (visible * subdivisions_per_measure).max(1);
        let measure = position.measure % visible;
        let subdivision = position.global_subdivision(config) % total;

        self.mark(measure, subdivision);
        self.sink.flash_pulse(self.pulse_duration);
    }

    pub fn clear(&mut self) {
        if let Some(index) = self.active_measure.take() {
            self.sink.clear_active(CellRef::Measure(index));
        }
        if let Some(index) = self.active_subdivision.take() {
            self.sink.clear_active(CellRef::Subdivision(index));
        }
    }

    /// Rest state: first measure and its first subdivision marked
    pub fn reset_to_origin(&mut self) {
        self.clear();
        self.mark(0, 0);
    }

    fn mark(&mut self, measure: usize, subdivision: usize) {
        self.sink.mark_active(CellRef::Measure(measure));
        self.sink.mark_active(CellRef::Subdivision(subdivision));
        self.active_measure = Some(measure);
        self.active_subdivision = Some(subdivision);
    }
}

/// One measure cell as created by the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureCell {
    pub index: usize,
    pub is_accent: bool,
    pub active: bool,
    pub first_subdivision: usize,
    pub subdivision_count: usize,
}

/// Retained in-memory indicator sink that a renderer reads each frame
#[derive(Debug, Clone, Default)]
pub struct IndicatorBoard {
    measures: Vec<MeasureCell>,
    subdivisions: Vec<bool>,
    pulse_until: Option<Instant>,
}

impl IndicatorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measures(&self) -> &[MeasureCell] {
        &self.measures
    }

    /// Active flags of the subdivisions belonging to `cell`
    pub fn subdivisions_of(&self, cell: &MeasureCell) -> &[bool] {
        let end = (cell.first_subdivision + cell.subdivision_count).min(self.subdivisions.len());
        let start = cell.first_subdivision.min(end);
        &self.subdivisions[start..end]
    }

    pub fn active_measure(&self) -> Option<usize> {
        self.measures.iter().position(|m| m.active)
    }

    pub fn active_subdivision(&self) -> Option<usize> {
        self.subdivisions.iter().position(|&active| active)
    }

    pub fn active_count(&self) -> (usize, usize) {
        (
            self.measures.iter().filter(|m| m.active).count(),
            self.subdivisions.iter().filter(|&&active| active).count(),
        )
    }

    pub fn is_pulsing(&self) -> bool {
        self.is_pulsing_at(Instant::now())
    }

    pub fn is_pulsing_at(&self, now: Instant) -> bool {
        self.pulse_until.is_some_and(|until| now < until)
    }

    fn set(&mut self, cell: CellRef, active: bool) {
        match cell {
            CellRef::Measure(index) => {
                if let Some(m) = self.measures.get_mut(index) {
                    m.active = active;
                }
            }
            CellRef::Subdivision(index) => {
                if let Some(s) = self.subdivisions.get_mut(index) {
                    *s = active;
                }
            }
        }
    }
}

impl IndicatorSink for IndicatorBoard {
    fn clear_cells(&mut self) {
        self.measures.clear();
        self.subdivisions.clear();
    }

    fn create_measure_cell(&mut self, index: usize, is_accent: bool, subdivisions: usize) {
        self.measures.push(MeasureCell {
            index,
            is_accent,
            active: false,
            first_subdivision: self.subdivisions.len(),
            subdivision_count: subdivisions,
        });
        self.subdivisions.extend(std::iter::repeat(false).take(subdivisions));
    }

    fn mark_active(&mut self, cell: CellRef) {
        self.set(cell, true);
    }

    fn clear_active(&mut self, cell: CellRef) {
        self.set(cell, false);
    }

    fn flash_pulse(&mut self, duration: Duration) {
        self.pulse_until = Some(Instant::now() + duration);
    }
}
