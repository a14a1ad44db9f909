//! Tempo and meter configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MetronomeError, Result};

/// Default tempo in BPM
pub const DEFAULT_BPM: f64 = 100.0;
/// Default rhythmic figure (4 = quarter note)
pub const DEFAULT_NOTE_VALUE: u32 = 4;
pub const DEFAULT_BEATS_PER_MEASURE: u32 = 4;
pub const DEFAULT_SUBDIVISIONS_PER_BEAT: u32 = 1;

/// Accepted tempo range
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 400.0;
/// Upper bound for beats, subdivisions and the note value
pub const MAX_METER: u32 = 64;
/// Shortest interval the timer is ever armed with
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Validated metronome configuration.
///
/// Fields can only change through the checked setters, so a value of
/// this type always has a tempo within `MIN_BPM..=MAX_BPM` and meter
/// fields within `1..=MAX_METER`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConfiguration", into = "RawConfiguration")]
pub struct Configuration {
    bpm: f64,
    beats_per_measure: u32,
    subdivisions_per_beat: u32,
    note_value: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_measure: DEFAULT_BEATS_PER_MEASURE,
            subdivisions_per_beat: DEFAULT_SUBDIVISIONS_PER_BEAT,
            note_value: DEFAULT_NOTE_VALUE,
        }
    }
}

impl Configuration {
    pub fn new(
        bpm: f64,
        beats_per_measure: u32,
        subdivisions_per_beat: u32,
        note_value: u32,
    ) -> Result<Self> {
        let mut config = Self::default();
        config.set_bpm(bpm)?;
        config.set_beats_per_measure(beats_per_measure)?;
        config.set_subdivisions_per_beat(subdivisions_per_beat)?;
        config.set_note_value(note_value)?;
        Ok(config)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    pub fn subdivisions_per_beat(&self) -> u32 {
        self.subdivisions_per_beat
    }

    pub fn note_value(&self) -> u32 {
        self.note_value
    }

    /// Subdivision cells in one measure
    pub fn subdivisions_per_measure(&self) -> u32 {
        self.beats_per_measure * self.subdivisions_per_beat
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(MetronomeError::invalid("bpm", bpm));
        }
        self.bpm = bpm;
        Ok(())
    }

    pub fn set_beats_per_measure(&mut self, beats: u32) -> Result<()> {
        self.beats_per_measure = positive("beats_per_measure", beats)?;
        Ok(())
    }

    pub fn set_subdivisions_per_beat(&mut self, subdivisions: u32) -> Result<()> {
        self.subdivisions_per_beat = positive("subdivisions_per_beat", subdivisions)?;
        Ok(())
    }

    pub fn set_note_value(&mut self, note_value: u32) -> Result<()> {
        self.note_value = positive("note_value", note_value)?;
        Ok(())
    }

    /// Milliseconds between consecutive ticks
    pub fn tick_interval_ms(&self) -> f64 {
        60_000.0 / self.bpm * (4.0 / self.note_value as f64) / self.subdivisions_per_beat as f64
    }

    /// Timer period, never shorter than [`MIN_TICK_INTERVAL`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_ms() / 1000.0).max(MIN_TICK_INTERVAL)
    }

    /// Preset whose tempo equals the current one, if any
    pub fn active_preset(&self) -> Option<&'static TempoPreset> {
        TempoPreset::matching(self.bpm)
    }
}

fn positive(field: &'static str, value: u32) -> Result<u32> {
    if !(1..=MAX_METER).contains(&value) {
        return Err(MetronomeError::invalid(field, value));
    }
    Ok(value)
}

/// Unchecked mirror used for (de)serialization
#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RawConfiguration {
    bpm: f64,
    beats_per_measure: u32,
    subdivisions_per_beat: u32,
    note_value: u32,
}

impl Default for RawConfiguration {
    fn default() -> Self {
        Configuration::default().into()
    }
}

impl From<Configuration> for RawConfiguration {
    fn from(c: Configuration) -> Self {
        Self {
            bpm: c.bpm,
            beats_per_measure: c.beats_per_measure,
            subdivisions_per_beat: c.subdivisions_per_beat,
            note_value: c.note_value,
        }
    }
}

impl TryFrom<RawConfiguration> for Configuration {
    type Error = MetronomeError;

    fn try_from(raw: RawConfiguration) -> Result<Self> {
        Self::new(raw.bpm, raw.beats_per_measure, raw.subdivisions_per_beat, raw.note_value)
    }
}

/// Named tempo mark
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoPreset {
    pub name: &'static str,
    pub bpm: f64,
}

pub const TEMPO_PRESETS: [TempoPreset; 7] = [
    TempoPreset { name: "Largo", bpm: 50.0 },
    TempoPreset { name: "Adagio", bpm: 70.0 },
    TempoPreset { name: "Andante", bpm: 90.0 },
    TempoPreset { name: "Moderato", bpm: 100.0 },
    TempoPreset { name: "Allegro", bpm: 120.0 },
    TempoPreset { name: "Vivace", bpm: 150.0 },
    TempoPreset { name: "Presto", bpm: 180.0 },
];

impl TempoPreset {
    pub fn all() -> &'static [TempoPreset] {
        &TEMPO_PRESETS
    }

    pub fn by_name(name: &str) -> Option<&'static TempoPreset> {
        TEMPO_PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn matching(bpm: f64) -> Option<&'static TempoPreset> {
        TEMPO_PRESETS.iter().find(|p| (p.bpm - bpm).abs() < f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.bpm(), 100.0);
        assert_eq!(config.note_value(), 4);
        assert_eq!(config.beats_per_measure(), 4);
        assert_eq!(config.subdivisions_per_beat(), 1);
        assert_eq!(config.active_preset().map(|p| p.name), Some("Moderato"));
    }

    #[test]
    fn test_tick_interval() {
        let config = Configuration::new(100.0, 4, 1, 4).unwrap();
        assert!((config.tick_interval_ms() - 600.0).abs() < 1e-9);
        assert!((config.tick_interval().as_secs_f64() - 0.6).abs() < 1e-6);

        // Eighth-note figure with two subdivisions per beat
        let config = Configuration::new(120.0, 3, 2, 8).unwrap();
        assert!((config.tick_interval_ms() - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = Configuration::default();
        assert!(matches!(
            config.set_bpm(0.0),
            Err(MetronomeError::InvalidConfiguration { field: "bpm", .. })
        ));
        assert!(config.set_bpm(-10.0).is_err());
        assert!(config.set_bpm(f64::NAN).is_err());
        assert!(config.set_bpm(f64::INFINITY).is_err());
        assert!(config.set_beats_per_measure(0).is_err());
        assert!(config.set_subdivisions_per_beat(0).is_err());
        assert!(config.set_note_value(0).is_err());

        // Failed setters leave the previous values untouched
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = Configuration::default();
        assert!(config.set_bpm(1e-20).is_err());
        assert!(config.set_bpm(1e12).is_err());
        assert!(config.set_bpm(MIN_BPM - 0.5).is_err());
        assert!(config.set_bpm(MAX_BPM + 0.5).is_err());
        assert!(config.set_beats_per_measure(MAX_METER + 1).is_err());
        assert!(config.set_subdivisions_per_beat(70_000).is_err());
        assert!(config.set_note_value(u32::MAX).is_err());
        assert!(Configuration::new(100.0, 70_000, 70_000, 4).is_err());
        assert_eq!(config, Configuration::default());

        config.set_bpm(MIN_BPM).unwrap();
        config.set_bpm(MAX_BPM).unwrap();
        config.set_beats_per_measure(MAX_METER).unwrap();
    }

    #[test]
    fn test_extreme_meter_stays_bounded() {
        let slowest = Configuration::new(MIN_BPM, 1, 1, 1).unwrap();
        assert!((slowest.tick_interval().as_secs_f64() - 12.0).abs() < 1e-6);

        let fastest = Configuration::new(MAX_BPM, MAX_METER, MAX_METER, MAX_METER).unwrap();
        assert_eq!(fastest.subdivisions_per_measure(), MAX_METER * MAX_METER);
        assert!(fastest.tick_interval_ms() < 1.0);
        assert_eq!(fastest.tick_interval(), MIN_TICK_INTERVAL);
    }

    #[test]
    fn test_presets() {
        assert_eq!(TempoPreset::by_name("allegro").map(|p| p.bpm), Some(120.0));
        assert!(TempoPreset::matching(101.0).is_none());
        assert_eq!(TempoPreset::all().len(), 7);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Configuration = serde_json::from_str(
            r#"{"bpm": 90.0, "beats_per_measure": 3, "subdivisions_per_beat": 2, "note_value": 8}"#,
        )
        .unwrap();
        assert_eq!(ok, Configuration::new(90.0, 3, 2, 8).unwrap());

        let partial: Configuration = serde_json::from_str(r#"{"bpm": 140.0}"#).unwrap();
        assert_eq!(partial.beats_per_measure(), DEFAULT_BEATS_PER_MEASURE);

        let bad = serde_json::from_str::<Configuration>(r#"{"bpm": 0.0}"#);
        assert!(bad.is_err());
        let bad = serde_json::from_str::<Configuration>(r#"{"beats_per_measure": 0}"#);
        assert!(bad.is_err());
        let bad = serde_json::from_str::<Configuration>(r#"{"bpm": 1e-20}"#);
        assert!(bad.is_err());
        let bad = serde_json::from_str::<Configuration>(r#"{"subdivisions_per_beat": 70000}"#);
        assert!(bad.is_err());
    }
}
