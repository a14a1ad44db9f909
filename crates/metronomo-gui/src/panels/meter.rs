//! Meter selection: rhythmic figure, beats per measure, subdivisions

use egui::Ui;
use metronomo_core::Configuration;

const NOTE_VALUES: [(u32, &str); 5] = [(1, "1/1"), (2, "1/2"), (4, "1/4"), (8, "1/8"), (16, "1/16")];
const BEATS: [u32; 8] = [2, 3, 4, 5, 6, 7, 9, 12];
const SUBDIVISIONS: [u32; 4] = [1, 2, 3, 4];

pub enum MeterAction {
    None,
    NoteValue(u32),
    Beats(u32),
    Subdivisions(u32),
}

pub struct MeterPanel;

impl MeterPanel {
    pub fn new() -> Self {
        Self
    }

    pub fn ui(&mut self, ui: &mut Ui, config: &Configuration) -> MeterAction {
        let mut action = MeterAction::None;

        ui.horizontal_wrapped(|ui| {
            ui.label("Figure:");
            for (value, label) in NOTE_VALUES {
                if ui.selectable_label(config.note_value() == value, label).clicked() {
                    action = MeterAction::NoteValue(value);
                }
            }

            ui.separator();

            ui.label("Beats:");
            for beats in BEATS {
                if ui
                    .selectable_label(config.beats_per_measure() == beats, beats.to_string())
                    .clicked()
                {
                    action = MeterAction::Beats(beats);
                }
            }

            ui.separator();

            ui.label("Subdivisions:");
            for subdivisions in SUBDIVISIONS {
                if ui
                    .selectable_label(config.subdivisions_per_beat() == subdivisions, subdivisions.to_string())
                    .clicked()
                {
                    action = MeterAction::Subdivisions(subdivisions);
                }
            }
        });

        action
    }
}
