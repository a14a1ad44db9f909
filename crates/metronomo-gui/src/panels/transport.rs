//! Transport controls: start/stop, reset, tempo slider and presets

use egui::{Color32, RichText, Slider, Ui};
use metronomo_core::{Configuration, RunState, TempoPreset, MAX_BPM, MIN_BPM};

/// Actions that can be triggered from transport
pub enum TransportAction {
    None,
    ToggleRun,
    Reset,
    SetBpm(f64),
    Preset(&'static str),
}

pub struct TransportPanel {
    /// Slider value while the user is dragging; applied on release
    bpm_draft: Option<f64>,
}

impl TransportPanel {
    pub fn new() -> Self {
        Self { bpm_draft: None }
    }

    pub fn ui(
        &mut self,
        ui: &mut Ui,
        run_state: RunState,
        config: &Configuration,
        device: Option<&str>,
    ) -> TransportAction {
        let mut action = TransportAction::None;

        ui.horizontal(|ui| {
            ui.spacing_mut().item_spacing.x = 8.0;

            // Start/Stop
            let (label, color) = match run_state {
                RunState::Idle => ("\u{25B6} Start", Color32::from_rgb(100, 200, 100)),
                RunState::Running => ("\u{23F9} Stop", Color32::from_rgb(220, 90, 90)),
            };
            if ui.button(RichText::new(label).size(18.0).color(color)).clicked() {
                action = TransportAction::ToggleRun;
            }

            if ui.button(RichText::new("\u{21BA} Reset").size(18.0)).clicked() {
                action = TransportAction::Reset;
            }

            ui.separator();

            // Tempo
            let mut bpm = self.bpm_draft.unwrap_or(config.bpm());
            ui.label(RichText::new(format!("{:.0}", bpm)).monospace().size(28.0).strong());
            ui.label("BPM");

            let response = ui.add(
                Slider::new(&mut bpm, MIN_BPM..=MAX_BPM)
                    .integer()
                    .show_value(false),
            );
            if response.dragged() {
                self.bpm_draft = Some(bpm);
            } else if response.drag_stopped() || response.changed() {
                self.bpm_draft = None;
                action = TransportAction::SetBpm(bpm);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(run_state.label());
                if let Some(device) = device {
                    ui.separator();
                    ui.label(RichText::new(device).small().weak());
                }
            });
        });

        ui.horizontal_wrapped(|ui| {
            let active = config.active_preset().map(|p| p.name);
            for preset in TempoPreset::all() {
                let text = format!("{} {:.0}", preset.name, preset.bpm);
                if ui.selectable_label(active == Some(preset.name), text).clicked() {
                    action = TransportAction::Preset(preset.name);
                }
            }
        });

        action
    }
}
