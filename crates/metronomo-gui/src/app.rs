//! Main application state

use std::time::Duration;

use eframe::CreationContext;
use egui::{Context, Key};
use metronomo_core::{IndicatorBoard, InputAction, Result, SchedulerCommand};
use metronomo_services::{default_device_info, Scheduler, ToneGenerator};

use crate::config::{load_config, save_config, AppConfig};
use crate::panels::{MeasuresPanel, MeterAction, MeterPanel, TransportAction, TransportPanel};

/// Key bindings for the discrete actions
const KEY_ACTIONS: [(Key, InputAction); 3] = [
    (Key::Space, InputAction::ToggleRun),
    (Key::R, InputAction::ResetIfIdle),
    (Key::Escape, InputAction::ForceStop),
];

pub struct MetronomoApp {
    scheduler: Scheduler<ToneGenerator, IndicatorBoard>,
    config: AppConfig,
    device: Option<String>,

    // Panels
    transport_panel: TransportPanel,
    meter_panel: MeterPanel,
    measures_panel: MeasuresPanel,
}

impl MetronomoApp {
    pub fn new(_cc: &CreationContext<'_>) -> Self {
        let config = load_config();

        let (tone, device) = if config.audio.enabled {
            let device = match default_device_info() {
                Ok((name, sample_rate, _channels)) => Some(format!("{} @ {}Hz", name, sample_rate)),
                Err(e) => {
                    tracing::warn!("No output device: {}", e);
                    None
                }
            };
            let tone = ToneGenerator::new();
            let available = tone.engine().is_some_and(|e| e.is_available());
            (tone, device.filter(|_| available))
        } else {
            tracing::info!("Audio disabled in config");
            (ToneGenerator::muted(), None)
        };

        let scheduler = Scheduler::with_display(
            config.metronome,
            tone,
            IndicatorBoard::new(),
            config.display.cell_width,
            config.display.pulse_duration(),
        );

        Self {
            scheduler,
            config,
            device,
            transport_panel: TransportPanel::new(),
            meter_panel: MeterPanel::new(),
            measures_panel: MeasuresPanel::new(),
        }
    }

    fn dispatch(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Start => {
                if let Err(e) = self.scheduler.start() {
                    tracing::error!("Failed to start metronome: {}", e);
                }
            }
            SchedulerCommand::Stop => self.scheduler.stop(),
            SchedulerCommand::Reset => self.scheduler.reset(),
        }
    }

    fn handle_input(&mut self, action: InputAction, text_focused: bool) {
        if let Some(command) = action.route(self.scheduler.run_state(), text_focused) {
            self.dispatch(command);
        }
    }

    fn report(result: Result<()>) {
        if let Err(e) = result {
            tracing::warn!("Rejected change: {}", e);
        }
    }
}

impl eframe::App for MetronomoApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        // Keyboard shortcuts (toggle/reset suppressed while typing)
        let text_focused = ctx.wants_keyboard_input();
        let pressed: Vec<InputAction> = ctx.input(|i| {
            KEY_ACTIONS
                .iter()
                .filter(|(key, _)| i.key_pressed(*key))
                .map(|(_, action)| *action)
                .collect()
        });
        for action in pressed {
            self.handle_input(action, text_focused);
        }

        let run_state = self.scheduler.run_state();
        let config = self.scheduler.config();

        // 1. Transport bar
        let transport_action = egui::TopBottomPanel::top("transport").show(ctx, |ui| {
            self.transport_panel.ui(ui, run_state, &config, self.device.as_deref())
        }).inner;

        match transport_action {
            TransportAction::ToggleRun => self.handle_input(InputAction::ToggleRun, false),
            TransportAction::Reset => self.dispatch(SchedulerCommand::Reset),
            TransportAction::SetBpm(bpm) => Self::report(self.scheduler.set_bpm(bpm)),
            TransportAction::Preset(name) => Self::report(self.scheduler.apply_preset(name)),
            TransportAction::None => {}
        }

        // 2. Meter bar
        let meter_action = egui::TopBottomPanel::top("meter").show(ctx, |ui| {
            self.meter_panel.ui(ui, &config)
        }).inner;

        match meter_action {
            MeterAction::NoteValue(v) => Self::report(self.scheduler.set_note_value(v)),
            MeterAction::Beats(v) => Self::report(self.scheduler.set_beats_per_measure(v)),
            MeterAction::Subdivisions(v) => Self::report(self.scheduler.set_subdivisions_per_beat(v)),
            MeterAction::None => {}
        }

        // 3. Measure grid
        let cell_width = self.config.display.cell_width;
        egui::CentralPanel::default().show(ctx, |ui| {
            self.scheduler.resize(ui.available_width());
            let board = self.scheduler.with_indicators(|sync| sync.sink().clone());
            self.measures_panel.ui(ui, &board, cell_width);
        });

        // Repaint often enough to catch every tick and the pulse expiry
        if self.scheduler.is_running() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.scheduler.stop();
        self.config.metronome = self.scheduler.config();
        save_config(&self.config);
    }
}
