//! Measure grid: one cell per visible measure, one dot per subdivision

use egui::{pos2, Align2, Color32, FontId, Rect, Sense, Stroke, StrokeKind, Ui, Vec2};
use metronomo_core::{IndicatorBoard, MeasureCell};

const CELL_HEIGHT: f32 = 72.0;
const CELL_GAP: f32 = 6.0;
const DOT_RADIUS: f32 = 5.0;

const ACCENT: Color32 = Color32::from_rgb(230, 150, 60);
const ACTIVE_FILL: Color32 = Color32::from_rgb(60, 90, 140);
const IDLE_FILL: Color32 = Color32::from_gray(35);
const DOT_ON: Color32 = Color32::from_rgb(250, 220, 90);
const DOT_OFF: Color32 = Color32::from_gray(80);
const PULSE: Color32 = Color32::from_rgba_premultiplied(90, 160, 255, 60);

pub struct MeasuresPanel;

impl MeasuresPanel {
    pub fn new() -> Self {
        Self
    }

    pub fn ui(&mut self, ui: &mut Ui, board: &IndicatorBoard, cell_width: f32) {
        let width = ui.available_width().max(cell_width);
        let per_row = ((width / cell_width).floor() as usize).max(1);
        let rows = board.measures().len().div_ceil(per_row).max(1);
        let height = rows as f32 * (CELL_HEIGHT + CELL_GAP);

        let (response, painter) = ui.allocate_painter(Vec2::new(width, height), Sense::hover());
        let origin = response.rect.min;

        for cell in board.measures() {
            let row = cell.index / per_row;
            let col = cell.index % per_row;
            let min = origin + Vec2::new(col as f32 * cell_width, row as f32 * (CELL_HEIGHT + CELL_GAP));
            let rect = Rect::from_min_size(min, Vec2::new(cell_width - CELL_GAP, CELL_HEIGHT));
            Self::draw_cell(&painter, rect, cell, board.subdivisions_of(cell));
        }

        // Full-area flash; expires on its own
        if board.is_pulsing() {
            painter.rect_filled(response.rect.expand(4.0), 6.0, PULSE);
        }
    }

    fn draw_cell(painter: &egui::Painter, rect: Rect, cell: &MeasureCell, subdivisions: &[bool]) {
        let fill = if cell.active { ACTIVE_FILL } else { IDLE_FILL };
        painter.rect_filled(rect, 4.0, fill);

        let stroke = if cell.is_accent {
            Stroke::new(2.0, ACCENT)
        } else {
            Stroke::new(1.0, Color32::from_gray(70))
        };
        painter.rect_stroke(rect, 4.0, stroke, StrokeKind::Inside);

        painter.text(
            pos2(rect.center().x, rect.top() + 18.0),
            Align2::CENTER_CENTER,
            (cell.index + 1).to_string(),
            FontId::proportional(16.0),
            Color32::from_gray(220),
        );

        if subdivisions.is_empty() {
            return;
        }
        let step = rect.width() / subdivisions.len() as f32;
        let y = rect.bottom() - 20.0;
        for (i, &on) in subdivisions.iter().enumerate() {
            let center = pos2(rect.left() + step * (i as f32 + 0.5), y);
            let radius = DOT_RADIUS.min(step * 0.4);
            painter.circle_filled(center, radius, if on { DOT_ON } else { DOT_OFF });
        }
    }
}
