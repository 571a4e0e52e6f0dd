//! Parameter panel.
//!
//! Four sliders and a dither toggle, drawn with egui. Edits land directly in
//! the [`RenderParameters`] the next frame renders with.

use egui::Ui;

use crate::params::{RenderParameters, BAND_RANGE, FLOAT_STEP, OPACITY_RANGE, STEPS_RANGE, THRESHOLD_RANGE};

/// Show the panel window. Returns true if any parameter changed.
pub fn show_panel(ctx: &egui::Context, params: &mut RenderParameters, fps: f32) -> bool {
    let mut changed = false;
    egui::Window::new("Cloud")
        .default_pos([12.0, 12.0])
        .resizable(false)
        .show(ctx, |ui| {
            changed = render_params_panel(ui, params, fps);
        });
    changed
}

/// Slider block for the ray march parameters.
pub fn render_params_panel(ui: &mut Ui, params: &mut RenderParameters, fps: f32) -> bool {
    let mut changed = false;

    changed |= ui
        .add(
            egui::Slider::new(&mut params.threshold, THRESHOLD_RANGE)
                .text("threshold")
                .step_by(FLOAT_STEP),
        )
        .on_hover_text("Density at which the cloud starts")
        .changed();

    changed |= ui
        .add(
            egui::Slider::new(&mut params.opacity, OPACITY_RANGE)
                .text("opacity")
                .step_by(FLOAT_STEP),
        )
        .on_hover_text("How much each step of dense gas covers")
        .changed();

    changed |= ui
        .add(
            egui::Slider::new(&mut params.range, BAND_RANGE)
                .text("range")
                .step_by(FLOAT_STEP),
        )
        .on_hover_text("Softness of the cloud edge around the threshold")
        .changed();

    changed |= ui
        .add(
            egui::Slider::new(&mut params.steps, STEPS_RANGE)
                .text("steps")
                .step_by(1.0),
        )
        .on_hover_text("Samples per ray. 0 hides the cloud.")
        .changed();

    changed |= ui
        .checkbox(&mut params.dither, "dither")
        .on_hover_text("Jitter ray starts to trade banding for noise")
        .changed();

    ui.separator();
    ui.label(egui::RichText::new(format!("{:.0} fps", fps)).small().weak());

    changed
}
