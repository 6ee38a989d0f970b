use egui::Context;

use crate::config::Config;
use crate::controller::FrameStats;

/// Values the settings panel edits in place; the frame loop reads them every frame
#[derive(Debug, Clone, PartialEq)]
pub struct Tweakables {
    pub gravity_y: f32,
    pub force_magnitude: f32,
    pub impulse_magnitude: f32,
    pub fov_deg: f32,
    pub orbit_damping: f32,
}

impl Default for Tweakables {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Tweakables {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gravity_y: config.physics.gravity[1],
            force_magnitude: config.input.force_magnitude,
            impulse_magnitude: config.input.impulse_magnitude,
            fov_deg: config.camera.fov_deg,
            orbit_damping: config.camera.orbit_damping,
        }
    }

    pub fn field_mut(&mut self, field: TweakField) -> &mut f32 {
        match field {
            TweakField::GravityY => &mut self.gravity_y,
            TweakField::ForceMagnitude => &mut self.force_magnitude,
            TweakField::ImpulseMagnitude => &mut self.impulse_magnitude,
            TweakField::FovDeg => &mut self.fov_deg,
            TweakField::OrbitDamping => &mut self.orbit_damping,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakField {
    GravityY,
    ForceMagnitude,
    ImpulseMagnitude,
    FovDeg,
    OrbitDamping,
}

/// Slider descriptor bound to one live field
#[derive(Debug, Clone, Copy)]
pub struct NumericField {
    pub label: &'static str,
    pub field: TweakField,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl NumericField {
    const fn new(label: &'static str, field: TweakField, min: f32, max: f32, step: f32) -> Self {
        Self { label, field, min, max, step }
    }
}

/// Collapsible folders of the settings window, in display order
pub const FOLDERS: &[(&str, &[NumericField])] = &[
    ("World", &[NumericField::new("gravity y", TweakField::GravityY, -30.0, 10.0, 0.01)]),
    (
        "Input",
        &[
            NumericField::new("force", TweakField::ForceMagnitude, 0.0, 100.0, 0.5),
            NumericField::new("impulse", TweakField::ImpulseMagnitude, 0.0, 2.0, 0.01),
        ],
    ),
    (
        "Camera",
        &[
            NumericField::new("fov", TweakField::FovDeg, 30.0, 120.0, 1.0),
            NumericField::new("orbit damping", TweakField::OrbitDamping, 0.0, 1.0, 0.01),
        ],
    ),
];

/// Tessellated egui output, ready for the renderer's overlay pass
pub struct Overlay {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
    /// Cursor and clipboard requests for the host; renderers ignore it
    pub platform_output: egui::PlatformOutput,
}

impl Overlay {
    /// Replaces an undrawn `older` overlay, keeping its texture uploads and frees
    /// ahead of this one's so nothing egui sent once is lost.
    pub fn superseding(mut self, older: Overlay) -> Self {
        let mut textures_delta = older.textures_delta;
        textures_delta.append(std::mem::take(&mut self.textures_delta));
        self.textures_delta = textures_delta;
        self
    }
}

/// Build the stats and settings windows for one frame
pub fn build_overlay(
    egui_ctx: &Context,
    raw_input: egui::RawInput,
    tweaks: &mut Tweakables,
    stats: &FrameStats,
) -> Overlay {
    let full_output = egui_ctx.run(raw_input, |ctx| {
        draw_stats_window(ctx, stats);
        draw_settings_window(ctx, tweaks);
    });

    let pixels_per_point = full_output.pixels_per_point;
    let primitives = egui_ctx.tessellate(full_output.shapes, pixels_per_point);
    Overlay {
        primitives,
        textures_delta: full_output.textures_delta,
        pixels_per_point,
        platform_output: full_output.platform_output,
    }
}

fn draw_stats_window(ctx: &Context, stats: &FrameStats) {
    egui::Window::new("Stats")
        .default_pos([8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(format!("FPS: {:.0}", stats.fps)).small());
            ui.label(egui::RichText::new(format!("Frame: {:.1} ms", stats.frame_ms)).small());
            ui.label(egui::RichText::new(format!("Frames: {}", stats.frames)).small());
        });
}

fn draw_settings_window(ctx: &Context, tweaks: &mut Tweakables) {
    let width = ctx.available_rect().width();
    egui::Window::new("Settings")
        .default_pos([width - 220.0, 8.0])
        .default_width(210.0)
        .show(ctx, |ui| {
            for (folder, fields) in FOLDERS {
                egui::CollapsingHeader::new(*folder)
                    .default_open(true)
                    .show(ui, |ui| {
                        for field in fields.iter() {
                            let value = tweaks.field_mut(field.field);
                            ui.add(
                                egui::Slider::new(value, field.min..=field.max)
                                    .step_by(field.step as f64)
                                    .text(field.label),
                            );
                        }
                    });
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sit_inside_slider_ranges() {
        let mut tweaks = Tweakables::default();
        for (_, fields) in FOLDERS {
            for field in fields.iter() {
                let v = *tweaks.field_mut(field.field);
                assert!(v >= field.min && v <= field.max, "{} = {v}", field.label);
            }
        }
    }

    #[test]
    fn every_tweakable_has_a_slider() {
        let all = [
            TweakField::GravityY,
            TweakField::ForceMagnitude,
            TweakField::ImpulseMagnitude,
            TweakField::FovDeg,
            TweakField::OrbitDamping,
        ];
        for f in all {
            assert!(FOLDERS.iter().any(|(_, fields)| fields.iter().any(|n| n.field == f)), "{f:?}");
        }
    }

    fn overlay_freeing(ids: &[u64]) -> Overlay {
        let mut textures_delta = egui::TexturesDelta::default();
        textures_delta.free = ids.iter().map(|&id| egui::TextureId::Managed(id)).collect();
        Overlay {
            primitives: Vec::new(),
            textures_delta,
            pixels_per_point: 2.0,
            platform_output: egui::PlatformOutput::default(),
        }
    }

    #[test]
    fn superseded_overlay_keeps_pending_texture_changes() {
        let merged = overlay_freeing(&[3]).superseding(overlay_freeing(&[1, 2]));
        let freed: Vec<_> = merged.textures_delta.free.clone();
        assert_eq!(
            freed,
            vec![egui::TextureId::Managed(1), egui::TextureId::Managed(2), egui::TextureId::Managed(3)]
        );
        assert_eq!(merged.pixels_per_point, 2.0);
    }

    #[test]
    fn first_overlay_carries_the_font_atlas_forward() {
        let ctx = Context::default();
        let mut tweaks = Tweakables::default();
        let stats = FrameStats::new();
        let raw_input = || egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0))),
            ..Default::default()
        };
        let first = build_overlay(&ctx, raw_input(), &mut tweaks, &stats);
        assert!(!first.textures_delta.set.is_empty());
        let uploads = first.textures_delta.set.len();

        let second = build_overlay(&ctx, raw_input(), &mut tweaks, &stats).superseding(first);
        assert!(second.textures_delta.set.len() >= uploads);
    }

    #[test]
    fn overlay_without_input_leaves_values_alone() {
        let ctx = Context::default();
        let mut tweaks = Tweakables::default();
        let stats = FrameStats::new();
        for _ in 0..2 {
            let raw_input = egui::RawInput {
                screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0))),
                ..Default::default()
            };
            build_overlay(&ctx, raw_input, &mut tweaks, &stats);
        }
        assert_eq!(tweaks, Tweakables::default());
    }
}
