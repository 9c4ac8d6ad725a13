use crate::{
    camera::OrbitCamera,
    color::ValueRange,
    config::AppConfig,
    data::{DataStore, Quantity},
    render::{PaneGpus, PointCloudGpu, SharedRender, Uniforms},
    scene::{RenderCache, RenderResult, Renderer, ScatterFigure},
    selection::Selection,
};
use anyhow::anyhow;
use colorous::Gradient;
use eframe::egui;
use egui_wgpu::{wgpu, CallbackTrait};
use std::sync::Arc;

const PANE_GAP: f32 = 8.0;
const LEGEND_SIZE: egui::Vec2 = egui::vec2(140.0, 10.0);
const BIG_STEP: i64 = 10;

const TITLE_FG: egui::Color32 = egui::Color32::from_rgb(44, 62, 80);
const TITLE_BG: egui::Color32 = egui::Color32::from_rgb(174, 214, 241);
const HINT_FG: egui::Color32 = egui::Color32::from_rgb(52, 73, 94);
const PANE_BG: egui::Color32 = egui::Color32::WHITE;
const ERROR_FG: egui::Color32 = egui::Color32::from_rgb(192, 57, 43);

struct PaneView {
    camera: OrbitCamera,
    shared: Arc<SharedRender>,
}

pub struct SnapvizApp {
    config: AppConfig,
    store: Arc<DataStore>,
    gradient: Gradient,

    selection: Selection,
    cache: RenderCache,
    shown_key: Option<(i64, String)>,
    shown: Option<RenderResult>,

    // Render plumbing
    panes: Vec<PaneView>,
    figure_id_gen: u64,

    // Playback
    playing: bool,
    play_last_time: Option<f64>,
    play_accum: f32,

    notes: String,
}

impl SnapvizApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        store: Arc<DataStore>,
    ) -> anyhow::Result<Self> {
        let rs = cc
            .wgpu_render_state
            .as_ref()
            .ok_or_else(|| anyhow!("eframe must be built with the wgpu renderer"))?;
        let target_format = rs.target_format;
        let adapter_info = rs.adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            device_type = ?adapter_info.device_type,
            backend = ?adapter_info.backend,
            "gpu ready"
        );

        let gradient = crate::color::gradient_named(&config.view.colorscale)
            .ok_or_else(|| anyhow!("unknown colorscale `{}`", config.view.colorscale))?;
        let selection = Selection::new(&store);
        let panes = Quantity::ALL
            .iter()
            .map(|_| PaneView {
                camera: OrbitCamera::from_pose(&config.view.camera),
                shared: Arc::new(SharedRender::new(target_format)),
            })
            .collect();

        cc.egui_ctx.set_visuals(Self::visuals(&config));

        Ok(Self {
            config,
            store,
            gradient,
            selection,
            cache: RenderCache::default(),
            shown_key: None,
            shown: None,
            panes,
            figure_id_gen: 0,
            playing: false,
            play_last_time: None,
            play_accum: 0.0,
            notes: String::new(),
        })
    }

    fn visuals(config: &AppConfig) -> egui::Visuals {
        let [r, g, b] = config.view.background;
        let mut visuals = egui::Visuals::light();
        visuals.panel_fill = egui::Color32::from_rgb(r, g, b);
        visuals.window_fill = egui::Color32::from_rgb(r, g, b);
        visuals
    }

    /// Re-renders when the selection moved and pushes the new point data to
    /// every pane.
    fn refresh_figures(&mut self) {
        let (step, dataset) = self.selection.key();
        let dataset = dataset.to_string();
        if self
            .shown_key
            .as_ref()
            .is_some_and(|(s, d)| *s == step && *d == dataset)
        {
            return;
        }

        let renderer = Renderer::new(&self.store, &self.config.view, self.gradient);
        let result = self.cache.get_or_render(&renderer, step, &dataset);

        for (quantity, pane) in Quantity::ALL.into_iter().zip(self.panes.iter_mut()) {
            self.figure_id_gen += 1;
            let (positions, colors) = match result.as_ref() {
                Ok(figs) => {
                    let fig = figs.figure(quantity);
                    let positions: Vec<[f32; 4]> =
                        fig.positions.iter().map(|p| [p[0], p[1], p[2], 1.0]).collect();
                    (positions, fig.colors.clone())
                }
                Err(_) => (Vec::new(), Vec::new()),
            };
            // Every step is viewed from the same pose.
            pane.camera = OrbitCamera::from_pose(&self.config.view.camera);
            let mut p = pane.shared.params.lock();
            p.figure_id = self.figure_id_gen;
            p.positions = Arc::new(positions);
            p.colors = Arc::new(colors);
        }

        tracing::debug!(step, dataset = %dataset, cached = self.cache.len(), "figures updated");
        self.shown_key = Some((step, dataset));
        self.shown = Some(result);
    }

    fn maybe_update_playback(&mut self, ctx: &egui::Context) {
        if !self.playing {
            return;
        }
        let now = ctx.input(|i| i.time);
        let last = self.play_last_time.unwrap_or(now);
        let dt = (now - last) as f32;
        self.play_last_time = Some(now);
        self.play_accum += dt * self.config.playback.steps_per_second.max(0.0);
        while self.play_accum >= 1.0 {
            self.play_accum -= 1.0;
            self.selection.advance(1, true);
        }
        ctx.request_repaint();
    }

    fn toggle_playback(&mut self, ctx: &egui::Context) {
        self.playing = !self.playing;
        self.play_accum = 0.0;
        self.play_last_time = if self.playing {
            Some(ctx.input(|i| i.time))
        } else {
            None
        };
    }

    fn handle_hotkeys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.toggle_playback(ctx);
        }
        let moves = [
            (egui::Key::ArrowRight, 1),
            (egui::Key::ArrowLeft, -1),
            (egui::Key::ArrowUp, BIG_STEP),
            (egui::Key::ArrowDown, -BIG_STEP),
        ];
        for (key, delta) in moves {
            if ctx.input(|i| i.key_pressed(key)) {
                self.selection.advance(delta, false);
            }
        }
    }

    fn ui_header(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        egui::Frame::new()
            .fill(TITLE_BG)
            .corner_radius(5.0)
            .inner_margin(10.0)
            .show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(
                        egui::RichText::new(&self.config.title)
                            .heading()
                            .color(TITLE_FG),
                    );
                });
            });
        ui.add_space(6.0);
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new(&self.config.hint).color(HINT_FG));
            ui.label(
                egui::RichText::new("Space plays, arrow keys step.")
                    .small()
                    .color(HINT_FG),
            );
        });

        ui.horizontal(|ui| {
            let label = if self.playing { "Pause" } else { "Play" };
            if ui.button(label).clicked() {
                self.toggle_playback(ctx);
            }

            let range = self.selection.range();
            let mut step = self.selection.step();
            let slider_width = (ui.available_width() * 0.6).max(120.0);
            ui.spacing_mut().slider_width = slider_width;
            let resp = ui.add(
                egui::Slider::new(&mut step, range.min..=range.max)
                    .integer()
                    .text("step"),
            );
            if resp.changed() {
                self.selection.set_step(step);
            }

            if self.selection.has_choice() {
                ui.separator();
                let store = self.store.clone();
                let current = self.selection.dataset().to_string();
                let selected_label = store
                    .dataset(&current)
                    .map(|d| d.label.clone())
                    .unwrap_or(current.clone());
                let mut picked: Option<String> = None;
                egui::ComboBox::from_label("Data series")
                    .selected_text(selected_label)
                    .show_ui(ui, |ui| {
                        for ds in store.datasets() {
                            if ui.selectable_label(ds.name == current, &ds.label).clicked() {
                                picked = Some(ds.name.clone());
                            }
                        }
                    });
                if let Some(name) = picked {
                    self.selection.set_dataset(&name);
                }
            }

            if let Some(Ok(figs)) = self.shown.as_deref() {
                ui.separator();
                ui.label(format!(
                    "{} step {} | aspect {}:{}:{}",
                    figs.dataset,
                    figs.step,
                    format_scale_value(figs.aspect.x as f32),
                    format_scale_value(figs.aspect.y as f32),
                    format_scale_value(figs.aspect.z as f32),
                ));
            }
        });
    }

    fn ui_notes(&mut self, ui: &mut egui::Ui) {
        ui.label("Some notes:");
        for note in &self.config.notes {
            ui.label(format!("\u{2022} {note}"));
        }
        ui.add(
            egui::TextEdit::multiline(&mut self.notes)
                .hint_text("Enter your notes here...")
                .desired_width(f32::INFINITY)
                .desired_rows(4),
        );
    }

    fn ui_panes(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let area = ui.available_rect_before_wrap();
        let w = ((area.width() - PANE_GAP) * 0.5).max(1.0);
        let h = ((area.height() - PANE_GAP) * 0.5).max(1.0);
        for idx in 0..self.panes.len() {
            let col = (idx % 2) as f32;
            let row = (idx / 2) as f32;
            let min = area.min + egui::vec2(col * (w + PANE_GAP), row * (h + PANE_GAP));
            let rect = egui::Rect::from_min_size(min, egui::vec2(w, h));
            self.ui_pane(ui, ctx, idx, rect);
        }
        ui.allocate_rect(area, egui::Sense::hover());
    }

    fn ui_pane(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, idx: usize, rect: egui::Rect) {
        let response = ui.interact(rect, ui.id().with(("pane", idx)), egui::Sense::click_and_drag());
        ui.painter().rect_filled(rect, 4.0, PANE_BG);

        let Some(result) = self.shown.clone() else {
            return;
        };
        let figs = match result.as_ref() {
            Ok(figs) => figs,
            Err(err) => {
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    format!("Cannot render {}:\n{err}", Quantity::ALL[idx].label()),
                    egui::FontId::proportional(14.0),
                    ERROR_FG,
                );
                return;
            }
        };
        let fig = &figs.figures[idx];
        let pane = &mut self.panes[idx];

        // Interactions
        if response.dragged() {
            let delta = response.drag_delta();
            let ppp = ctx.pixels_per_point();
            pane.camera.orbit_by_pixels([delta.x * ppp, delta.y * ppp]);
        }
        if response.hovered() {
            let scroll = ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll.abs() > 0.0 {
                pane.camera.zoom((1.0 + scroll * 0.0015).clamp(0.8, 1.25));
            }
        }
        if response.double_clicked() {
            pane.camera = OrbitCamera::from_pose(&fig.camera);
        }

        // Update uniforms for this pane
        let ppp = ctx.pixels_per_point();
        let uniforms = Uniforms {
            view_proj: pane
                .camera
                .view_proj(rect.aspect_ratio(), self.config.view.fov_y_deg)
                .to_cols_array_2d(),
            model: fig.scene_transform().to_cols_array_2d(),
            viewport_px: [rect.width() * ppp, rect.height() * ppp],
            point_size_px: fig.marker.size * ppp,
            opacity: fig.marker.opacity,
        };
        pane.shared.params.lock().uniforms = uniforms;

        // Submit paint callback
        let cb = PointCloudCallback {
            pane: idx,
            shared: pane.shared.clone(),
        };
        ui.painter().add(egui_wgpu::Callback::new_paint_callback(rect, cb));

        draw_pane_overlay(ui.painter(), rect, fig, &self.gradient);
    }
}

fn draw_pane_overlay(painter: &egui::Painter, rect: egui::Rect, fig: &ScatterFigure, gradient: &Gradient) {
    painter.text(
        rect.center_top() + egui::vec2(0.0, 8.0),
        egui::Align2::CENTER_TOP,
        &fig.title,
        egui::FontId::proportional(15.0),
        TITLE_FG,
    );
    let missing = fig.values.iter().filter(|v| !v.is_finite()).count();
    let count = match (fig.is_empty(), missing) {
        (true, _) => "no points for this step".to_string(),
        (false, 0) => format!("{} points", fig.len()),
        (false, m) => format!("{} points ({m} without value)", fig.len()),
    };
    painter.text(
        rect.left_bottom() + egui::vec2(8.0, -8.0),
        egui::Align2::LEFT_BOTTOM,
        count,
        egui::FontId::proportional(12.0),
        TITLE_FG,
    );
    if let Some(range) = fig.color_range {
        let origin = rect.right_bottom() - egui::vec2(LEGEND_SIZE.x + 8.0, LEGEND_SIZE.y + 26.0);
        draw_gradient_legend(painter, origin, fig.quantity.label(), range, gradient);
    }
}

fn draw_gradient_legend(
    painter: &egui::Painter,
    origin: egui::Pos2,
    label: &str,
    range: ValueRange,
    gradient: &Gradient,
) {
    let bar = egui::Rect::from_min_size(origin, LEGEND_SIZE);
    let steps = 32;
    let seg_w = bar.width() / steps as f32;
    for i in 0..steps {
        let t = i as f32 / (steps - 1) as f32;
        let c = gradient.eval_continuous(t as f64);
        let x0 = bar.left() + seg_w * i as f32;
        let seg = egui::Rect::from_min_size(egui::pos2(x0, bar.top()), egui::vec2(seg_w + 1.0, bar.height()));
        painter.rect_filled(seg, 0.0, egui::Color32::from_rgb(c.r, c.g, c.b));
    }
    let font = egui::FontId::proportional(11.0);
    painter.text(
        bar.center_top() - egui::vec2(0.0, 3.0),
        egui::Align2::CENTER_BOTTOM,
        label,
        font.clone(),
        TITLE_FG,
    );
    painter.text(
        bar.left_bottom() + egui::vec2(0.0, 3.0),
        egui::Align2::LEFT_TOP,
        format_scale_value(range.min),
        font.clone(),
        TITLE_FG,
    );
    painter.text(
        bar.right_bottom() + egui::vec2(0.0, 3.0),
        egui::Align2::RIGHT_TOP,
        format_scale_value(range.max),
        font,
        TITLE_FG,
    );
}

impl eframe::App for SnapvizApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_hotkeys(ctx);
        self.maybe_update_playback(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.ui_header(ui, ctx);
        });

        egui::TopBottomPanel::bottom("notes")
            .resizable(true)
            .default_height(150.0)
            .min_height(80.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                    self.ui_notes(ui);
                });
            });

        // The header may have moved the selection this frame.
        self.refresh_figures();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.ui_panes(ui, ctx);
        });
    }
}

struct PointCloudCallback {
    pane: usize,
    shared: Arc<SharedRender>,
}

impl CallbackTrait for PointCloudCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        _egui_encoder: &mut wgpu::CommandEncoder,
        callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if callback_resources.get::<PaneGpus>().is_none() {
            callback_resources.insert(PaneGpus::default());
        }
        let Some(gpus) = callback_resources.get_mut::<PaneGpus>() else {
            return Vec::new();
        };

        let p = self.shared.params.lock();
        // Create GPU resources once per pane
        let gpu = gpus
            .panes
            .entry(self.pane)
            .or_insert_with(|| PointCloudGpu::new(device, p.target_format));

        if let Err(err) = gpu.prepare(device, queue, &p) {
            tracing::error!(pane = self.pane, error = %err, "point upload failed");
        }

        Vec::new()
    }

    fn paint(
        &self,
        _info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        callback_resources: &egui_wgpu::CallbackResources,
    ) {
        let Some(gpu) = callback_resources
            .get::<PaneGpus>()
            .and_then(|g| g.panes.get(&self.pane))
        else {
            return;
        };
        gpu.paint(render_pass);
    }
}

fn format_scale_value(v: f32) -> String {
    let av = v.abs();
    if av > 0.0 && (av < 0.01 || av >= 1000.0) {
        format!("{v:.2e}")
    } else {
        format!("{v:.3}")
    }
}
