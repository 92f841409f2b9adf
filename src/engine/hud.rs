// Heads-up display: the build status line and the F3 stats panel, painted
// with egui over the finished 3D pass.

/// Numbers shown in the stats panel, gathered once per frame.
pub struct ViewerStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    pub camera_distance: f32,
    /// Name of the entity in the head slot.
    pub head_name: String,
    pub head_vertices: usize,
    pub head_triangles: usize,
    /// Time taken by the last completed build (ms). 0 if none yet.
    pub build_ms: f32,
}

impl ViewerStats {
    /// Panel text, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let build = if self.build_ms > 0.0 {
            format!("last build {:.0} ms", self.build_ms)
        } else {
            "no build yet".to_string()
        };
        vec![
            format!(
                "{} fps  {:.2} ms ({:.1}..{:.1})",
                self.fps, self.frame_time_avg_ms, self.frame_time_min_ms, self.frame_time_max_ms
            ),
            format!("{} draw calls  {}x{}", self.draw_calls, self.resolution.0, self.resolution.1),
            format!("camera at {:.2}", self.camera_distance),
            format!("{}: {} verts, {} tris", self.head_name, self.head_vertices, self.head_triangles),
            build,
        ]
    }
}

pub const STATUS_AREA: &str = "hud-status";
pub const STATS_AREA: &str = "hud-stats";

/// Lay out one HUD frame. The status line is always shown.
pub fn layout(ctx: &egui::Context, status: &str, stats: Option<&ViewerStats>) {
    text_box(ctx, STATUS_AREA, egui::Align2::LEFT_BOTTOM, egui::vec2(10.0, -10.0), &[status]);
    if let Some(stats) = stats {
        let lines = stats.lines();
        text_box(ctx, STATS_AREA, egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0), lines.as_slice());
    }
}

fn text_box<S: AsRef<str>>(ctx: &egui::Context, id: &str, anchor: egui::Align2, offset: egui::Vec2, lines: &[S]) {
    egui::Area::new(egui::Id::new(id)).anchor(anchor, offset).show(ctx, |ui| {
        egui::Frame::popup(ui.style()).show(ui, |ui| {
            for line in lines {
                ui.monospace(line.as_ref());
            }
        });
    });
}

/// Where a HUD frame is painted.
pub struct HudTarget<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
    pub screen: egui_wgpu::ScreenDescriptor,
}

pub struct Hud {
    pub show_stats: bool,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl Hud {
    pub fn new(window: &winit::window::Window, device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let ctx = egui::Context::default();
        ctx.set_visuals(egui::Visuals::dark());
        let state = egui_winit::State::new(
            ctx,
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        // No depth attachment, single sample, no dithering.
        let renderer = egui_wgpu::Renderer::new(device, format, None, 1, false);
        Self { show_stats: false, state, renderer }
    }

    /// Feed a window event to egui. Returns true when egui consumed it.
    pub fn on_window_event(&mut self, window: &winit::window::Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn paint(
        &mut self,
        target: HudTarget<'_>,
        window: &winit::window::Window,
        status: &str,
        stats: Option<&ViewerStats>,
    ) {
        let input = self.state.take_egui_input(window);
        let ctx = self.state.egui_ctx().clone();
        let output = ctx.run(input, |ctx| layout(ctx, status, stats));
        self.state.handle_platform_output(window, output.platform_output);
        let jobs = ctx.tessellate(output.shapes, output.pixels_per_point);

        let HudTarget { device, queue, encoder, view, screen } = target;
        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        self.renderer.update_buffers(device, queue, encoder, &jobs, &screen);
        {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hud"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })],
                ..Default::default()
            });
            self.renderer.render(&mut pass.forget_lifetime(), &jobs, &screen);
        }
        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
