// head_sculpt: build a textured 3D head from a face photo and inspect it.
//
// `view` opens an orbit viewer; drop a photo on the window (or pass one on
// the command line) to build a head on a worker thread.
// `bake` runs the same pipeline headless and writes the face texture.
// `freeze-topology` derives the fixed face triangle table from a reference
// photo and writes it into the topology file.

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glam::Mat4;
use log::{error, info, warn};
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use head_sculpt::config::HeadConfig;
use head_sculpt::engine::camera::OrbitCamera;
use head_sculpt::engine::input::InputState;
use head_sculpt::engine::hud::{Hud, HudTarget, ViewerStats};
use head_sculpt::engine::render::HeadRenderer;
use head_sculpt::engine::scene::{BuildTicket, HeadModel, Scene};
use head_sculpt::head::texture_bake::encode_jpeg;
use head_sculpt::head::{
    run_build, BuildOutcome, FaceTopology, HeadBuilder, LandmarkSource, Photo, SidecarLandmarkSource, Status,
};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(name = "head_sculpt", about = "Build a textured 3D head from a face photo")]
struct Cli {
    /// TOML configuration file (defaults are used for anything missing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the viewer (default)
    View {
        /// Photo to build from at startup
        photo: Option<PathBuf>,
    },
    /// Build without a window and write the baked face texture as JPEG
    Bake {
        photo: PathBuf,
        #[arg(long, default_value = "face_texture.jpg")]
        texture_out: PathBuf,
    },
    /// Triangulate a frontal reference photo's landmarks once and store the
    /// table in the topology file
    FreezeTopology {
        reference: PathBuf,
        /// Output file (defaults to the configured topology file)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

// ============================================================================
// WORKER MESSAGES
// ============================================================================

enum WorkerMessage {
    Status(BuildTicket, Status),
    Finished {
        ticket: BuildTicket,
        result: Result<BuildOutcome, &'static str>,
        elapsed_ms: f32,
    },
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct FrameTimer {
    frames: u32,
    sum_ms: f32,
    min_ms: f32,
    max_ms: f32,
    window_start: Instant,
    // Last completed one-second window
    fps: u32,
    avg_ms: f32,
    shown_min_ms: f32,
    shown_max_ms: f32,
}

impl FrameTimer {
    fn new() -> Self {
        Self {
            frames: 0,
            sum_ms: 0.0,
            min_ms: f32::MAX,
            max_ms: 0.0,
            window_start: Instant::now(),
            fps: 0,
            avg_ms: 0.0,
            shown_min_ms: 0.0,
            shown_max_ms: 0.0,
        }
    }

    fn record(&mut self, frame_ms: f32) {
        self.frames += 1;
        self.sum_ms += frame_ms;
        self.min_ms = self.min_ms.min(frame_ms);
        self.max_ms = self.max_ms.max(frame_ms);
        if self.window_start.elapsed().as_secs_f32() >= 1.0 {
            self.fps = self.frames;
            self.avg_ms = self.sum_ms / self.frames as f32;
            self.shown_min_ms = self.min_ms;
            self.shown_max_ms = self.max_ms;
            self.frames = 0;
            self.sum_ms = 0.0;
            self.min_ms = f32::MAX;
            self.max_ms = 0.0;
            self.window_start = Instant::now();
        }
    }
}

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    renderer: HeadRenderer,
    hud: Hud,

    scene: Scene,
    camera: OrbitCamera,
    input: InputState,
    last_update: Instant,
    timer: FrameTimer,

    builder: Arc<HeadBuilder>,
    source: Arc<dyn LandmarkSource>,
    tx: mpsc::Sender<WorkerMessage>,
    rx: mpsc::Receiver<WorkerMessage>,
    latest_build: Option<BuildTicket>,
    last_build_ms: f32,
    status: String,
}

impl State {
    async fn new(window: Arc<Window>, builder: Arc<HeadBuilder>, source: Arc<dyn LandmarkSource>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let renderer = HeadRenderer::new(&device, &queue, surface_format, config.width, config.height);
        let hud = Hud::new(&window, &device, surface_format);

        let viewer = &builder.config().viewer;
        let mut scene = Scene::new(viewer.idle_spin);
        scene.show_placeholder();
        let camera = OrbitCamera::new(viewer.camera_distance);

        let (tx, rx) = mpsc::channel();

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            renderer,
            hud,
            scene,
            camera,
            input: InputState::new(),
            last_update: Instant::now(),
            timer: FrameTimer::new(),
            builder,
            source,
            tx,
            rx,
            latest_build: None,
            last_build_ms: 0.0,
            status: "Drop a photo to build a head".to_string(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.renderer.resize(&self.device, new_size.width, new_size.height);
        }
    }

    /// Start a build on a worker thread. Older in-flight builds keep running
    /// but their results are dropped on arrival.
    fn start_build(&mut self, path: PathBuf) {
        let ticket = self.scene.begin_build();
        self.latest_build = Some(ticket);
        info!("building head from {}", path.display());

        let builder = Arc::clone(&self.builder);
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let started = Instant::now();
            let mut report = |status: Status| {
                let _ = tx.send(WorkerMessage::Status(ticket, status));
            };
            let result = run_build(source.as_ref(), &builder, &path, &mut report);
            let _ = tx.send(WorkerMessage::Finished {
                ticket,
                result: result.map_err(|e| e.status_message()),
                elapsed_ms: started.elapsed().as_secs_f32() * 1000.0,
            });
        });
    }

    fn poll_builds(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            match message {
                WorkerMessage::Status(ticket, status) => {
                    if Some(ticket) == self.latest_build {
                        self.status = status.to_string();
                    }
                }
                WorkerMessage::Finished { ticket, result, elapsed_ms } => {
                    if let Ok(BuildOutcome::Built(node)) = result {
                        if self.scene.commit_head(ticket, *node) {
                            self.last_build_ms = elapsed_ms;
                        }
                    }
                }
            }
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;

        self.input.begin_frame();
        self.camera.update(&self.input);
        if self.input.was_key_pressed(KeyCode::F3) {
            self.hud.show_stats = !self.hud.show_stats;
        }
        if let Some(path) = self.input.take_dropped_file() {
            self.start_build(path);
        }
        self.input.end_frame();

        self.poll_builds();
        self.scene.update(dt);
        self.timer.record(dt * 1000.0);
    }

    fn stats(&mut self, draw_calls: u32) -> ViewerStats {
        let (head_name, head_vertices, head_triangles) = match self.scene.current_head() {
            Some((name, _, HeadModel::Placeholder(mesh))) => {
                (name.0.clone(), mesh.vertices.len(), mesh.index_count() / 3)
            }
            Some((name, _, HeadModel::Built(node))) => (name.0.clone(), node.vertex_count(), node.triangle_count()),
            None => ("-".to_string(), 0, 0),
        };
        ViewerStats {
            fps: self.timer.fps,
            frame_time_avg_ms: self.timer.avg_ms,
            frame_time_min_ms: self.timer.shown_min_ms,
            frame_time_max_ms: self.timer.shown_max_ms,
            draw_calls,
            resolution: (self.size.width, self.size.height),
            camera_distance: self.camera.distance(),
            head_name,
            head_vertices,
            head_triangles,
            build_ms: self.last_build_ms,
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.renderer.sync(&self.device, &self.queue, &mut self.scene);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let aspect = self.config.width as f32 / self.config.height as f32;
        let model = self
            .scene
            .current_head()
            .map(|(_, transform, _)| transform.matrix())
            .unwrap_or(Mat4::IDENTITY);
        self.renderer.update_camera(
            &self.queue,
            self.camera.view_projection(aspect),
            model,
            self.camera.camera_position(),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let draw_calls = {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.1,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.renderer.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.renderer.draw(&mut render_pass)
        };

        let stats = if self.hud.show_stats { Some(self.stats(draw_calls)) } else { None };
        let target = HudTarget {
            device: &self.device,
            queue: &self.queue,
            encoder: &mut encoder,
            view: &view,
            screen: egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.config.width, self.config.height],
                pixels_per_point: self.window.scale_factor() as f32,
            },
        };
        self.hud.paint(target, &self.window, &self.status, stats.as_ref());

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn bake(builder: &HeadBuilder, source: &dyn LandmarkSource, photo: &Path, texture_out: &Path) -> Result<()> {
    let mut report = |status: Status| info!("{status}");
    match run_build(source, builder, photo, &mut report)? {
        BuildOutcome::NoFace => bail!("no face detected in {}", photo.display()),
        BuildOutcome::Built(node) => {
            let quality = builder.config().texture.jpeg_quality;
            let jpeg = encode_jpeg(&node.mesh.face_texture, quality)?;
            std::fs::write(texture_out, jpeg)
                .with_context(|| format!("failed to write {}", texture_out.display()))?;
            let skin = node.mesh.back_color;
            println!(
                "{}: {} vertices, {} triangles, skin ({:.3}, {:.3}, {:.3}), headwear scale {:.3}",
                node.name,
                node.vertex_count(),
                node.triangle_count(),
                skin.r,
                skin.g,
                skin.b,
                node.headwear.transform.scale
            );
            println!("face texture written to {}", texture_out.display());
            Ok(())
        }
    }
}

fn load_builder(config: HeadConfig) -> Result<HeadBuilder> {
    let topology = FaceTopology::load(&config.topology)?;
    Ok(HeadBuilder::new(config, topology))
}

fn freeze_topology(config: &HeadConfig, source: &dyn LandmarkSource, reference: &Path, out: &Path) -> Result<()> {
    let mut topology = FaceTopology::load_tables(&config.topology)?;
    let photo = Photo::open(reference)
        .with_context(|| format!("failed to open reference photo {}", reference.display()))?;
    let Some(landmarks) = source.detect(&photo)? else {
        bail!("no face detected in reference photo {}", reference.display());
    };
    let count = topology.freeze_triangles(&landmarks)?;
    topology.save(out)?;
    println!("{count} face triangles frozen into {}", out.display());
    Ok(())
}

fn view(builder: Arc<HeadBuilder>, source: Arc<dyn LandmarkSource>, photo: Option<PathBuf>) -> Result<()> {
    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Head Sculpt - drop a photo to build a head")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), builder, source))?;
    if let Some(photo) = photo {
        state.start_build(photo);
    }

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                if !state.hud.on_window_event(&window, event) {
                    state.input.process_event(event);
                }
                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => control_flow.exit(),
                            Err(e) => warn!("{:?}", e),
                        }
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;
    Ok(())
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = HeadConfig::load(cli.config.as_deref())?;
    let mut source = SidecarLandmarkSource::new();
    source.init()?;

    let result = match cli.command.unwrap_or(Commands::View { photo: None }) {
        Commands::FreezeTopology { reference, out } => {
            let out = out.unwrap_or_else(|| config.topology.clone());
            freeze_topology(&config, &source, &reference, &out)
        }
        Commands::Bake { photo, texture_out } => {
            load_builder(config).and_then(|builder| bake(&builder, &source, &photo, &texture_out))
        }
        Commands::View { photo } => {
            load_builder(config).and_then(|builder| view(Arc::new(builder), Arc::new(source), photo))
        }
    };
    if let Err(err) = &result {
        error!("{err:#}");
    }
    result
}
