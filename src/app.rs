//! Window and event loop.
//!
//! [`CloudApp::run`] opens the window, checks the GPU, generates the density
//! field, uploads it and then redraws continuously until the window closes.

use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::camera::OrbitCamera;
use crate::config::CloudConfig;
use crate::error::AppError;
use crate::gpu::{spin_matrix, GpuState, FALLBACK_MESSAGE};
use crate::params::RenderParameters;
use crate::time::FrameClock;

/// Runtime state of the viewer.
pub struct CloudApp {
    config: CloudConfig,
    params: RenderParameters,
    camera: OrbitCamera,
    clock: FrameClock,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    /// Set when the GPU cannot render the cloud; the loop then only waits
    /// for the window to close.
    unsupported: bool,
    error: Option<AppError>,
}

impl CloudApp {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            params: config.params,
            config,
            camera: OrbitCamera::new(),
            clock: FrameClock::new(),
            window: None,
            gpu: None,
            unsupported: false,
            error: None,
        }
    }

    /// Open the window and run until it is closed.
    pub fn run(config: CloudConfig) -> Result<(), AppError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = Self::new(config);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_attrs = Window::default_attributes()
            .with_title("Gas Cloud")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        self.window = Some(window.clone());

        // Capability check runs before the field is generated
        let mut gpu = match pollster::block_on(GpuState::new(window.clone(), &self.config)) {
            Ok(gpu) => gpu,
            Err(err) if err.is_missing_capability() => {
                error!("{}", err);
                error!("{}", FALLBACK_MESSAGE);
                window.set_title(FALLBACK_MESSAGE);
                self.unsupported = true;
                event_loop.set_control_flow(ControlFlow::Wait);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let generator = self.config.generator();
        let noise = self.config.noise.build(self.config.seed);
        let start = Instant::now();
        let field = generator.generate(noise.as_ref());
        info!(
            "Generated {0}x{0}x{0} density field ({1} noise, seed {2}) in {3:.1?}, mean {4:.1}",
            field.size(),
            self.config.noise.name(),
            self.config.seed,
            start.elapsed(),
            field.mean()
        );

        gpu.load_field(&field)?;
        info!("Cloud ready on {}", gpu.adapter_name());
        self.gpu = Some(gpu);
        self.clock = FrameClock::new();
        window.request_redraw();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(gpu), Some(window)) = (&mut self.gpu, &self.window) else {
            return;
        };

        let (elapsed, _) = self.clock.tick();
        self.camera.update();
        self.params.advance_frame();
        let model = spin_matrix(elapsed, self.config.spin_rate);

        #[cfg(feature = "egui")]
        let ui = {
            let params = &mut self.params;
            let fps = self.clock.fps();
            gpu.egui.run(window, |ctx| {
                crate::panel::show_panel(ctx, params, fps);
            })
        };

        #[cfg(feature = "egui")]
        let result = gpu.render(&self.params, &self.camera, model, Some(&ui));
        #[cfg(not(feature = "egui"))]
        let result = gpu.render(&self.params, &self.camera, model);

        match result {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.resize(window.inner_size());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("Surface out of memory");
                event_loop.exit();
                return;
            }
            Err(e) => warn!("Render error: {:?}", e),
        }

        window.request_redraw();
    }
}

impl ApplicationHandler for CloudApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[cfg(feature = "egui")]
        if let (Some(gpu), Some(window)) = (&mut self.gpu, &self.window) {
            if gpu.egui.on_window_event(window, &event) {
                return;
            }
            // Don't start a drag that began over the panel
            let pressed = matches!(
                event,
                WindowEvent::MouseInput {
                    state: winit::event::ElementState::Pressed,
                    ..
                }
            );
            if pressed && gpu.egui.wants_pointer() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(physical_size);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.set_scale_factor(scale_factor);
                }
            }
            WindowEvent::RedrawRequested => {
                if !self.unsupported {
                    self.redraw(event_loop);
                }
            }
            other => {
                self.camera.handle_event(&other);
            }
        }
    }
}
