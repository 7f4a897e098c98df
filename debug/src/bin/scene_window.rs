//! Demo scene in a window through PrismWindowBackend; the host never touches wgpu.
//! Run: cargo run -p debug --bin scene_window

use std::time::Instant;

use debug::DemoScene;
use glam::Vec3;
use prism_bridge::PrismWindowBackend;
use prism_renderer::RendererConfig;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use render_api::{CameraMatrices, ExtractedView, RenderBackendWindow};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::WindowId;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

struct App {
    window: Option<winit::window::Window>,
    backend: Option<Box<dyn RenderBackendWindow>>,
    scene: DemoScene,
    start: Instant,
}

impl App {
    fn new() -> Self {
        Self { window: None, backend: None, scene: DemoScene::new(), start: Instant::now() }
    }

    fn view(&self) -> ExtractedView {
        let t = self.start.elapsed().as_secs_f32() * 0.2;
        let eye = Vec3::new(6.0 * t.cos(), 3.0, 6.0 * t.sin());
        ExtractedView {
            camera: CameraMatrices::look_at(eye, Vec3::ZERO, 45f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 100.0),
            viewport_size: (WIDTH, HEIGHT),
        }
    }

    fn create_backend(window: &winit::window::Window) -> Option<Box<dyn RenderBackendWindow>> {
        let config = RendererConfig { width: WIDTH, height: HEIGHT, ..Default::default() };
        let mut backend = match PrismWindowBackend::from_window(window, config) {
            Ok(b) => b,
            Err(e) => {
                log::error!("PrismWindowBackend::from_window failed: {e}");
                return None;
            }
        };
        for light in DemoScene::lights() {
            if let Err(e) = backend.add_light(light) {
                log::warn!("{e}");
            }
        }
        Some(backend)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = winit::window::WindowAttributes::default()
            .with_title("Prism scene")
            .with_inner_size(winit::dpi::PhysicalSize::new(WIDTH, HEIGHT))
            .with_resizable(false);
        match event_loop.create_window(attrs) {
            Ok(window) => {
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                log::error!("create window: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => {
                let Some(window) = &self.window else { return };
                if self.backend.is_none() {
                    self.backend = Self::create_backend(window);
                }
                let (raw_window, raw_display) = match (window.window_handle(), window.display_handle()) {
                    (Ok(wh), Ok(dh)) => (wh.as_raw(), dh.as_raw()),
                    _ => return,
                };
                let extracted = self.scene.extract(self.start.elapsed().as_secs_f32());
                let view = self.view();
                let Some(backend) = &mut self.backend else { return };
                backend.prepare(&extracted);
                if let Err(e) = backend.render_frame_to_window(&view, raw_window, raw_display) {
                    log::warn!("frame failed: {e}");
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<(), String> {
    env_logger::init();
    let event_loop = winit::event_loop::EventLoop::new().map_err(|e| e.to_string())?;
    let mut app = App::new();
    event_loop.run_app(&mut app).map_err(|e| e.to_string())?;
    Ok(())
}
