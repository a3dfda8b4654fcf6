mod demo_scene;

use anyhow::Context;
use glam::Vec3;
use tracing::{debug, error, info, warn};
use winit::{
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use crate::{
    camera::{Camera, OrbitController},
    content::{load_panorama, procedural_sky},
    renderer::{
        ibl::IblSettings, request_device, scene::Scene, Renderer, RendererError,
        SUPPORTED_BACKENDS,
    },
    settings::{FrameSettings, KernelPreset, RenderSettings},
};

pub use demo_scene::build_demo_scene;

const PROCEDURAL_SKY_WIDTH: u32 = 1024;
const PROCEDURAL_SKY_HEIGHT: u32 = 512;

const EXPOSURE_STEP: f32 = 0.1;
const GAMMA_STEP: f32 = 0.1;

/// Owns the window surface, the renderer and the demo scene, and turns window
/// events into frames.
///
/// NOTE: `surface` borrows `window`, so the window must outlive the app.
pub struct App<'w> {
    window: &'w Window,
    surface: wgpu::Surface<'w>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: Renderer,
    scene: Scene,
    camera: Camera,
    orbit: OrbitController,
    frame: FrameSettings,
    kernel_preset: KernelPreset,
}

impl<'w> App<'w> {
    pub async fn new(window: &'w Window, settings: &RenderSettings) -> anyhow::Result<Self> {
        let window_size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: SUPPORTED_BACKENDS,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create the window surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no Vulkan, Metal or DX12 adapter can present to the window")?;

        let (device, queue) = request_device(&adapter)
            .await
            .context("failed to create a graphics device")?;

        // Prefer an sRGB surface, post-processing then leaves gamma to the
        // hardware.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the window surface supports no formats")?;

        if surface_format.is_srgb() {
            info!("rendering surface supports sRGB");
        } else {
            info!("no sRGB support found for the main rendering surface, defaulting to first available");
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let panorama = match &settings.panorama_path {
            Some(path) => load_panorama(path).await?,
            None => {
                info!("no panorama configured, generating a procedural sky");
                procedural_sky(PROCEDURAL_SKY_WIDTH, PROCEDURAL_SKY_HEIGHT)
            }
        };

        let renderer = Renderer::new(
            device,
            queue,
            surface_format,
            surface_config.width,
            surface_config.height,
            &panorama,
            &IblSettings::default(),
        )?;

        let scene = build_demo_scene(&renderer, settings).await?;

        let camera = Camera::new(
            Vec3::new(0.0, 3.0, 6.0),
            Vec3::new(0.0, 0.0, -3.0),
            f32::to_radians(45.0),
            0.1,
            100.0,
            surface_config.width,
            surface_config.height,
        );
        let orbit = OrbitController::new(&camera);

        Ok(Self {
            window,
            surface,
            surface_config,
            renderer,
            scene,
            camera,
            orbit,
            frame: settings.frame,
            kernel_preset: KernelPreset::Identity,
        })
    }

    pub fn window(&self) -> &Window {
        self.window
    }

    /// Handles when the window is resized.
    pub fn resize(&mut self, new_width: u32, new_height: u32) -> anyhow::Result<()> {
        if new_width == 0 || new_height == 0 {
            debug!("ignoring resize to {new_width}x{new_height}");
            return Ok(());
        }

        self.surface_config.width = new_width;
        self.surface_config.height = new_height;
        self.surface
            .configure(self.renderer.device(), &self.surface_config);

        self.renderer.resize(new_width, new_height)?;
        self.camera
            .set_viewport_size(new_width, new_height)
            .unwrap_or_else(|e| warn!("{e}"));

        Ok(())
    }

    /// Apply a key press. Returns false when the app should exit.
    pub fn key_pressed(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Escape => return false,
            KeyCode::Equal | KeyCode::NumpadAdd => {
                self.frame
                    .set_exposure(self.frame.exposure() + EXPOSURE_STEP);
                info!("exposure = {:.2}", self.frame.exposure());
            }
            KeyCode::Minus | KeyCode::NumpadSubtract => {
                self.frame
                    .set_exposure(self.frame.exposure() - EXPOSURE_STEP);
                info!("exposure = {:.2}", self.frame.exposure());
            }
            KeyCode::KeyG => {
                self.frame.set_gamma(self.frame.gamma() + GAMMA_STEP);
                info!("gamma = {:.2}", self.frame.gamma());
            }
            KeyCode::KeyH => {
                self.frame.set_gamma(self.frame.gamma() - GAMMA_STEP);
                info!("gamma = {:.2}", self.frame.gamma());
            }
            KeyCode::KeyK => {
                self.kernel_preset = self.kernel_preset.next();
                self.frame.kernel = self.kernel_preset.kernel();
                info!("post-process kernel = {:?}", self.kernel_preset);
            }
            KeyCode::KeyN => {
                self.frame.visualize_normals = !self.frame.visualize_normals;
                info!("visualize normals = {}", self.frame.visualize_normals);
            }
            _ => {
                if let Some(index) = render_mode_key(key) {
                    self.frame.render_mode = index;
                    match self.frame.mode() {
                        Ok(mode) => info!("render mode = {mode}"),
                        Err(e) => warn!("selected {e}"),
                    }
                }
            }
        }

        true
    }

    pub fn mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.orbit.set_dragging(state == ElementState::Pressed);
        }
    }

    pub fn mouse_motion(&mut self, delta_x: f64, delta_y: f64) {
        self.orbit.mouse_motion(delta_x, delta_y);
    }

    pub fn mouse_scroll_wheel(&mut self, delta: MouseScrollDelta) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(p) => p.y as f32 / 20.0,
        };

        self.orbit.scroll(lines);
    }

    /// Render and present one frame. Only unrecoverable errors are returned.
    pub fn render(&mut self) -> anyhow::Result<()> {
        self.orbit.update_camera(&mut self.camera);

        let backbuffer = match self.surface.get_current_texture() {
            Ok(backbuffer) => backbuffer,
            // Reconfigure surface when lost.
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                warn!("handling surface lost or outdated event by re-applying current window size");
                self.surface
                    .configure(self.renderer.device(), &self.surface_config);
                return Ok(());
            }
            // System is out of memory - bail out!
            Err(wgpu::SurfaceError::OutOfMemory) => {
                anyhow::bail!("graphics device is out of memory")
            }
            // Other errors (timeout) should be resolved by next frame.
            Err(e) => {
                error!("surface error, will skip frame and try to ignore: {e:?}");
                return Ok(());
            }
        };

        let view = backbuffer
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        match self
            .renderer
            .render(&mut self.scene, &self.camera, &self.frame, &view)
        {
            Ok(()) => backbuffer.present(),
            Err(RendererError::UnknownRenderMode(e)) => {
                warn!("{e}, skipping frame");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }
}

/// Digits one to five select render modes zero to four. Six to nine select
/// render modes that do not exist.
fn render_mode_key(key: KeyCode) -> Option<u32> {
    let index = match key {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        _ => return None,
    };

    Some(index)
}

/// Create the main window and run the event loop until the window is closed.
pub fn run(settings: RenderSettings) -> anyhow::Result<()> {
    info!("creating main window for rendering");

    let event_loop = EventLoop::new().context("failed to create main window event loop")?;
    let window = WindowBuilder::new()
        .with_title("Lumen")
        .with_inner_size(winit::dpi::PhysicalSize::new(
            settings.window_width,
            settings.window_height,
        ))
        .build(&event_loop)
        .context("failed to create main window")?;

    let mut app = pollster::block_on(App::new(&window, &settings))?;
    let mut fatal_error: Option<anyhow::Error> = None;

    info!("starting main window event loop");

    event_loop
        .run(|event, control_flow| match event {
            Event::WindowEvent { event, window_id } if window_id == app.window().id() => {
                let result = match event {
                    WindowEvent::CloseRequested => {
                        control_flow.exit();
                        Ok(())
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(key),
                                state: ElementState::Pressed,
                                repeat: false,
                                ..
                            },
                        ..
                    } => {
                        if !app.key_pressed(key) {
                            control_flow.exit();
                        }
                        Ok(())
                    }
                    WindowEvent::MouseInput { button, state, .. } => {
                        app.mouse_button(button, state);
                        Ok(())
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        app.mouse_scroll_wheel(delta);
                        Ok(())
                    }
                    WindowEvent::Resized(size) => app.resize(size.width, size.height),
                    WindowEvent::RedrawRequested => app.render(),
                    _ => Ok(()),
                };

                if let Err(e) = result {
                    error!("{e:#}");
                    fatal_error = Some(e);
                    control_flow.exit();
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => app.mouse_motion(delta.0, delta.1),
            Event::AboutToWait => app.window().request_redraw(),
            _ => {}
        })
        .context("main window event loop processing failed")?;

    match fatal_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_keys_select_render_modes() {
        assert_eq!(Some(0), render_mode_key(KeyCode::Digit1));
        assert_eq!(Some(4), render_mode_key(KeyCode::Digit5));
        assert_eq!(None, render_mode_key(KeyCode::Digit0));
        assert_eq!(None, render_mode_key(KeyCode::KeyW));
    }

    #[test]
    fn high_digits_select_unknown_modes() {
        let mut frame = FrameSettings::default();

        for key in [KeyCode::Digit6, KeyCode::Digit9] {
            frame.render_mode = render_mode_key(key).unwrap();
            assert!(frame.mode().is_err());
        }
    }
}
