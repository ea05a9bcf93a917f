use std::f32::consts::{FRAC_PI_2, PI};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use glam::{Vec2, Vec3};
use oriel_core::camera::Camera;
use oriel_core::collision::PortalCrossing;
use oriel_core::portal::{Portal, PortalEnd};
use oriel_core::scene::{Entity, Light, MaterialId, Scene};
use oriel_core::view::RenderOptions;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::input::InputState;
use crate::renderer::{Renderer, CUBE_MESH, PORTAL_MESH, SPHERE_MESH};
use crate::settings::{self, ViewerSettings, SETTINGS_PATH};

// Entity order produced by build_demo_scene: floor, two walls, sphere.
const WALL_ENTITIES: [usize; 2] = [1, 2];
const SPHERE_ENTITY: usize = 3;

const SPHERE_CENTER: Vec3 = Vec3::new(0.0, 2.0, 5.0);
const SPHERE_SWING: f32 = 2.0;
const FOV_ADJUST_RATE: f32 = 0.5;
// Key-adjusted fov obeys the same bounds the settings file enforces.
const MIN_FOV: f32 = settings::MIN_FOV_DEGREES * PI / 180.0;
const MAX_FOV: f32 = settings::MAX_FOV_DEGREES * PI / 180.0;

fn build_demo_scene() -> Scene {
    let mut scene = Scene::new();

    let mut floor = Entity::new(CUBE_MESH, MaterialId(0));
    floor.transform.set_scale(Vec3::new(20.0, 0.01, 10.0));
    floor.transform.set_position(Vec3::new(0.0, 0.0, 5.0));
    scene.entities.push(floor);

    let mut back_wall = Entity::new(CUBE_MESH, MaterialId(0));
    back_wall.transform.set_scale(Vec3::new(20.0, 20.0, 0.01));
    back_wall.transform.set_position(Vec3::new(0.0, 10.0, 10.0));
    back_wall
        .transform
        .set_pitch_yaw_roll(Vec3::new(0.0, 0.0, FRAC_PI_2));
    scene.entities.push(back_wall);

    let mut front_wall = Entity::new(CUBE_MESH, MaterialId(0));
    front_wall.transform.set_scale(Vec3::new(20.0, 20.0, 0.01));
    front_wall.transform.set_position(Vec3::new(0.0, 10.0, 0.0));
    scene.entities.push(front_wall);

    let mut sphere = Entity::new(SPHERE_MESH, MaterialId(0));
    sphere.transform.set_position(SPHERE_CENTER);
    scene.entities.push(sphere);

    // Three portal pairs along the walls, each pair sharing a border color.
    let placements = [
        (
            Vec3::new(0.0, 2.0, 10.0),
            PI,
            Vec3::new(10.0, 2.0, 8.0),
            -FRAC_PI_2,
            Vec3::new(0.0, 0.0, 1.0),
        ),
        (
            Vec3::new(-4.0, 2.0, 10.0),
            PI,
            Vec3::new(-4.0, 2.0, 0.0),
            0.0,
            Vec3::new(1.0, 0.6, 0.0),
        ),
        (
            Vec3::new(10.0, 2.0, 3.0),
            -FRAC_PI_2,
            Vec3::new(-10.0, 2.0, 3.0),
            FRAC_PI_2,
            Vec3::new(0.0, 1.0, 0.0),
        ),
    ];
    for (pos_a, yaw_a, pos_b, yaw_b, border) in placements {
        let mut a = Portal::new(PORTAL_MESH, MaterialId(0), PortalEnd::A, border);
        a.transform_mut().set_scale(Vec3::new(1.0, 2.0, 1.0));
        a.transform_mut().set_position(pos_a);
        a.transform_mut().set_pitch_yaw_roll(Vec3::new(0.0, yaw_a, 0.0));
        let mut b = Portal::new(PORTAL_MESH, MaterialId(0), PortalEnd::B, border);
        b.transform_mut().set_scale(Vec3::new(1.0, 2.0, 1.0));
        b.transform_mut().set_position(pos_b);
        b.transform_mut().set_pitch_yaw_roll(Vec3::new(0.0, yaw_b, 0.0));
        let a = scene.portals.add(a);
        let b = scene.portals.add(b);
        scene.portals.link_pair(a, b);
    }

    scene.ambient = Vec3::splat(0.1);
    scene.lights = vec![
        Light::directional(Vec3::new(0.5, -1.0, 0.5).normalize(), 0.8, Vec3::ONE),
        Light::directional(
            Vec3::new(-0.7, -0.4, 0.3).normalize(),
            0.3,
            Vec3::new(0.9, 0.9, 1.0),
        ),
        Light::directional(
            Vec3::new(0.0, -0.2, -1.0).normalize(),
            0.2,
            Vec3::new(1.0, 0.95, 0.8),
        ),
        Light::point(Vec3::new(0.0, 4.0, 5.0), 12.0, 1.0, Vec3::new(1.0, 0.9, 0.7)),
        Light::point(Vec3::new(8.0, 3.0, 6.0), 10.0, 0.8, Vec3::new(0.6, 0.7, 1.0)),
    ];

    scene
}

struct ViewerApp {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    settings: ViewerSettings,
    scene: Scene,
    camera: Camera,
    input: InputState,
    crossing: PortalCrossing,
    options: RenderOptions,
    animate_sphere: bool,
    last_frame: Option<Instant>,
    time_seconds: f32,
}

impl ViewerApp {
    fn new(settings: ViewerSettings) -> Self {
        let scene = build_demo_scene();
        if let Err(err) = scene.validate() {
            panic!("demo scene portal pairing is broken: {err}");
        }

        let mut camera = Camera::new(
            Vec3::new(-10.0, 2.0, 5.0),
            settings.move_speed,
            settings.look_speed,
            settings.fov_degrees.to_radians(),
            16.0 / 9.0,
        );
        camera
            .transform_mut()
            .set_pitch_yaw_roll(Vec3::new(0.0, FRAC_PI_2, 0.0));
        camera.refresh_view();

        let options = RenderOptions {
            max_recursion: settings.recursion_depth,
            oblique_clip: settings.oblique_clip,
        };
        let animate_sphere = settings.animate_sphere;
        let mut app = Self {
            window: None,
            renderer: None,
            settings,
            scene,
            camera,
            input: InputState::default(),
            crossing: PortalCrossing::new(),
            options,
            animate_sphere,
            last_frame: None,
            time_seconds: 0.0,
        };
        for &wall in &WALL_ENTITIES {
            app.scene.entities[wall].visible = app.settings.draw_walls;
        }
        app
    }

    fn toggle_walls(&mut self) {
        self.settings.draw_walls = !self.settings.draw_walls;
        for &wall in &WALL_ENTITIES {
            self.scene.entities[wall].visible = self.settings.draw_walls;
        }
        info!("walls {}", if self.settings.draw_walls { "on" } else { "off" });
    }

    fn update_and_render(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f32().min(0.1))
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.time_seconds += dt;

        if self.animate_sphere {
            let x = SPHERE_SWING * self.time_seconds.sin();
            self.scene.entities[SPHERE_ENTITY]
                .transform
                .set_position(SPHERE_CENTER + Vec3::new(x, 0.0, 0.0));
        }

        if self.input.is_pressed(KeyCode::KeyO) {
            let fov = (self.camera.fov() - FOV_ADJUST_RATE * dt).clamp(MIN_FOV, MAX_FOV);
            self.camera.set_fov(fov);
        }
        if self.input.is_pressed(KeyCode::KeyP) {
            let fov = (self.camera.fov() + FOV_ADJUST_RATE * dt).clamp(MIN_FOV, MAX_FOV);
            self.camera.set_fov(fov);
        }

        self.camera.update(&self.input.camera_input(), dt);
        self.crossing
            .update(&mut self.scene.portals, &mut self.camera, dt);

        if let Some(renderer) = self.renderer.as_mut() {
            match renderer.render(
                &mut self.scene,
                &self.camera,
                &self.options,
                self.time_seconds,
            ) {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    if let Some(window) = self.window.as_ref() {
                        let size = window.inner_size();
                        renderer.resize(size.width, size.height);
                    }
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    warn!("surface frame timed out");
                }
                Err(err) => {
                    error!("failed to acquire surface frame: {err}");
                    event_loop.exit();
                }
            }
        }

        self.input.clear_frame();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("Oriel");
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                match Renderer::new(window.clone()) {
                    Ok(renderer) => {
                        let size = window.inner_size();
                        if size.width > 0 && size.height > 0 {
                            self.camera
                                .set_aspect(size.width as f32 / size.height as f32);
                        }
                        info!("Viewer window and renderer initialized");
                        self.window = Some(window);
                        self.renderer = Some(renderer);
                        self.last_frame = Some(Instant::now());
                    }
                    Err(err) => {
                        error!("failed to initialize renderer: {err}");
                        event_loop.exit();
                    }
                }
            }
            Err(err) => {
                error!("failed to create viewer window: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested; shutting down viewer event loop");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };

                match event.state {
                    ElementState::Pressed => {
                        if !event.repeat {
                            match code {
                                KeyCode::Escape => {
                                    event_loop.exit();
                                    return;
                                }
                                KeyCode::KeyL => self.toggle_walls(),
                                KeyCode::KeyM => {
                                    self.animate_sphere = !self.animate_sphere;
                                    info!(
                                        "sphere animation {}",
                                        if self.animate_sphere { "on" } else { "off" }
                                    );
                                }
                                _ => {}
                            }
                        }
                        self.input.press_key(code);
                    }
                    ElementState::Released => self.input.release_key(code),
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.input.look_held = state == ElementState::Pressed;
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
                if size.height > 0 {
                    self.camera
                        .set_aspect(size.width as f32 / size.height as f32);
                }
            }
            WindowEvent::RedrawRequested => {
                self.update_and_render(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input
                .add_mouse_delta(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let settings = settings::load_or_default(Path::new(SETTINGS_PATH));
    let event_loop = match EventLoop::new() {
        Ok(loop_handle) => loop_handle,
        Err(err) => {
            eprintln!("Failed to create event loop: {err}");
            return;
        }
    };

    let mut app = ViewerApp::new(settings);
    if let Err(err) = event_loop.run_app(&mut app) {
        eprintln!("Event loop exited with error: {err}");
    }
}
