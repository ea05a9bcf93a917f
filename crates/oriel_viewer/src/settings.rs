use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SETTINGS_PATH: &str = "oriel.toml";

const MIN_RECURSION_DEPTH: u32 = 1;
const MAX_RECURSION_DEPTH: u32 = 4;
pub const MIN_FOV_DEGREES: f32 = 30.0;
pub const MAX_FOV_DEGREES: f32 = 120.0;
const MIN_MOVE_SPEED: f32 = 1.0;
const MAX_MOVE_SPEED: f32 = 20.0;
const MIN_LOOK_SPEED: f32 = 0.05;
const MAX_LOOK_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "default_recursion_depth")]
    pub recursion_depth: u32,
    #[serde(default = "default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    #[serde(default = "default_look_speed")]
    pub look_speed: f32,
    #[serde(default = "default_oblique_clip")]
    pub oblique_clip: bool,
    #[serde(default = "default_draw_walls")]
    pub draw_walls: bool,
    #[serde(default = "default_animate_sphere")]
    pub animate_sphere: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            recursion_depth: default_recursion_depth(),
            fov_degrees: default_fov_degrees(),
            move_speed: default_move_speed(),
            look_speed: default_look_speed(),
            oblique_clip: default_oblique_clip(),
            draw_walls: default_draw_walls(),
            animate_sphere: default_animate_sphere(),
        }
    }
}

impl ViewerSettings {
    fn sanitize(mut self) -> Self {
        self.recursion_depth = self
            .recursion_depth
            .clamp(MIN_RECURSION_DEPTH, MAX_RECURSION_DEPTH);
        self.fov_degrees = self.fov_degrees.clamp(MIN_FOV_DEGREES, MAX_FOV_DEGREES);
        self.move_speed = self.move_speed.clamp(MIN_MOVE_SPEED, MAX_MOVE_SPEED);
        self.look_speed = self.look_speed.clamp(MIN_LOOK_SPEED, MAX_LOOK_SPEED);
        self
    }

    fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }
}

fn default_recursion_depth() -> u32 {
    1
}

fn default_fov_degrees() -> f32 {
    45.0
}

fn default_move_speed() -> f32 {
    5.0
}

fn default_look_speed() -> f32 {
    0.5
}

fn default_oblique_clip() -> bool {
    true
}

fn default_draw_walls() -> bool {
    true
}

fn default_animate_sphere() -> bool {
    true
}

/// Missing settings file is normal; anything else is reported and replaced
/// with defaults.
pub fn load_or_default(path: &Path) -> ViewerSettings {
    match ViewerSettings::load(path) {
        Ok(settings) => settings,
        Err(err) if err.kind() == io::ErrorKind::NotFound => ViewerSettings::default(),
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            ViewerSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ViewerSettings;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: ViewerSettings = toml::from_str("recursion_depth = 3").unwrap();
        assert_eq!(settings.recursion_depth, 3);
        assert_eq!(settings.fov_degrees, 45.0);
        assert!(settings.oblique_clip);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings: ViewerSettings =
            toml::from_str("recursion_depth = 99\nfov_degrees = 5.0").unwrap();
        let settings = settings.sanitize();
        assert_eq!(settings.recursion_depth, 4);
        assert_eq!(settings.fov_degrees, 30.0);
    }
}
