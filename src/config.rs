//! Session configuration, loaded once at startup from TOML.
//!
//! Every section falls back to the tutorial defaults, so an empty document
//! (or no file at all) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TumbleError};

/// Which tutorial snapshot to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// A wireframe cube spinning in front of a plane; no physics.
    Spin,
    /// `Spin` plus orbit controls.
    Orbit,
    /// A single cube falling onto a static ground plane.
    Drop,
    /// `Drop` plus a keyboard-driven sphere.
    Control,
    /// A pile of boxes, a keyboard-driven sphere, and a follow camera.
    #[default]
    Pile,
}

impl std::str::FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spin" => Ok(Self::Spin),
            "orbit" => Ok(Self::Orbit),
            "drop" => Ok(Self::Drop),
            "control" => Ok(Self::Control),
            "pile" => Ok(Self::Pile),
            other => Err(format!("unknown scenario `{other}`")),
        }
    }
}

/// Whether held keys push the user body with a force or an impulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Force applied for the next step only.
    Force,
    /// Instantaneous velocity change, once per frame while held.
    #[default]
    Impulse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scenario: ScenarioKind,
    pub physics: PhysicsConfig,
    pub input: InputConfig,
    pub camera: CameraConfig,
    pub pile: PileConfig,
    pub contact_materials: Vec<ContactMaterialConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: [f32; 3],
    /// Seconds advanced by every `step`, independent of frame time.
    pub fixed_dt: f32,
    pub solver_iterations: usize,
    /// Used for surfaces with no contact material association.
    pub default_friction: f32,
    pub default_restitution: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            fixed_dt: 1.0 / 60.0,
            solver_iterations: 10,
            default_friction: 0.3,
            default_restitution: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindingConfig {
    /// Physical key code, e.g. `KeyW` or `ArrowUp`.
    pub key: String,
    pub direction: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Overrides the scenario's choice when set.
    pub mode: Option<InputMode>,
    pub force_magnitude: f32,
    pub impulse_magnitude: f32,
    /// World-space offset from the body centre where pushes are applied.
    pub point_offset: [f32; 3],
    /// Replaces the default WASD/arrow bindings when non-empty.
    pub bindings: Vec<KeyBindingConfig>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: None,
            force_magnitude: 20.0,
            impulse_magnitude: 0.2,
            point_offset: [0.0, 0.0, 0.0],
            bindings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub position: [f32; 3],
    /// Overrides the scenario's choice when set.
    pub follow: Option<bool>,
    /// Overrides the scenario's choice when set.
    pub orbit: Option<bool>,
    pub orbit_damping: f32,
    /// Eye offset from the followed body when orbit controls are off.
    pub follow_offset: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
            position: [0.0, 4.0, 10.0],
            follow: None,
            orbit: None,
            orbit_damping: 0.05,
            follow_offset: [0.0, 4.0, 10.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PileConfig {
    pub count: usize,
    pub columns: usize,
    pub spacing: f32,
    pub box_half_extent: f32,
    pub box_mass: f32,
    pub drop_height: f32,
}

impl Default for PileConfig {
    fn default() -> Self {
        Self {
            count: 27,
            columns: 3,
            spacing: 1.1,
            box_half_extent: 0.5,
            box_mass: 1.0,
            drop_height: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMaterialConfig {
    pub a: String,
    pub b: String,
    pub friction: f32,
    pub restitution: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
    /// Rolling log file (native only). `None` disables file logging.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: Some("logs/tumble.log".to_string()),
        }
    }
}

impl PhysicsConfig {
    /// The step must be a positive, finite increment and gravity must be finite.
    pub fn validate(&self) -> Result<()> {
        if !self.fixed_dt.is_finite() || self.fixed_dt <= 0.0 {
            return Err(TumbleError::InvalidConfig(format!(
                "physics.fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(TumbleError::InvalidConfig(format!(
                "physics.gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.physics.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)?;
        Self::from_toml_str(&src)
    }

    /// Contact materials to register, falling back to the tutorial pairs.
    pub fn contact_materials_or_default(&self) -> Vec<ContactMaterialConfig> {
        if !self.contact_materials.is_empty() {
            return self.contact_materials.clone();
        }
        vec![
            ContactMaterialConfig {
                a: "ground".to_string(),
                b: "box".to_string(),
                friction: 0.4,
                restitution: 0.1,
            },
            ContactMaterialConfig {
                a: "ground".to_string(),
                b: "player".to_string(),
                friction: 0.05,
                restitution: 0.3,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.scenario, ScenarioKind::Pile);
        assert_eq!(cfg.input.mode, None);
        assert_eq!(cfg.physics.solver_iterations, 10);
        assert!((cfg.physics.fixed_dt - 1.0 / 60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            scenario = "control"

            [input]
            mode = "force"
            force_magnitude = 5.0

            [[contact_materials]]
            a = "ground"
            b = "player"
            friction = 0.0
            restitution = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(cfg.scenario, ScenarioKind::Control);
        assert_eq!(cfg.input.mode, Some(InputMode::Force));
        assert_eq!(cfg.input.force_magnitude, 5.0);
        assert_eq!(cfg.input.impulse_magnitude, 0.2);
        assert_eq!(cfg.camera.fov_deg, 75.0);
        assert_eq!(cfg.contact_materials_or_default().len(), 1);
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = Config::from_toml_str("scenario = 12").unwrap_err();
        assert!(matches!(err, crate::error::TumbleError::Config(_)));
    }

    #[test]
    fn non_positive_or_non_finite_steps_are_rejected() {
        for dt in [0.0, -1.0 / 60.0, f32::NAN, f32::INFINITY] {
            let physics = PhysicsConfig {
                fixed_dt: dt,
                ..PhysicsConfig::default()
            };
            assert!(
                matches!(physics.validate(), Err(crate::error::TumbleError::InvalidConfig(_))),
                "fixed_dt = {dt}"
            );
        }
        let physics = PhysicsConfig {
            gravity: [0.0, f32::NAN, 0.0],
            ..PhysicsConfig::default()
        };
        assert!(physics.validate().is_err());
        assert!(PhysicsConfig::default().validate().is_ok());

        let err = Config::from_toml_str("[physics]\nfixed_dt = -0.5").unwrap_err();
        assert!(matches!(err, crate::error::TumbleError::InvalidConfig(_)));
    }

    #[test]
    fn scenario_names_parse_case_insensitively() {
        assert_eq!("Orbit".parse::<ScenarioKind>(), Ok(ScenarioKind::Orbit));
        assert!("nope".parse::<ScenarioKind>().is_err());
    }
}
