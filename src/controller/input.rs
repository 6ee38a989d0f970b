/// Platform-agnostic keyboard state and the router that turns held keys into pushes
use std::collections::HashSet;

use glam::Vec3;
use tracing::trace;

use crate::config::{InputConfig, InputMode};
use crate::model::{BodyId, PhysicsWorld};
use crate::ui::Tweakables;

/// Discrete edge events delivered by the host between frames
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    /// Window blur / tab hidden: nothing is held anymore
    FocusLost,
}

/// Which physical keys are currently held
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<String>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(code) => {
                self.held.insert(code.clone());
            }
            InputEvent::KeyUp(code) => {
                self.held.remove(code.as_str());
            }
            InputEvent::FocusLost => self.clear(),
        }
    }

    pub fn is_held(&self, code: &str) -> bool {
        self.held.contains(code)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

/// Ordered key code -> world direction table
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: Vec<(String, Vec3)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let table = [
            ("KeyW", Vec3::NEG_Z),
            ("ArrowUp", Vec3::NEG_Z),
            ("KeyS", Vec3::Z),
            ("ArrowDown", Vec3::Z),
            ("KeyA", Vec3::NEG_X),
            ("ArrowLeft", Vec3::NEG_X),
            ("KeyD", Vec3::X),
            ("ArrowRight", Vec3::X),
            ("Space", Vec3::Y),
        ];
        Self {
            bindings: table.iter().map(|(k, d)| (k.to_string(), *d)).collect(),
        }
    }
}

impl KeyBindings {
    pub fn from_config(config: &InputConfig) -> Self {
        if config.bindings.is_empty() {
            return Self::default();
        }
        Self {
            bindings: config
                .bindings
                .iter()
                .map(|b| (b.key.clone(), Vec3::from_array(b.direction)))
                .collect(),
        }
    }

    pub fn direction(&self, code: &str) -> Option<Vec3> {
        self.bindings.iter().find(|(k, _)| k == code).map(|(_, d)| *d)
    }

    /// Whether the host should swallow this key's default action (scrolling etc.)
    pub fn is_bound(&self, code: &str) -> bool {
        self.direction(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec3)> {
        self.bindings.iter().map(|(k, d)| (k.as_str(), *d))
    }
}

/// Applies held-key pushes to the user body once per frame
#[derive(Debug, Clone)]
pub struct InputRouter {
    pub mode: InputMode,
    /// Added to the body centre to get the application point
    pub point_offset: Vec3,
}

impl InputRouter {
    /// `fallback` is the scenario's mode, used unless the config names one.
    pub fn from_config(config: &InputConfig, fallback: InputMode) -> Self {
        Self {
            mode: config.mode.unwrap_or(fallback),
            point_offset: Vec3::from_array(config.point_offset),
        }
    }

    /// Every held binding contributes one push this frame, in binding order.
    /// Returns the number of pushes applied.
    pub fn apply(
        &self,
        input: &InputState,
        bindings: &KeyBindings,
        physics: &mut PhysicsWorld,
        user: BodyId,
        tweaks: &Tweakables,
    ) -> usize {
        let Some(pose) = physics.transform(user) else {
            return 0;
        };
        let point = pose.position + self.point_offset;

        let mut applied = 0;
        for (code, direction) in bindings.iter() {
            if !input.is_held(code) {
                continue;
            }
            match self.mode {
                InputMode::Force => physics.apply_force(user, direction * tweaks.force_magnitude, point),
                InputMode::Impulse => physics.apply_impulse(user, direction * tweaks.impulse_magnitude, point),
            }
            applied += 1;
        }
        if applied > 0 {
            trace!(applied, mode = ?self.mode, "input pushes");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeyBindingConfig, PhysicsConfig};
    use crate::model::{BodyDesc, ShapeDesc, Transform};

    fn key_down(code: &str) -> InputEvent {
        InputEvent::KeyDown(code.to_string())
    }

    #[test]
    fn edge_events_track_held_keys() {
        let mut input = InputState::new();
        input.process_event(&key_down("KeyW"));
        input.process_event(&key_down("KeyW"));
        input.process_event(&key_down("KeyA"));
        assert!(input.is_held("KeyW"));
        assert_eq!(input.held_count(), 2);

        input.process_event(&InputEvent::KeyUp("KeyW".to_string()));
        assert!(!input.is_held("KeyW"));

        input.process_event(&InputEvent::FocusLost);
        assert_eq!(input.held_count(), 0);
    }

    #[test]
    fn custom_bindings_replace_defaults() {
        let config = InputConfig {
            bindings: vec![KeyBindingConfig {
                key: "KeyI".to_string(),
                direction: [0.0, 0.0, -1.0],
            }],
            ..InputConfig::default()
        };
        let bindings = KeyBindings::from_config(&config);
        assert_eq!(bindings.direction("KeyI"), Some(Vec3::NEG_Z));
        assert!(!bindings.is_bound("KeyW"));
    }

    #[test]
    fn only_held_bound_keys_push() {
        let mut physics = PhysicsWorld::new(&PhysicsConfig {
            gravity: [0.0; 3],
            ..PhysicsConfig::default()
        });
        let user = physics
            .add_body(BodyDesc::new(1.0, ShapeDesc::Sphere { radius: 0.5 }, Transform::IDENTITY))
            .unwrap();
        physics.step(1.0 / 60.0);

        let mut input = InputState::new();
        input.process_event(&key_down("KeyD"));
        input.process_event(&key_down("KeyQ"));

        let router = InputRouter::from_config(&InputConfig::default(), InputMode::Impulse);
        let tweaks = Tweakables {
            impulse_magnitude: 0.5,
            ..Tweakables::default()
        };
        let applied = router.apply(&input, &KeyBindings::default(), &mut physics, user, &tweaks);

        assert_eq!(applied, 1);
        let v = physics.linear_velocity(user).unwrap();
        assert!((v.x - 0.5).abs() < 1e-5 && v.z.abs() < 1e-6, "v = {v}");
    }
}
