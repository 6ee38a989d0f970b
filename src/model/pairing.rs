use tracing::debug;

use super::{BodyId, PhysicsWorld, Scene, VisualId};
use crate::error::{Result, TumbleError};

/// Explicit one-to-one table from physics bodies to the visuals that mirror them.
#[derive(Debug, Default)]
pub struct PairingTable {
    pairs: Vec<(BodyId, VisualId)>,
}

impl PairingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs `body` with `visual` after checking both exist and neither is taken.
    pub fn pair(&mut self, body: BodyId, visual: VisualId, physics: &PhysicsWorld, scene: &Scene) -> Result<()> {
        if !physics.contains(body) {
            return Err(TumbleError::UnknownBody(body));
        }
        if !scene.contains(visual) {
            return Err(TumbleError::UnknownVisual(visual));
        }
        if self.visual_for(body).is_some() {
            return Err(TumbleError::BodyAlreadyPaired(body));
        }
        if self.body_for(visual).is_some() {
            return Err(TumbleError::VisualAlreadyPaired(visual));
        }
        self.pairs.push((body, visual));
        debug!(?body, ?visual, "paired");
        Ok(())
    }

    pub fn unpair_visual(&mut self, visual: VisualId) -> Option<BodyId> {
        let idx = self.pairs.iter().position(|&(_, v)| v == visual)?;
        Some(self.pairs.remove(idx).0)
    }

    pub fn visual_for(&self, body: BodyId) -> Option<VisualId> {
        self.pairs.iter().find(|&&(b, _)| b == body).map(|&(_, v)| v)
    }

    pub fn body_for(&self, visual: VisualId) -> Option<BodyId> {
        self.pairs.iter().find(|&&(_, v)| v == visual).map(|&(b, _)| b)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, VisualId)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Copies each body's pose verbatim onto its visual.
    pub fn sync(&self, physics: &PhysicsWorld, scene: &mut Scene) {
        for &(body, visual) in &self.pairs {
            if let (Some(pose), Some(entity)) = (physics.transform(body), scene.get_mut(visual)) {
                entity.transform = pose;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::config::PhysicsConfig;
    use crate::model::{BodyDesc, Geometry, Material, ShapeDesc, Transform};

    fn setup() -> (PhysicsWorld, Scene, BodyId, VisualId) {
        let mut physics = PhysicsWorld::new(&PhysicsConfig::default());
        let mut scene = Scene::new();
        let body = physics
            .add_body(BodyDesc::new(
                1.0,
                ShapeDesc::Sphere { radius: 0.5 },
                Transform::from_position(Vec3::new(0.0, 4.0, 0.0)),
            ))
            .unwrap();
        let visual = scene.add_visual(
            Geometry::Sphere { radius: 0.5 },
            Material::solid([1.0, 1.0, 1.0]),
            Transform::IDENTITY,
        );
        (physics, scene, body, visual)
    }

    #[test]
    fn rejects_missing_and_duplicate_targets() {
        let (physics, scene, body, visual) = setup();
        let mut table = PairingTable::new();

        assert!(matches!(
            table.pair(BodyId(9), visual, &physics, &scene),
            Err(TumbleError::UnknownBody(BodyId(9)))
        ));
        assert!(matches!(
            table.pair(body, VisualId(9), &physics, &scene),
            Err(TumbleError::UnknownVisual(VisualId(9)))
        ));

        table.pair(body, visual, &physics, &scene).unwrap();
        assert!(matches!(
            table.pair(body, visual, &physics, &scene),
            Err(TumbleError::BodyAlreadyPaired(_))
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn visual_cannot_mirror_two_bodies() {
        let (mut physics, scene, body, visual) = setup();
        let other = physics
            .add_body(BodyDesc::new(1.0, ShapeDesc::Sphere { radius: 0.5 }, Transform::IDENTITY))
            .unwrap();
        let mut table = PairingTable::new();
        table.pair(body, visual, &physics, &scene).unwrap();
        assert!(matches!(
            table.pair(other, visual, &physics, &scene),
            Err(TumbleError::VisualAlreadyPaired(_))
        ));
    }

    #[test]
    fn sync_copies_pose_exactly() {
        let (mut physics, mut scene, body, visual) = setup();
        let mut table = PairingTable::new();
        table.pair(body, visual, &physics, &scene).unwrap();

        for _ in 0..30 {
            physics.step(1.0 / 60.0);
            table.sync(&physics, &mut scene);
            assert_eq!(scene.get(visual).unwrap().transform, physics.transform(body).unwrap());
        }
        assert!(scene.get(visual).unwrap().transform.position.y < 4.0);
    }

    #[test]
    fn unpaired_visual_is_left_alone() {
        let (physics, mut scene, body, visual) = setup();
        let mut table = PairingTable::new();
        table.pair(body, visual, &physics, &scene).unwrap();
        assert_eq!(table.unpair_visual(visual), Some(body));

        table.sync(&physics, &mut scene);
        assert_eq!(scene.get(visual).unwrap().transform, Transform::IDENTITY);
    }
}
