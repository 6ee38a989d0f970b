use glam::Vec3;

use super::{Camera, Transform};

/// Handle to a visual entity. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Box { half_extents: Vec3 },
    /// Square quad in the local XZ plane, facing +Y.
    Plane { half_size: f32 },
    Sphere { radius: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: [f32; 3],
    pub wireframe: bool,
}

impl Material {
    pub fn solid(color: [f32; 3]) -> Self {
        Self { color, wireframe: false }
    }

    pub fn wireframe(color: [f32; 3]) -> Self {
        Self { color, wireframe: true }
    }
}

#[derive(Debug, Clone)]
pub struct VisualEntity {
    pub id: VisualId,
    pub transform: Transform,
    pub geometry: Geometry,
    pub material: Material,
}

/// Anything that can draw a scene: the wgpu renderer, or a headless stand-in.
pub trait SceneRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera);
    fn resize(&mut self, width: u32, height: u32);
}

/// Owns every visual entity in the session.
///
/// Slots are indexed by `VisualId`; removed entities leave a hole so ids stay stable.
#[derive(Debug, Default)]
pub struct Scene {
    slots: Vec<Option<VisualEntity>>,
    live: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_visual(&mut self, geometry: Geometry, material: Material, transform: Transform) -> VisualId {
        let id = VisualId(self.slots.len() as u32);
        self.slots.push(Some(VisualEntity {
            id,
            transform,
            geometry,
            material,
        }));
        self.live += 1;
        id
    }

    pub fn remove_visual(&mut self, id: VisualId) -> Option<VisualEntity> {
        let removed = self.slots.get_mut(id.0 as usize)?.take();
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    pub fn get(&self, id: VisualId) -> Option<&VisualEntity> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: VisualId) -> Option<&mut VisualEntity> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn contains(&self, id: VisualId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisualEntity> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Geometry {
        Geometry::Box { half_extents: Vec3::splat(0.5) }
    }

    #[test]
    fn ids_stay_stable_after_removal() {
        let mut scene = Scene::new();
        let a = scene.add_visual(unit_box(), Material::solid([1.0, 0.0, 0.0]), Transform::IDENTITY);
        let b = scene.add_visual(unit_box(), Material::solid([0.0, 1.0, 0.0]), Transform::IDENTITY);

        assert!(scene.remove_visual(a).is_some());
        assert!(scene.remove_visual(a).is_none());
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.get(b).map(|v| v.material.color), Some([0.0, 1.0, 0.0]));

        let c = scene.add_visual(unit_box(), Material::wireframe([0.0, 0.0, 1.0]), Transform::IDENTITY);
        assert_ne!(c, a);
        assert_eq!(scene.iter().count(), 2);
    }
}
