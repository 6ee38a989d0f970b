// MODEL: scene graph, physics world, and the table tying them together
pub mod transform;
pub mod camera;
pub mod scene;
pub mod physics;
pub mod pairing;

pub use transform::Transform;
pub use camera::Camera;
pub use scene::{Geometry, Material, Scene, SceneRenderer, VisualEntity, VisualId};
pub use physics::{BodyDesc, BodyId, PhysicsWorld, ShapeDesc};
pub use pairing::PairingTable;
