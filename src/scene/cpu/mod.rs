pub mod mesh;
pub mod camera;
pub mod collection;

pub use mesh::HalaSourceMesh;
pub use camera::{
  HalaCamera,
  HalaPlane,
};
pub use collection::{
  HalaMeshletAsset,
  HalaMeshletCollection,
};
