pub mod gltf_loader;
pub mod meshlet_builder;

pub use gltf_loader::HalaGltfLoader;
pub use meshlet_builder::{
  HalaMeshletBuilder,
  HalaMeshletBuildOptions,
};
