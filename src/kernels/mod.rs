pub mod culling;
pub mod expand;
pub mod vertex;

pub use culling::{
  HalaMeshletCullingKernel,
  CULLING_GROUP_SIZE,
  instance_scale,
  is_cone_backfacing,
  is_meshlet_visible,
  is_sphere_culled,
};
pub use expand::{
  HalaMeshletExpandKernel,
  DEGENERATE_INDEX,
  EXPAND_GROUP_SIZE,
};
pub use vertex::{
  HalaMeshletExpandedVertexKernel,
  HalaMeshletProceduralVertexKernel,
};
