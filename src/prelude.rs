pub use crate::error::{
  HalaErrorKind,
  HalaRendererError,
};
pub use crate::config::{
  HalaMeshletDrawMode,
  HalaMeshletRendererConfig,
};
pub use crate::gfx::{
  HalaBuffer,
  HalaBufferUsageFlags,
  HalaCommandBuffer,
  HalaContext,
  HalaDeviceRequirements,
  HalaMemoryLocation,
};
pub use crate::compute_program::{
  HalaComputeKernel,
  HalaComputeProgram,
  HalaDispatchId,
};
pub use crate::graphics_program::{
  HalaGraphicsProgram,
  HalaNullRasterizer,
  HalaRasterTriangle,
  HalaRasterizer,
  HalaTriangleRecorder,
  HalaVertexKernel,
  HalaVertexOutput,
};
pub use crate::pipeline::HalaMeshletPipeline;
pub use crate::renderer::{
  HalaFrameStatus,
  HalaMeshletRenderer,
  HalaRendererStatistics,
};
pub use crate::scene::{
  HalaBoundsData,
  HalaInstanceGrid,
  HalaInstancePara,
  HalaMeshlet,
  HalaVertex,
};
pub use crate::scene::cpu::{
  HalaCamera,
  HalaMeshletAsset,
  HalaMeshletCollection,
  HalaPlane,
  HalaSourceMesh,
};
pub use crate::scene::loader::{
  HalaGltfLoader,
  HalaMeshletBuildOptions,
  HalaMeshletBuilder,
};
