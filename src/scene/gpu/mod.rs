pub mod args;
pub mod camera;
pub mod buffer_set;

pub use args::{
  HalaDispatchIndirectArgs,
  HalaDrawIndirectArgs,
  DISPATCH_ARGS_GROUP_COUNT_X_OFFSET,
  DRAW_ARGS_INSTANCE_COUNT_OFFSET,
};
pub use camera::{
  HalaFrameUniform,
  FRAME_FLAG_CONE_CULLING,
};
pub use buffer_set::HalaMeshletBufferSet;
