use bytemuck::{
  Pod,
  Zeroable,
};

/// The byte offset of `group_count_x` in the dispatch arguments.
pub const DISPATCH_ARGS_GROUP_COUNT_X_OFFSET: u64 = 0;
/// The byte offset of `instance_count` in the draw arguments.
pub const DRAW_ARGS_INSTANCE_COUNT_OFFSET: u64 = 4;

/// The indirect dispatch arguments.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct HalaDispatchIndirectArgs {
  pub group_count_x: u32,
  pub group_count_y: u32,
  pub group_count_z: u32,
}

/// The indirect indexed draw arguments.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct HalaDrawIndirectArgs {
  pub index_count_per_instance: u32,
  pub instance_count: u32,
  pub start_index: u32,
  pub base_vertex: i32,
  pub start_instance: u32,
}

impl HalaDispatchIndirectArgs {
  /// One group per item along x, filled in on the device.
  pub fn per_item() -> Self {
    Self {
      group_count_x: 0,
      group_count_y: 1,
      group_count_z: 1,
    }
  }
}

impl HalaDrawIndirectArgs {
  /// Instanced draw of a fixed index span, the instance count is filled in on the device.
  pub fn per_instance(index_count_per_instance: u32) -> Self {
    Self {
      index_count_per_instance,
      ..Default::default()
    }
  }
}
