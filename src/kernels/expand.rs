use std::sync::Arc;

use crate::compute_program::{
  HalaComputeKernel,
  HalaDispatchId,
};
use crate::gfx::HalaBuffer;
use crate::scene::{
  HalaMeshlet,
  meshlet::{
    MESHLET_INDICES_PER_MESHLET,
    MESHLET_MAX_PRIMITIVES,
  },
};
use crate::scene::gpu::HalaMeshletBufferSet;

/// The index written for the corners of unused triangles.
pub const DEGENERATE_INDEX: u32 = u32::MAX;

/// One group per visible slot.
pub const EXPAND_GROUP_SIZE: u32 = MESHLET_MAX_PRIMITIVES;

/// The expansion kernel.
/// Group x handles visible slot x, invocation t writes the three vertex indices of triangle t
/// into slot x's fixed span of the index buffer.
pub struct HalaMeshletExpandKernel {
  meshlet_count_per_instance: u32,
  visible_meshlet_indices: Arc<HalaBuffer>,
  meshlets: Arc<HalaBuffer>,
  meshlet_vertex_indices: Arc<HalaBuffer>,
  meshlet_primitive_indices: Arc<HalaBuffer>,
  expanded_indices: Arc<HalaBuffer>,
}

impl HalaMeshletExpandKernel {
  /// Create the kernel.
  /// param buffer_set: The buffer set.
  /// param expanded_indices: The index buffer written by the kernel.
  /// return: The kernel.
  pub fn new(buffer_set: &HalaMeshletBufferSet, expanded_indices: &Arc<HalaBuffer>) -> Self {
    Self {
      meshlet_count_per_instance: buffer_set.meshlet_count_per_instance,
      visible_meshlet_indices: Arc::clone(&buffer_set.visible_meshlet_indices),
      meshlets: Arc::clone(&buffer_set.meshlets),
      meshlet_vertex_indices: Arc::clone(&buffer_set.meshlet_vertex_indices),
      meshlet_primitive_indices: Arc::clone(&buffer_set.meshlet_primitive_indices),
      expanded_indices: Arc::clone(expanded_indices),
    }
  }

  fn resolve_triangle(&self, meshlet: &HalaMeshlet, triangle: u32) -> Option<[u32; 3]> {
    if triangle >= meshlet.primitive_count {
      return None;
    }
    let primitive = self.meshlet_primitive_indices.load_u32((meshlet.primitive_offset + triangle) as usize)?;
    let [a, b, c] = HalaMeshlet::unpack_primitive(primitive);
    let vertex = |corner: u32| self.meshlet_vertex_indices.load_u32((meshlet.vertex_offset + corner) as usize);
    Some([vertex(a)?, vertex(b)?, vertex(c)?])
  }
}

impl HalaComputeKernel for HalaMeshletExpandKernel {
  fn execute(&self, id: &HalaDispatchId) {
    let slot = id.group_id.x;
    let triangle = id.group_thread_id;
    let Some(entry) = self.visible_meshlet_indices.load_u32(slot as usize) else {
      return;
    };
    if self.meshlet_count_per_instance == 0 {
      return;
    }

    let meshlet_index = entry % self.meshlet_count_per_instance;
    let corners = self.meshlets.load::<HalaMeshlet>(meshlet_index as usize)
      .and_then(|meshlet| self.resolve_triangle(&meshlet, triangle))
      .unwrap_or([DEGENERATE_INDEX; 3]);

    let base = slot as usize * MESHLET_INDICES_PER_MESHLET as usize + triangle as usize * 3;
    for (k, index) in corners.into_iter().enumerate() {
      self.expanded_indices.store_u32(base + k, index);
    }
  }
}
