use std::sync::Arc;

use glam::Vec4;

use crate::gfx::HalaBuffer;
use crate::graphics_program::{
  HalaVertexKernel,
  HalaVertexOutput,
};
use crate::scene::{
  HalaInstancePara,
  HalaMeshlet,
  HalaVertex,
  meshlet::MESHLET_INDICES_PER_MESHLET,
};
use crate::scene::gpu::{
  HalaFrameUniform,
  HalaMeshletBufferSet,
};
use super::expand::DEGENERATE_INDEX;

/// The buffers every vertex kernel reads to place a vertex in the world.
struct HalaVertexFetch {
  meshlet_count_per_instance: u32,
  frame_uniform: Arc<HalaBuffer>,
  visible_meshlet_indices: Arc<HalaBuffer>,
  instance_paras: Arc<HalaBuffer>,
  vertices: Arc<HalaBuffer>,
}

impl HalaVertexFetch {
  fn new(buffer_set: &HalaMeshletBufferSet) -> Self {
    Self {
      meshlet_count_per_instance: buffer_set.meshlet_count_per_instance,
      frame_uniform: Arc::clone(&buffer_set.frame_uniform),
      visible_meshlet_indices: Arc::clone(&buffer_set.visible_meshlet_indices),
      instance_paras: Arc::clone(&buffer_set.instance_paras),
      vertices: Arc::clone(&buffer_set.vertices),
    }
  }

  /// Resolve a visible slot into (instance index, meshlet index).
  fn visible_entry(&self, slot: u32) -> Option<(u32, u32)> {
    if self.meshlet_count_per_instance == 0 {
      return None;
    }
    let entry = self.visible_meshlet_indices.load_u32(slot as usize)?;
    Some((entry / self.meshlet_count_per_instance, entry % self.meshlet_count_per_instance))
  }

  fn shade(&self, vertex_index: u32, instance_index: u32, meshlet_index: u32) -> Option<HalaVertexOutput> {
    let frame = self.frame_uniform.load::<HalaFrameUniform>(0)?;
    let instance = self.instance_paras.load::<HalaInstancePara>(instance_index as usize)?;
    let vertex = self.vertices.load::<HalaVertex>(vertex_index as usize)?;

    let world_position = instance.model_to_world().transform_point3(vertex.position());
    Some(HalaVertexOutput {
      clip_position: frame.view_proj() * world_position.extend(1.0),
      world_position,
      color: Vec4::from_array(instance.instance_color),
      instance_index,
      meshlet_index,
    })
  }
}

/// The vertex kernel of the procedural draw.
/// Every draw instance is one visible slot, vertex id v is corner v % 3 of triangle v / 3.
pub struct HalaMeshletProceduralVertexKernel {
  fetch: HalaVertexFetch,
  meshlets: Arc<HalaBuffer>,
  meshlet_vertex_indices: Arc<HalaBuffer>,
  meshlet_primitive_indices: Arc<HalaBuffer>,
}

impl HalaMeshletProceduralVertexKernel {
  pub fn new(buffer_set: &HalaMeshletBufferSet) -> Self {
    Self {
      fetch: HalaVertexFetch::new(buffer_set),
      meshlets: Arc::clone(&buffer_set.meshlets),
      meshlet_vertex_indices: Arc::clone(&buffer_set.meshlet_vertex_indices),
      meshlet_primitive_indices: Arc::clone(&buffer_set.meshlet_primitive_indices),
    }
  }
}

impl HalaVertexKernel for HalaMeshletProceduralVertexKernel {
  fn execute(&self, vertex_id: u32, instance_id: u32) -> Option<HalaVertexOutput> {
    let (instance_index, meshlet_index) = self.fetch.visible_entry(instance_id)?;
    let meshlet = self.meshlets.load::<HalaMeshlet>(meshlet_index as usize)?;
    let triangle = vertex_id / 3;
    if triangle >= meshlet.primitive_count {
      return None;
    }

    let primitive = self.meshlet_primitive_indices.load_u32((meshlet.primitive_offset + triangle) as usize)?;
    let corner = HalaMeshlet::unpack_primitive(primitive)[(vertex_id % 3) as usize];
    let vertex_index = self.meshlet_vertex_indices.load_u32((meshlet.vertex_offset + corner) as usize)?;
    self.fetch.shade(vertex_index, instance_index, meshlet_index)
  }
}

/// The vertex kernel of the expanded draw, vertex ids are read from the expanded index buffer.
pub struct HalaMeshletExpandedVertexKernel {
  fetch: HalaVertexFetch,
  expanded_indices: Arc<HalaBuffer>,
}

impl HalaMeshletExpandedVertexKernel {
  pub fn new(buffer_set: &HalaMeshletBufferSet, expanded_indices: &Arc<HalaBuffer>) -> Self {
    Self {
      fetch: HalaVertexFetch::new(buffer_set),
      expanded_indices: Arc::clone(expanded_indices),
    }
  }
}

impl HalaVertexKernel for HalaMeshletExpandedVertexKernel {
  fn execute(&self, vertex_id: u32, instance_id: u32) -> Option<HalaVertexOutput> {
    let (instance_index, meshlet_index) = self.fetch.visible_entry(instance_id)?;
    let position = instance_id as usize * MESHLET_INDICES_PER_MESHLET as usize + vertex_id as usize;
    let vertex_index = self.expanded_indices.load_u32(position)?;
    if vertex_index == DEGENERATE_INDEX {
      return None;
    }
    self.fetch.shade(vertex_index, instance_index, meshlet_index)
  }
}
