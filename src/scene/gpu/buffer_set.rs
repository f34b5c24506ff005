use std::sync::Arc;

use crate::config::HalaMeshletDrawMode;
use crate::error::HalaRendererError;
use crate::gfx::{
  HalaBuffer,
  HalaBufferUsageFlags,
  HalaContext,
  HalaMemoryLocation,
};
use crate::scene::{
  HalaInstancePara,
  HalaVertex,
  meshlet::MESHLET_INDICES_PER_MESHLET,
};
use crate::scene::cpu::HalaMeshletAsset;
use super::{
  HalaDispatchIndirectArgs,
  HalaDrawIndirectArgs,
  HalaFrameUniform,
};

/// The device buffers of one collection and instance grid.
/// Either every buffer is created or none is.
pub struct HalaMeshletBufferSet {
  pub instance_count: u32,
  pub meshlet_count_per_instance: u32,
  pub total_meshlet_count: u32,

  pub vertices: Arc<HalaBuffer>,
  pub meshlets: Arc<HalaBuffer>,
  pub meshlet_vertex_indices: Arc<HalaBuffer>,
  pub meshlet_primitive_indices: Arc<HalaBuffer>,
  pub bounds_data: Arc<HalaBuffer>,
  pub instance_paras: Arc<HalaBuffer>,

  pub frame_uniform: Arc<HalaBuffer>,
  pub visible_meshlet_indices: Arc<HalaBuffer>,
  pub dispatch_args: Arc<HalaBuffer>,
  pub draw_args: Arc<HalaBuffer>,
  pub expanded_indices: Option<Arc<HalaBuffer>>,
}

/// The implementation of the buffer set.
impl HalaMeshletBufferSet {

  /// Create and fill every buffer.
  /// param context: The device context.
  /// param asset: The meshlet asset.
  /// param instances: The instance parameters.
  /// param draw_mode: The draw mode, the expanded mode needs an index buffer.
  /// return: The buffer set.
  pub fn new(
    context: &HalaContext,
    asset: &HalaMeshletAsset,
    instances: &[HalaInstancePara],
    draw_mode: HalaMeshletDrawMode,
  ) -> Result<Self, HalaRendererError> {
    let collection = &asset.collection;
    let positions = asset.vertex_positions()
      .ok_or(HalaRendererError::configuration(&format!("The meshlet asset \"{}\" has no vertex positions.", asset.name)))?;
    let instance_count = u32::try_from(instances.len())
      .map_err(|_| HalaRendererError::configuration(&format!("Too many instances {}.", instances.len())))?;
    let meshlet_count_per_instance = u32::try_from(collection.len())
      .map_err(|_| HalaRendererError::configuration(&format!("Too many meshlets {}.", collection.len())))?;
    let total_meshlet_count = instance_count.checked_mul(meshlet_count_per_instance)
      .filter(|total| *total > 0)
      .ok_or(HalaRendererError::configuration(&format!(
        "The instance meshlet pair count {} x {} is empty or does not fit in 32 bits.",
        instance_count, meshlet_count_per_instance,
      )))?;

    let vertices = positions.iter().map(|position| HalaVertex::new(*position)).collect::<Vec<_>>();
    let vertices = Arc::new(HalaBuffer::new_with_data(
      context,
      &vertices,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "vertices.buffer",
    )?);
    let meshlets = Arc::new(HalaBuffer::new_with_data(
      context,
      &collection.meshlets,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "meshlets.buffer",
    )?);
    let meshlet_vertex_indices = Arc::new(HalaBuffer::new_with_data(
      context,
      &collection.vertex_indices,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "meshlet_vertex_indices.buffer",
    )?);
    let meshlet_primitive_indices = Arc::new(HalaBuffer::new_with_data(
      context,
      &collection.primitive_indices,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "meshlet_primitive_indices.buffer",
    )?);
    let bounds_data = Arc::new(HalaBuffer::new_with_data(
      context,
      &collection.bounds_data,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "bounds_data.buffer",
    )?);
    let instance_paras = Arc::new(HalaBuffer::new_with_data(
      context,
      instances,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "instance_paras.buffer",
    )?);

    let frame_uniform = Arc::new(HalaBuffer::new(
      context,
      std::mem::size_of::<HalaFrameUniform>() as u64,
      HalaBufferUsageFlags::UNIFORM_BUFFER,
      HalaMemoryLocation::CpuToGpu,
      "frame_uniform.buffer",
    )?);
    // Worst case every pair is visible.
    let visible_meshlet_indices = Arc::new(HalaBuffer::new(
      context,
      u64::from(total_meshlet_count) * std::mem::size_of::<u32>() as u64,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::APPEND,
      HalaMemoryLocation::GpuOnly,
      "visible_meshlet_indices.buffer",
    )?);
    let dispatch_args = Arc::new(HalaBuffer::new_with_data(
      context,
      &[HalaDispatchIndirectArgs::per_item()],
      HalaBufferUsageFlags::INDIRECT_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "dispatch_args.buffer",
    )?);
    let draw_args = Arc::new(HalaBuffer::new_with_data(
      context,
      &[HalaDrawIndirectArgs::per_instance(MESHLET_INDICES_PER_MESHLET)],
      HalaBufferUsageFlags::INDIRECT_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "draw_args.buffer",
    )?);
    let expanded_indices = match draw_mode {
      HalaMeshletDrawMode::Procedural => None,
      HalaMeshletDrawMode::Expanded => Some(Arc::new(HalaBuffer::new(
        context,
        u64::from(total_meshlet_count) * u64::from(MESHLET_INDICES_PER_MESHLET) * std::mem::size_of::<u32>() as u64,
        HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::INDEX_BUFFER,
        HalaMemoryLocation::GpuOnly,
        "expanded_indices.buffer",
      )?)),
    };

    log::debug!(
      "A HalaMeshletBufferSet[{} instances x {} meshlets] is created.",
      instance_count, meshlet_count_per_instance,
    );
    Ok(Self {
      instance_count,
      meshlet_count_per_instance,
      total_meshlet_count,
      vertices,
      meshlets,
      meshlet_vertex_indices,
      meshlet_primitive_indices,
      bounds_data,
      instance_paras,
      frame_uniform,
      visible_meshlet_indices,
      dispatch_args,
      draw_args,
      expanded_indices,
    })
  }

  /// Get the number of culling groups for the given group size.
  pub fn group_count(&self, group_size: u32) -> u32 {
    self.total_meshlet_count.div_ceil(group_size)
  }

  /// Get the total size of all buffers.
  pub fn size(&self) -> u64 {
    [
      &self.vertices,
      &self.meshlets,
      &self.meshlet_vertex_indices,
      &self.meshlet_primitive_indices,
      &self.bounds_data,
      &self.instance_paras,
      &self.frame_uniform,
      &self.visible_meshlet_indices,
      &self.dispatch_args,
      &self.draw_args,
    ].iter().map(|buffer| buffer.size).sum::<u64>()
      + self.expanded_indices.as_ref().map_or(0, |buffer| buffer.size)
  }

  /// Debug readback of the append counter.
  pub fn visible_count(&self) -> u32 {
    self.visible_meshlet_indices.counter_value().unwrap_or(0)
  }

  /// Debug readback of the visible entries of the last frame, in append order.
  pub fn read_visible_indices(&self) -> Result<Vec<u32>, HalaRendererError> {
    let count = (self.visible_count() as usize).min(self.total_meshlet_count as usize);
    self.visible_meshlet_indices.read_memory::<u32>(0, count)
  }

  /// Debug readback of the draw arguments.
  pub fn read_draw_args(&self) -> Result<HalaDrawIndirectArgs, HalaRendererError> {
    self.draw_args.load::<HalaDrawIndirectArgs>(0)
      .ok_or(HalaRendererError::new("Read the draw arguments failed.", None))
  }

  /// Debug readback of the dispatch arguments.
  pub fn read_dispatch_args(&self) -> Result<HalaDispatchIndirectArgs, HalaRendererError> {
    self.dispatch_args.load::<HalaDispatchIndirectArgs>(0)
      .ok_or(HalaRendererError::new("Read the dispatch arguments failed.", None))
  }
}

/// The Drop implementation of the buffer set.
impl Drop for HalaMeshletBufferSet {
  fn drop(&mut self) {
    log::debug!("A HalaMeshletBufferSet[{} bytes] is dropped.", self.size());
  }
}
