use std::sync::Arc;

use glam::{
  Vec3,
  Vec4,
};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::HalaRendererError;
use crate::gfx::{
  HalaBuffer,
  HalaCommand,
  HalaCommandBuffer,
};
use crate::scene::gpu::HalaDrawIndirectArgs;

/// The output of the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaVertexOutput {
  pub clip_position: Vec4,
  pub world_position: Vec3,
  pub color: Vec4,
  pub instance_index: u32,
  pub meshlet_index: u32,
}

/// A vertex kernel, one call per vertex.
/// Returning None marks the vertex degenerate, every triangle using it is dropped.
pub trait HalaVertexKernel: Send + Sync {
  fn execute(&self, vertex_id: u32, instance_id: u32) -> Option<HalaVertexOutput>;
}

/// An assembled triangle handed to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaRasterTriangle {
  pub instance_id: u32,
  pub primitive_id: u32,
  pub vertices: [HalaVertexOutput; 3],
}

/// The consumer of assembled triangles.
pub trait HalaRasterizer: Send + Sync {
  /// Called once per frame before any draw.
  fn begin_frame(&self) {}

  /// Called concurrently, once per drawn instance with all its non degenerate triangles.
  fn rasterize(&self, triangles: &[HalaRasterTriangle]);
}

/// A rasterizer that keeps the triangles of the last frame.
#[derive(Default)]
pub struct HalaTriangleRecorder {
  triangles: Mutex<Vec<HalaRasterTriangle>>,
}

impl HalaTriangleRecorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.triangles.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.triangles.lock().is_empty()
  }

  /// Get a copy of the recorded triangles.
  pub fn triangles(&self) -> Vec<HalaRasterTriangle> {
    self.triangles.lock().clone()
  }
}

impl HalaRasterizer for HalaTriangleRecorder {
  fn begin_frame(&self) {
    self.triangles.lock().clear();
  }

  fn rasterize(&self, triangles: &[HalaRasterTriangle]) {
    self.triangles.lock().extend_from_slice(triangles);
  }
}

/// A rasterizer that drops everything.
pub struct HalaNullRasterizer;

impl HalaRasterizer for HalaNullRasterizer {
  fn rasterize(&self, _triangles: &[HalaRasterTriangle]) {}
}

/// The graphics program.
pub struct HalaGraphicsProgram {
  pub debug_name: String,
  vertex_kernel: Box<dyn HalaVertexKernel>,
  rasterizer: Arc<dyn HalaRasterizer>,
}

/// The Drop implementation of the graphics program.
impl Drop for HalaGraphicsProgram {
  fn drop(&mut self) {
    log::debug!("A HalaGraphicsProgram \"{}\" is dropped.", self.debug_name);
  }
}

/// The implementation of the graphics program.
impl HalaGraphicsProgram {

  /// Create a new graphics program.
  /// param vertex_kernel: The vertex kernel.
  /// param rasterizer: The rasterizer receiving the triangles.
  /// param debug_name: The debug name.
  /// return: The result of the graphics program.
  pub fn new<K>(
    vertex_kernel: K,
    rasterizer: Arc<dyn HalaRasterizer>,
    debug_name: &str,
  ) -> Result<Self, HalaRendererError>
  where
    K: HalaVertexKernel + 'static,
  {
    log::debug!("A HalaGraphicsProgram \"{}\" is created.", debug_name);
    Ok(Self {
      debug_name: debug_name.to_string(),
      vertex_kernel: Box::new(vertex_kernel),
      rasterizer,
    })
  }

  pub fn rasterizer(&self) -> &Arc<dyn HalaRasterizer> {
    &self.rasterizer
  }

  /// Draw with indirect arguments.
  /// param command_buffer: The command buffer.
  /// param buffer: The buffer holding a HalaDrawIndirectArgs.
  /// param offset: The offset.
  pub fn draw_indirect(
    self: &Arc<Self>,
    command_buffer: &mut HalaCommandBuffer,
    buffer: &Arc<HalaBuffer>,
    offset: u64,
  ) {
    command_buffer.record(HalaCommand::DrawIndirect {
      program: Arc::clone(self),
      args: Arc::clone(buffer),
      offset,
    });
  }

  /// Run the vertex stage and primitive assembly for every instance.
  pub(crate) fn execute(&self, args: &HalaDrawIndirectArgs) {
    let num_of_triangles = args.index_count_per_instance / 3;
    let first_instance = args.start_instance;
    let last_instance = first_instance.saturating_add(args.instance_count);

    (first_instance..last_instance).into_par_iter().for_each(|instance_id| {
      let mut triangles = Vec::with_capacity(num_of_triangles as usize);
      for primitive_id in 0..num_of_triangles {
        let first_vertex = args.start_index
          .wrapping_add(primitive_id * 3)
          .wrapping_add_signed(args.base_vertex);
        let corner = |k: u32| self.vertex_kernel.execute(first_vertex.wrapping_add(k), instance_id);
        if let (Some(a), Some(b), Some(c)) = (corner(0), corner(1), corner(2)) {
          triangles.push(HalaRasterTriangle {
            instance_id,
            primitive_id,
            vertices: [a, b, c],
          });
        }
      }
      if !triangles.is_empty() {
        self.rasterizer.rasterize(&triangles);
      }
    });
  }
}
