use bytemuck::{
  Pod,
  Zeroable,
};
use glam::{
  Mat4,
  Vec3,
};

use crate::scene::cpu::{
  HalaCamera as HalaCameraInCPU,
  HalaPlane,
};

/// Frame flag: reject clusters whose normal cone faces away from the camera.
pub const FRAME_FLAG_CONE_CULLING: u32 = 0x1;

/// The per frame constants in the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct HalaFrameUniform {
  pub planes: [[f32; 4]; 6],
  pub camera_position: [f32; 4],
  pub view_proj: [[f32; 4]; 4],
  pub instance_count: u32,
  pub meshlet_count_per_instance: u32,
  pub total_meshlet_count: u32,
  pub flags: u32,
}

/// The implementation of the frame uniform.
impl HalaFrameUniform {

  /// Create the frame constants.
  /// param camera_in_cpu: The camera.
  /// param instance_count: The number of instances.
  /// param meshlet_count_per_instance: The number of meshlets of the collection.
  /// param flags: The frame flags.
  /// return: The frame uniform.
  pub fn new(camera_in_cpu: &HalaCameraInCPU, instance_count: u32, meshlet_count_per_instance: u32, flags: u32) -> Self {
    Self {
      planes: camera_in_cpu.planes.map(|plane| plane.to_array()),
      camera_position: camera_in_cpu.position.extend(1.0).to_array(),
      view_proj: camera_in_cpu.view_proj.to_cols_array_2d(),
      instance_count,
      meshlet_count_per_instance,
      total_meshlet_count: instance_count.saturating_mul(meshlet_count_per_instance),
      flags,
    }
  }

  pub fn planes(&self) -> [HalaPlane; 6] {
    self.planes.map(|[x, y, z, w]| HalaPlane::new(Vec3::new(x, y, z), w))
  }

  pub fn camera_position(&self) -> Vec3 {
    Vec3::new(self.camera_position[0], self.camera_position[1], self.camera_position[2])
  }

  pub fn view_proj(&self) -> Mat4 {
    Mat4::from_cols_array_2d(&self.view_proj)
  }

  pub fn is_cone_culling_enabled(&self) -> bool {
    self.flags & FRAME_FLAG_CONE_CULLING != 0
  }
}
