use bytemuck::{
  Pod,
  Zeroable,
};
use glam::Vec3;

/// The vertex, only positions are needed for visibility.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct HalaVertex {
  pub position: [f32; 3],
}

impl HalaVertex {
  pub fn new(position: [f32; 3]) -> Self {
    Self { position }
  }

  pub fn position(&self) -> Vec3 {
    Vec3::from(self.position)
  }
}

impl From<[f32; 3]> for HalaVertex {
  fn from(position: [f32; 3]) -> Self {
    Self { position }
  }
}
