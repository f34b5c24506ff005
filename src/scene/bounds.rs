use bytemuck::{
  Pod,
  Zeroable,
};
use glam::Vec3;
use serde::{
  Serialize,
  Deserialize,
};

/// A cutoff byte of 127 marks a normal cone wider than a hemisphere, it never culls.
pub const DEGENERATE_CONE_CUTOFF: i8 = 127;

/// The culling bounds of one meshlet in mesh space.
/// The normal cone axis and cutoff are quantized to signed bytes and packed into one word:
/// axis x, y, z in bytes 0 to 2 and the cutoff in byte 3.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct HalaBoundsData {
  /// Center xyz and radius w.
  pub bounding_sphere: [f32; 4],
  pub normal_cone: u32,
  /// The distance from the sphere center back to the cone apex along the cone axis.
  pub apex_offset: f32,
}

/// Implementation of HalaBoundsData.
impl HalaBoundsData {

  /// Create a new bounds data.
  /// param center: The center of the bounding sphere.
  /// param radius: The radius of the bounding sphere.
  /// param cone_axis: The quantized cone axis.
  /// param cone_cutoff: The quantized cone cutoff.
  /// param apex_offset: The apex offset.
  /// return: The bounds data.
  pub fn new(center: [f32; 3], radius: f32, cone_axis: [i8; 3], cone_cutoff: i8, apex_offset: f32) -> Self {
    Self {
      bounding_sphere: [center[0], center[1], center[2], radius],
      normal_cone: Self::pack_normal_cone(cone_axis, cone_cutoff),
      apex_offset,
    }
  }

  /// Create bounds whose normal cone never culls.
  pub fn with_sphere(center: [f32; 3], radius: f32) -> Self {
    Self::new(center, radius, [0, 0, 0], DEGENERATE_CONE_CUTOFF, 0.0)
  }

  pub fn pack_normal_cone(axis: [i8; 3], cutoff: i8) -> u32 {
    u32::from_le_bytes([axis[0] as u8, axis[1] as u8, axis[2] as u8, cutoff as u8])
  }

  pub fn center(&self) -> Vec3 {
    Vec3::new(self.bounding_sphere[0], self.bounding_sphere[1], self.bounding_sphere[2])
  }

  pub fn radius(&self) -> f32 {
    self.bounding_sphere[3]
  }

  pub fn cone_axis_s8(&self) -> [i8; 3] {
    let bytes = self.normal_cone.to_le_bytes();
    [bytes[0] as i8, bytes[1] as i8, bytes[2] as i8]
  }

  pub fn cone_cutoff_s8(&self) -> i8 {
    self.normal_cone.to_le_bytes()[3] as i8
  }

  /// Get the dequantized cone axis, not renormalized.
  pub fn cone_axis(&self) -> Vec3 {
    let [x, y, z] = self.cone_axis_s8();
    Vec3::new(f32::from(x), f32::from(y), f32::from(z)) / 127.0
  }

  /// Get the dequantized cone cutoff.
  pub fn cone_cutoff(&self) -> f32 {
    f32::from(self.cone_cutoff_s8()) / 127.0
  }

  pub fn is_cone_degenerate(&self) -> bool {
    self.cone_cutoff_s8() == DEGENERATE_CONE_CUTOFF
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normal_cone_packing() {
    let bounds = HalaBoundsData::new([1.0, 2.0, 3.0], 4.0, [-127, 0, 127], 90, 0.5);
    assert_eq!(bounds.cone_axis_s8(), [-127, 0, 127]);
    assert_eq!(bounds.cone_cutoff_s8(), 90);
    assert_eq!(bounds.cone_axis(), Vec3::new(-1.0, 0.0, 1.0));
    assert_eq!(bounds.center(), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(bounds.radius(), 4.0);
    assert!(!bounds.is_cone_degenerate());
    assert!(HalaBoundsData::with_sphere([0.0; 3], 1.0).is_cone_degenerate());
    assert_eq!(std::mem::size_of::<HalaBoundsData>(), 24);
  }
}
