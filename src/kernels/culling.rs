use std::sync::Arc;

use glam::{
  Mat4,
  Vec3,
};

use crate::compute_program::{
  HalaComputeKernel,
  HalaDispatchId,
};
use crate::gfx::HalaBuffer;
use crate::scene::{
  HalaBoundsData,
  HalaInstancePara,
};
use crate::scene::cpu::HalaPlane;
use crate::scene::gpu::{
  HalaFrameUniform,
  HalaMeshletBufferSet,
};

/// One invocation per (instance, meshlet) pair.
pub const CULLING_GROUP_SIZE: u32 = 64;

/// Get the largest axis scale of a transform, the radius scale under uniform scaling.
pub fn instance_scale(model_to_world: &Mat4) -> f32 {
  model_to_world.x_axis.truncate().length()
    .max(model_to_world.y_axis.truncate().length())
    .max(model_to_world.z_axis.truncate().length())
}

/// Check whether a world space sphere lies entirely outside one of the planes.
/// param center: The world space center.
/// param radius: The world space radius.
/// param planes: The frustum planes.
/// return: True if culled.
pub fn is_sphere_culled(center: Vec3, radius: f32, planes: &[HalaPlane; 6]) -> bool {
  planes.iter().any(|plane| plane.signed_distance(center) < -radius)
}

/// Check whether every triangle of a meshlet faces away from the camera.
/// param bounds: The mesh space bounds.
/// param model_to_world: The instance transform.
/// param camera_position: The world space camera position.
/// return: True if culled.
pub fn is_cone_backfacing(bounds: &HalaBoundsData, model_to_world: &Mat4, camera_position: Vec3) -> bool {
  if bounds.is_cone_degenerate() {
    return false;
  }

  let scale = instance_scale(model_to_world);
  if scale <= 0.0 {
    return false;
  }
  // Rotation only, the quantized axis length stays as built.
  let axis = model_to_world.transform_vector3(bounds.cone_axis()) / scale;
  let center = model_to_world.transform_point3(bounds.center());
  let apex = center - axis.normalize_or_zero() * (bounds.apex_offset * scale);

  let view = (camera_position - apex).normalize_or_zero();
  if view == Vec3::ZERO {
    return false;
  }
  view.dot(-axis) >= bounds.cone_cutoff()
}

/// The visibility of one (instance, meshlet) pair.
/// param bounds: The meshlet bounds.
/// param instance: The instance.
/// param frame: The frame constants.
/// return: True if the pair should be drawn.
pub fn is_meshlet_visible(bounds: &HalaBoundsData, instance: &HalaInstancePara, frame: &HalaFrameUniform) -> bool {
  let model_to_world = instance.model_to_world();
  let center = model_to_world.transform_point3(bounds.center());
  let radius = bounds.radius() * instance_scale(&model_to_world);
  if is_sphere_culled(center, radius, &frame.planes()) {
    return false;
  }
  !(frame.is_cone_culling_enabled() && is_cone_backfacing(bounds, &model_to_world, frame.camera_position()))
}

/// The culling kernel, appends the flattened index of every visible pair.
pub struct HalaMeshletCullingKernel {
  frame_uniform: Arc<HalaBuffer>,
  instance_paras: Arc<HalaBuffer>,
  bounds_data: Arc<HalaBuffer>,
  visible_meshlet_indices: Arc<HalaBuffer>,
}

impl HalaMeshletCullingKernel {
  pub fn new(buffer_set: &HalaMeshletBufferSet) -> Self {
    Self {
      frame_uniform: Arc::clone(&buffer_set.frame_uniform),
      instance_paras: Arc::clone(&buffer_set.instance_paras),
      bounds_data: Arc::clone(&buffer_set.bounds_data),
      visible_meshlet_indices: Arc::clone(&buffer_set.visible_meshlet_indices),
    }
  }
}

impl HalaComputeKernel for HalaMeshletCullingKernel {
  fn execute(&self, id: &HalaDispatchId) {
    let Some(frame) = self.frame_uniform.load::<HalaFrameUniform>(0) else {
      return;
    };
    let index = id.dispatch_thread_id;
    if index >= frame.total_meshlet_count || frame.meshlet_count_per_instance == 0 {
      return;
    }

    let instance_index = index / frame.meshlet_count_per_instance;
    let meshlet_index = index % frame.meshlet_count_per_instance;
    let (Some(instance), Some(bounds)) = (
      self.instance_paras.load::<HalaInstancePara>(instance_index as usize),
      self.bounds_data.load::<HalaBoundsData>(meshlet_index as usize),
    ) else {
      return;
    };

    if is_meshlet_visible(&bounds, &instance, &frame) {
      if let Some(slot) = self.visible_meshlet_indices.increment_counter() {
        self.visible_meshlet_indices.store_u32(slot as usize, index);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use glam::Vec4;

  use super::*;

  fn box_planes(min: Vec3, max: Vec3) -> [HalaPlane; 6] {
    [
      HalaPlane::new(Vec3::X, -min.x),
      HalaPlane::new(-Vec3::X, max.x),
      HalaPlane::new(Vec3::Y, -min.y),
      HalaPlane::new(-Vec3::Y, max.y),
      HalaPlane::new(Vec3::Z, -min.z),
      HalaPlane::new(-Vec3::Z, max.z),
    ]
  }

  #[test]
  fn sphere_against_planes() {
    let planes = box_planes(Vec3::splat(-1.0), Vec3::splat(1.0));
    assert!(!is_sphere_culled(Vec3::ZERO, 0.5, &planes));
    // Straddling a plane is visible.
    assert!(!is_sphere_culled(Vec3::new(1.2, 0.0, 0.0), 0.5, &planes));
    assert!(is_sphere_culled(Vec3::new(1.6, 0.0, 0.0), 0.5, &planes));
    assert!(is_sphere_culled(Vec3::new(0.0, -3.0, 0.0), 0.5, &planes));
  }

  #[test]
  fn radius_follows_instance_scale() {
    let model = Mat4::from_scale_rotation_translation(Vec3::splat(3.0), glam::Quat::IDENTITY, Vec3::new(2.0, 0.0, 0.0));
    assert!((instance_scale(&model) - 3.0).abs() < 1e-6);

    let frame = HalaFrameUniform {
      planes: box_planes(Vec3::splat(-1.0), Vec3::splat(1.0)).map(|plane| plane.to_array()),
      camera_position: [0.0; 4],
      view_proj: Mat4::IDENTITY.to_cols_array_2d(),
      instance_count: 1,
      meshlet_count_per_instance: 1,
      total_meshlet_count: 1,
      flags: 0,
    };
    let bounds = HalaBoundsData::with_sphere([0.0; 3], 0.5);
    // Center at x = 2, scaled radius 1.5 reaches back to x = 0.5.
    assert!(is_meshlet_visible(&bounds, &HalaInstancePara::new(&model, Vec4::ONE), &frame));
    let unscaled = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
    assert!(!is_meshlet_visible(&bounds, &HalaInstancePara::new(&unscaled, Vec4::ONE), &frame));
  }

  #[test]
  fn cone_rejects_clusters_facing_away() {
    // Normals within a narrow cone around +z, apex slightly behind the center.
    let bounds = HalaBoundsData::new([0.0; 3], 1.0, [0, 0, 127], 13, 0.1);
    let model = Mat4::IDENTITY;
    assert!(!is_cone_backfacing(&bounds, &model, Vec3::new(0.0, 0.0, 10.0)));
    assert!(is_cone_backfacing(&bounds, &model, Vec3::new(0.0, 0.0, -10.0)));
    // Rotating the instance half a turn flips the result.
    let flipped = Mat4::from_rotation_x(std::f32::consts::PI);
    assert!(is_cone_backfacing(&bounds, &flipped, Vec3::new(0.0, 0.0, 10.0)));
    // Degenerate cones never cull.
    let degenerate = HalaBoundsData::with_sphere([0.0; 3], 1.0);
    assert!(!is_cone_backfacing(&degenerate, &model, Vec3::new(0.0, 0.0, -10.0)));
  }
}
