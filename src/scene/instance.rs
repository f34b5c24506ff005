use bytemuck::{
  Pod,
  Zeroable,
};
use glam::{
  vec3,
  Mat4,
  Vec2,
  Vec3,
  Vec4,
};
use rand::{
  Rng,
  SeedableRng,
  rngs::StdRng,
};

/// The per instance parameters read by the kernels.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct HalaInstancePara {
  pub model_to_world: [[f32; 4]; 4],
  pub instance_color: [f32; 4],
}

impl HalaInstancePara {
  pub fn new(model_to_world: &Mat4, instance_color: Vec4) -> Self {
    Self {
      model_to_world: model_to_world.to_cols_array_2d(),
      instance_color: instance_color.to_array(),
    }
  }

  pub fn model_to_world(&self) -> Mat4 {
    Mat4::from_cols_array_2d(&self.model_to_world)
  }

  pub fn color(&self) -> Vec4 {
    Vec4::from_array(self.instance_color)
  }
}

/// A rows by columns grid of instances, instance r * columns + c sits at
/// origin + (c * spacing.x, r * spacing.y, 0) with identity rotation and unit scale.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaInstanceGrid {
  pub rows: u32,
  pub columns: u32,
  pub instances: Vec<HalaInstancePara>,
}

/// The implementation of the instance grid.
impl HalaInstanceGrid {

  /// Generate the instance grid.
  /// param rows: The number of rows.
  /// param columns: The number of columns.
  /// param origin: The position of instance 0.
  /// param spacing: The distance between columns and rows.
  /// param seed: The seed of the instance colors.
  /// return: The grid.
  pub fn generate(rows: u32, columns: u32, origin: Vec3, spacing: Vec2, seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut instances = Vec::with_capacity(rows as usize * columns as usize);
    for r in 0..rows {
      for c in 0..columns {
        let position = origin + vec3(c as f32 * spacing.x, r as f32 * spacing.y, 0.0);
        let hsv = vec3(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
        instances.push(HalaInstancePara::new(
          &Mat4::from_translation(position),
          hsv2rgb(hsv).extend(1.0),
        ));
      }
    }

    log::debug!("A HalaInstanceGrid[{} x {}] is generated.", rows, columns);
    Self {
      rows,
      columns,
      instances,
    }
  }

  pub fn len(&self) -> usize {
    self.instances.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instances.is_empty()
  }
}

/// HSV to RGB conversion.
/// param c: Hue, saturation and value in [0, 1].
/// return: The RGB color.
pub fn hsv2rgb(c: Vec3) -> Vec3 {
  fn modulo(x: Vec3, y: Vec3) -> Vec3 {
    x - y * Vec3::floor(x / y)
  }

  let rgb = Vec3::clamp(
    Vec3::abs(modulo(c.x * 6.0 + vec3(0.0, 4.0, 2.0), Vec3::splat(6.0)) - 3.0) - 1.0,
    Vec3::splat(0.0),
    Vec3::splat(1.0),
  );
  c.z * Vec3::lerp(Vec3::splat(1.0), rgb, c.y)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grid_layout_is_row_major() {
    let grid = HalaInstanceGrid::generate(2, 3, vec3(1.0, 0.0, 0.0), Vec2::new(2.0, 5.0), 7);
    assert_eq!(grid.len(), 6);
    let position = grid.instances[4].model_to_world().w_axis.truncate();
    assert_eq!(position, vec3(3.0, 5.0, 0.0));
    assert_eq!(grid.instances[0].color().w, 1.0);
  }

  #[test]
  fn colors_follow_the_seed() {
    let a = HalaInstanceGrid::generate(3, 3, Vec3::ZERO, Vec2::ONE, 42);
    let b = HalaInstanceGrid::generate(3, 3, Vec3::ZERO, Vec2::ONE, 42);
    assert_eq!(a, b);
  }

  #[test]
  fn primary_hues() {
    assert!(hsv2rgb(vec3(0.0, 1.0, 1.0)).abs_diff_eq(vec3(1.0, 0.0, 0.0), 1e-6));
    assert!(hsv2rgb(vec3(1.0 / 3.0, 1.0, 1.0)).abs_diff_eq(vec3(0.0, 1.0, 0.0), 1e-5));
    assert!(hsv2rgb(vec3(0.5, 0.0, 0.5)).abs_diff_eq(Vec3::splat(0.5), 1e-6));
  }
}
