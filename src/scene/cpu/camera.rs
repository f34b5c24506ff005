use glam::{
  Mat4,
  Vec3,
  Vec4,
};

/// A plane, points with normal . p + distance >= 0 are on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaPlane {
  pub normal: Vec3,
  pub distance: f32,
}

impl Default for HalaPlane {
  fn default() -> Self {
    Self {
      normal: Vec3::Y,
      distance: 0.0,
    }
  }
}

impl HalaPlane {
  pub fn new(normal: Vec3, distance: f32) -> Self {
    Self { normal, distance }
  }

  /// Create a plane from xyz normal and w distance, scaled to a unit normal.
  pub fn from_vec4_normalized(plane: Vec4) -> Self {
    let normal = plane.truncate();
    let length = normal.length();
    if length > 0.0 {
      Self::new(normal / length, plane.w / length)
    } else {
      Self::new(normal, plane.w)
    }
  }

  pub fn signed_distance(&self, point: Vec3) -> f32 {
    self.normal.dot(point) + self.distance
  }

  pub fn to_array(&self) -> [f32; 4] {
    self.normal.extend(self.distance).to_array()
  }
}

/// The camera driving the visibility pass.
/// Planes are ordered left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaCamera {
  pub position: Vec3,
  pub view_proj: Mat4,
  pub planes: [HalaPlane; 6],
}

/// The implementation of the camera.
impl HalaCamera {

  /// Create a camera from a view projection matrix with a 0 to 1 depth range.
  /// param position: The world space position.
  /// param view_proj: The view projection matrix.
  /// return: The camera.
  pub fn from_view_proj(position: Vec3, view_proj: Mat4) -> Self {
    let r0 = view_proj.row(0);
    let r1 = view_proj.row(1);
    let r2 = view_proj.row(2);
    let r3 = view_proj.row(3);
    let planes = [
      r3 + r0,
      r3 - r0,
      r3 + r1,
      r3 - r1,
      r2,
      r3 - r2,
    ].map(HalaPlane::from_vec4_normalized);

    Self {
      position,
      view_proj,
      planes,
    }
  }

  /// Create a right handed perspective camera looking at a target.
  /// param eye: The position.
  /// param target: The look at target.
  /// param up: The up direction.
  /// param yfov: The vertical field of view in radians.
  /// param aspect: The aspect ratio.
  /// param znear: The near distance.
  /// param zfar: The far distance.
  /// return: The camera.
  pub fn look_at_perspective(eye: Vec3, target: Vec3, up: Vec3, yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
    let view = Mat4::look_at_rh(eye, target, up);
    let proj = Mat4::perspective_rh(yfov, aspect, znear, zfar);
    Self::from_view_proj(eye, proj * view)
  }

  /// Create a camera from explicit planes, the view projection is left as identity.
  pub fn from_planes(position: Vec3, planes: [HalaPlane; 6]) -> Self {
    Self {
      position,
      view_proj: Mat4::IDENTITY,
      planes,
    }
  }

  /// Check a world space point against all six planes.
  pub fn contains_point(&self, point: Vec3) -> bool {
    self.planes.iter().all(|plane| plane.signed_distance(point) >= 0.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn perspective_planes_enclose_the_view() {
    let camera = HalaCamera::look_at_perspective(
      Vec3::new(0.0, 0.0, 10.0),
      Vec3::ZERO,
      Vec3::Y,
      std::f32::consts::FRAC_PI_4,
      1.0,
      0.1,
      100.0,
    );
    assert!(camera.contains_point(Vec3::ZERO));
    assert!(!camera.contains_point(Vec3::new(0.0, 0.0, 20.0)));
    assert!(!camera.contains_point(Vec3::new(50.0, 0.0, 0.0)));
    assert!(!camera.contains_point(Vec3::new(0.0, 0.0, -200.0)));
    for plane in camera.planes.iter() {
      assert!((plane.normal.length() - 1.0).abs() < 1e-5);
    }
  }
}
