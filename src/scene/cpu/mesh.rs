use serde::{
  Serialize,
  Deserialize,
};

/// A triangle list mesh in mesh space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HalaSourceMesh {
  pub name: String,
  pub positions: Vec<[f32; 3]>,
  pub indices: Vec<u32>,
}

/// The implementation of the source mesh.
impl HalaSourceMesh {

  /// Create a new source mesh.
  /// param name: The name.
  /// param positions: The vertex positions.
  /// param indices: The triangle list indices.
  /// return: The source mesh.
  pub fn new(name: &str, positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
    Self {
      name: name.to_string(),
      positions,
      indices,
    }
  }

  /// Check whether the mesh data can be used to build meshlets.
  pub fn is_readable(&self) -> bool {
    !self.positions.is_empty() && !self.indices.is_empty()
  }

  /// Create an axis aligned unit cube centered on the origin, 8 vertices and 12 outward facing triangles.
  pub fn cube(name: &str) -> Self {
    let positions = vec![
      [-0.5, -0.5, -0.5],
      [0.5, -0.5, -0.5],
      [0.5, 0.5, -0.5],
      [-0.5, 0.5, -0.5],
      [-0.5, -0.5, 0.5],
      [0.5, -0.5, 0.5],
      [0.5, 0.5, 0.5],
      [-0.5, 0.5, 0.5],
    ];
    let indices = vec![
      // -z
      0, 2, 1, 0, 3, 2,
      // +z
      4, 5, 6, 4, 6, 7,
      // -x
      0, 4, 7, 0, 7, 3,
      // +x
      1, 2, 6, 1, 6, 5,
      // -y
      0, 1, 5, 0, 5, 4,
      // +y
      3, 7, 6, 3, 6, 2,
    ];
    Self::new(name, positions, indices)
  }
}
