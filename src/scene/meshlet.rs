use std::ops::Range;

use bytemuck::{
  Pod,
  Zeroable,
};
use serde::{
  Serialize,
  Deserialize,
};

/// The maximum number of unique vertices of one meshlet.
pub const MESHLET_MAX_VERTICES: u32 = 64;
/// The maximum number of triangles of one meshlet.
pub const MESHLET_MAX_PRIMITIVES: u32 = 126;
/// Every meshlet is drawn as a fixed span of indices, unused triangles are degenerate.
pub const MESHLET_INDICES_PER_MESHLET: u32 = MESHLET_MAX_PRIMITIVES * 3;

/// The meshlet.
/// A small cluster of triangles addressing the shared vertex and primitive tables.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct HalaMeshlet {
  /// The first entry in the meshlet vertex index table.
  pub vertex_offset: u32,
  /// The first entry in the meshlet primitive table.
  pub primitive_offset: u32,
  pub vertex_count: u32,
  pub primitive_count: u32,
}

/// The implementation of the meshlet.
impl HalaMeshlet {

  /// Create a new meshlet.
  /// param vertex_offset: The offset into the vertex index table.
  /// param primitive_offset: The offset into the primitive table.
  /// param vertex_count: The number of vertices.
  /// param primitive_count: The number of triangles.
  /// return: The meshlet.
  pub fn new(vertex_offset: u32, primitive_offset: u32, vertex_count: u32, primitive_count: u32) -> Self {
    Self {
      vertex_offset,
      primitive_offset,
      vertex_count,
      primitive_count,
    }
  }

  pub fn vertex_range(&self) -> Range<usize> {
    self.vertex_offset as usize..self.vertex_offset as usize + self.vertex_count as usize
  }

  pub fn primitive_range(&self) -> Range<usize> {
    self.primitive_offset as usize..self.primitive_offset as usize + self.primitive_count as usize
  }

  /// Pack the three meshlet local corner indices of a triangle into one word.
  /// param a: The first corner.
  /// param b: The second corner.
  /// param c: The third corner.
  /// return: a | b << 8 | c << 16.
  pub fn pack_primitive(a: u8, b: u8, c: u8) -> u32 {
    u32::from(a) | (u32::from(b) << 8) | (u32::from(c) << 16)
  }

  /// Unpack a primitive word into its three local corner indices.
  pub fn unpack_primitive(primitive: u32) -> [u32; 3] {
    [primitive & 0xff, (primitive >> 8) & 0xff, (primitive >> 16) & 0xff]
  }
}
