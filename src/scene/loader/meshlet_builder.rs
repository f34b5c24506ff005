use std::mem::size_of;

use glam::Vec3;
use meshopt::VertexDataAdapter;
use serde::{
  Serialize,
  Deserialize,
};

use crate::error::HalaRendererError;
use crate::scene::{
  HalaBoundsData,
  HalaMeshlet,
  bounds::DEGENERATE_CONE_CUTOFF,
  meshlet::{
    MESHLET_MAX_PRIMITIVES,
    MESHLET_MAX_VERTICES,
  },
};
use crate::scene::cpu::HalaMeshletCollection;

fn default_as_true() -> bool {
  true
}

fn default_max_vertices() -> u32 {
  64
}

fn default_max_primitives() -> u32 {
  64
}

fn default_cone_weight() -> f32 {
  0.5
}

/// The meshlet build options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalaMeshletBuildOptions {
  /// Merge vertices with identical positions.
  #[serde(default = "default_as_true")]
  pub fuse_vertices: bool,
  /// Reorder triangles for the post transform vertex cache.
  #[serde(default = "default_as_true")]
  pub optimize: bool,
  /// Reorder vertices in first use order.
  #[serde(default = "default_as_true")]
  pub remap_indices: bool,
  #[serde(default = "default_max_vertices")]
  pub max_vertices_per_cluster: u32,
  #[serde(default = "default_max_primitives")]
  pub max_primitives_per_cluster: u32,
  /// Trade spatial compactness for tighter normal cones, in [0, 1].
  #[serde(default = "default_cone_weight")]
  pub cone_weight: f32,
}

impl Default for HalaMeshletBuildOptions {
  fn default() -> Self {
    Self {
      fuse_vertices: true,
      optimize: true,
      remap_indices: true,
      max_vertices_per_cluster: default_max_vertices(),
      max_primitives_per_cluster: default_max_primitives(),
      cone_weight: default_cone_weight(),
    }
  }
}

impl HalaMeshletBuildOptions {
  /// Check the limits.
  /// return: The result.
  pub fn validate(&self) -> Result<(), HalaRendererError> {
    if !(3..=MESHLET_MAX_VERTICES).contains(&self.max_vertices_per_cluster) {
      return Err(HalaRendererError::build(
        &format!("The max vertices per cluster {} is out of [3, {}].", self.max_vertices_per_cluster, MESHLET_MAX_VERTICES),
        None,
      ));
    }
    if !(4..=MESHLET_MAX_PRIMITIVES).contains(&self.max_primitives_per_cluster) {
      return Err(HalaRendererError::build(
        &format!("The max primitives per cluster {} is out of [4, {}].", self.max_primitives_per_cluster, MESHLET_MAX_PRIMITIVES),
        None,
      ));
    }
    if !(0.0..=1.0).contains(&self.cone_weight) {
      return Err(HalaRendererError::build(
        &format!("The cone weight {} is out of [0, 1].", self.cone_weight),
        None,
      ));
    }
    Ok(())
  }

  /// The clusterizer needs a triangle limit divisible by 4.
  pub fn aligned_max_primitives(&self) -> u32 {
    self.max_primitives_per_cluster & !3
  }
}

/// The meshlet builder.
pub struct HalaMeshletBuilder;

/// The implementation of the meshlet builder.
impl HalaMeshletBuilder {

  /// Split a triangle list mesh into meshlets.
  /// param indices: The triangle list indices.
  /// param positions: The vertex positions.
  /// param options: The build options.
  /// return: The complete and validated collection.
  pub fn build(
    indices: &[u32],
    positions: &[[f32; 3]],
    options: &HalaMeshletBuildOptions,
  ) -> Result<HalaMeshletCollection, HalaRendererError> {
    options.validate()?;
    if indices.is_empty() || positions.is_empty() {
      return Err(HalaRendererError::build("The mesh is empty.", None));
    }
    if indices.len() % 3 != 0 {
      return Err(HalaRendererError::build(
        &format!("The index count {} is not a triangle list.", indices.len()),
        None,
      ));
    }
    if let Some(index) = indices.iter().find(|index| **index as usize >= positions.len()) {
      return Err(HalaRendererError::build(
        &format!("The index {} is out of {} vertices.", index, positions.len()),
        None,
      ));
    }

    let mut indices = indices.to_vec();
    let mut vertices = positions.to_vec();
    let mut is_rewritten = false;

    if options.fuse_vertices {
      let (vertex_count, remap) = meshopt::generate_vertex_remap(&vertices, Some(indices.as_slice()));
      indices = meshopt::remap_index_buffer(Some(indices.as_slice()), vertex_count, &remap);
      vertices = meshopt::remap_vertex_buffer(&vertices, vertex_count, &remap);
      is_rewritten = true;
    }
    if options.optimize {
      meshopt::optimize_vertex_cache_in_place(&mut indices, vertices.len());
    }
    if options.remap_indices {
      let vertex_count = meshopt::optimize_vertex_fetch_in_place(&mut indices, &mut vertices);
      vertices.truncate(vertex_count);
      is_rewritten = true;
    }

    let adapter = VertexDataAdapter::new(bytemuck::cast_slice(&vertices), size_of::<[f32; 3]>(), 0)
      .map_err(|err| HalaRendererError::build(&format!("Create the vertex adapter failed: {:?}.", err), None))?;
    let out = meshopt::build_meshlets(
      &indices,
      &adapter,
      options.max_vertices_per_cluster as usize,
      options.aligned_max_primitives() as usize,
      options.cone_weight,
    );
    if out.meshlets.is_empty() {
      return Err(HalaRendererError::build("Failed to build meshlets.", None));
    }

    let mut collection = HalaMeshletCollection::default();
    for meshlet in out.iter() {
      let vertex_offset = collection.vertex_indices.len() as u32;
      let primitive_offset = collection.primitive_indices.len() as u32;
      collection.vertex_indices.extend_from_slice(meshlet.vertices);
      collection.primitive_indices.extend(
        meshlet.triangles.chunks_exact(3).map(|t| HalaMeshlet::pack_primitive(t[0], t[1], t[2]))
      );
      collection.meshlets.push(HalaMeshlet::new(
        vertex_offset,
        primitive_offset,
        meshlet.vertices.len() as u32,
        (meshlet.triangles.len() / 3) as u32,
      ));

      let bounds = meshopt::compute_meshlet_bounds(meshlet, &adapter);
      collection.bounds_data.push(Self::to_bounds_data(&bounds));
    }
    if is_rewritten {
      collection.optimized_vertices = Some(vertices);
    }

    collection.validate(Some(positions.len()))
      .map_err(|err| HalaRendererError::build("Failed to get bounds data.", Some(Box::new(err))))?;
    log::debug!(
      "Built {} meshlets from {} triangles, {} vertices referenced.",
      collection.len(), indices.len() / 3, collection.vertex_indices.len(),
    );
    Ok(collection)
  }

  fn to_bounds_data(bounds: &meshopt::Bounds) -> HalaBoundsData {
    let cone_cutoff = bounds.cone_cutoff_s8 as i8;
    if cone_cutoff == DEGENERATE_CONE_CUTOFF {
      return HalaBoundsData::with_sphere(bounds.center, bounds.radius);
    }

    let axis = Vec3::from(bounds.cone_axis);
    let apex_offset = (Vec3::from(bounds.center) - Vec3::from(bounds.cone_apex)).dot(axis);
    HalaBoundsData::new(
      bounds.center,
      bounds.radius,
      bounds.cone_axis_s8.map(|v| v as i8),
      cone_cutoff,
      apex_offset,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scene::cpu::HalaSourceMesh;

  #[test]
  fn cube_is_one_meshlet() {
    let cube = HalaSourceMesh::cube("cube");
    let options = HalaMeshletBuildOptions {
      max_vertices_per_cluster: 64,
      max_primitives_per_cluster: 126,
      ..Default::default()
    };
    let collection = HalaMeshletBuilder::build(&cube.indices, &cube.positions, &options).unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.meshlets[0].vertex_count, 8);
    assert_eq!(collection.meshlets[0].primitive_count, 12);
    assert_eq!(collection.bounds_data.len(), 1);
    assert_eq!(collection.optimized_vertices.as_ref().map(|v| v.len()), Some(8));

    let bounds = &collection.bounds_data[0];
    for position in cube.positions.iter() {
      assert!(Vec3::from(*position).distance(bounds.center()) <= bounds.radius() + 1e-4);
    }
    // The faces point in all six directions.
    assert!(bounds.is_cone_degenerate());
  }

  #[test]
  fn grid_splits_and_stays_in_range() {
    let size = 16u32;
    let mut positions = Vec::new();
    for y in 0..=size {
      for x in 0..=size {
        positions.push([x as f32, y as f32, 0.0]);
      }
    }
    let mut indices = Vec::new();
    for y in 0..size {
      for x in 0..size {
        let i = y * (size + 1) + x;
        indices.extend_from_slice(&[i, i + 1, i + size + 2, i, i + size + 2, i + size + 1]);
      }
    }

    let options = HalaMeshletBuildOptions::default();
    let collection = HalaMeshletBuilder::build(&indices, &positions, &options).unwrap();
    assert!(collection.len() > 1);
    let total: u32 = collection.meshlets.iter().map(|m| m.primitive_count).sum();
    assert_eq!(total as usize, indices.len() / 3);
    for meshlet in collection.meshlets.iter() {
      assert!(meshlet.vertex_count <= options.max_vertices_per_cluster);
      assert!(meshlet.primitive_count <= options.max_primitives_per_cluster);
    }
    assert!(collection.validate(None).is_ok());

    // A flat patch has a tight normal cone facing +z.
    let bounds = &collection.bounds_data[0];
    assert!(!bounds.is_cone_degenerate());
    assert!(bounds.cone_axis().z > 0.9);
  }

  #[test]
  fn rejects_bad_input() {
    let options = HalaMeshletBuildOptions::default();
    let positions = [[0.0f32; 3]; 3];
    assert!(HalaMeshletBuilder::build(&[], &positions, &options).is_err());
    assert!(HalaMeshletBuilder::build(&[0, 1], &positions, &options).is_err());
    assert!(HalaMeshletBuilder::build(&[0, 1, 3], &positions, &options).is_err());

    let options = HalaMeshletBuildOptions { max_primitives_per_cluster: 127, ..Default::default() };
    let err = HalaMeshletBuilder::build(&[0, 1, 2], &positions, &options).unwrap_err();
    assert_eq!(err.kind(), crate::error::HalaErrorKind::Build);

    let options = HalaMeshletBuildOptions { cone_weight: 1.5, ..Default::default() };
    assert!(options.validate().is_err());
  }

  #[test]
  fn primitive_limit_is_aligned_down() {
    let options = HalaMeshletBuildOptions { max_primitives_per_cluster: 126, ..Default::default() };
    assert_eq!(options.aligned_max_primitives(), 124);
  }
}
