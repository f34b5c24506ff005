use std::path::Path;

use serde::{
  Serialize,
  Deserialize,
};

use crate::error::HalaRendererError;
use crate::scene::{
  HalaBoundsData,
  HalaMeshlet,
  meshlet::{
    MESHLET_MAX_PRIMITIVES,
    MESHLET_MAX_VERTICES,
  },
};
use crate::scene::loader::{
  HalaMeshletBuilder,
  HalaMeshletBuildOptions,
};
use super::mesh::HalaSourceMesh;

/// The meshlet collection of one source mesh.
/// Immutable once built, shared read only by every buffer set made from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HalaMeshletCollection {
  pub meshlets: Vec<HalaMeshlet>,
  /// One entry per meshlet, same index space.
  pub bounds_data: Vec<HalaBoundsData>,
  /// Meshlet local vertex to mesh vertex.
  pub vertex_indices: Vec<u32>,
  /// One packed triangle per entry.
  pub primitive_indices: Vec<u32>,
  /// The rewritten vertex positions, the vertex index table refers to these when present.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub optimized_vertices: Option<Vec<[f32; 3]>>,
}

/// The implementation of the meshlet collection.
impl HalaMeshletCollection {

  pub fn len(&self) -> usize {
    self.meshlets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.meshlets.is_empty()
  }

  /// Get the vertex positions the vertex index table refers to.
  /// param source_mesh: The source mesh used when there are no optimized vertices.
  /// return: The positions.
  pub fn vertex_positions<'a>(&'a self, source_mesh: Option<&'a HalaSourceMesh>) -> Option<&'a [[f32; 3]]> {
    match self.optimized_vertices {
      Some(ref vertices) => Some(vertices.as_slice()),
      None => source_mesh.map(|mesh| mesh.positions.as_slice()),
    }
  }

  /// Check every table invariant.
  /// param vertex_count: The number of referenced vertices, optimized vertices take precedence.
  /// return: The result.
  pub fn validate(&self, vertex_count: Option<usize>) -> Result<(), HalaRendererError> {
    if self.bounds_data.len() != self.meshlets.len() {
      return Err(HalaRendererError::build(
        &format!("The collection has {} meshlets but {} bounds.", self.meshlets.len(), self.bounds_data.len()),
        None,
      ));
    }

    let vertex_count = self.optimized_vertices.as_ref().map(|vertices| vertices.len()).or(vertex_count);
    for (index, meshlet) in self.meshlets.iter().enumerate() {
      if meshlet.vertex_count > MESHLET_MAX_VERTICES || meshlet.primitive_count > MESHLET_MAX_PRIMITIVES {
        return Err(HalaRendererError::build(
          &format!(
            "The meshlet {} has {} vertices and {} primitives, the limits are {} and {}.",
            index, meshlet.vertex_count, meshlet.primitive_count, MESHLET_MAX_VERTICES, MESHLET_MAX_PRIMITIVES,
          ),
          None,
        ));
      }

      let vertices = self.vertex_indices.get(meshlet.vertex_range())
        .ok_or(HalaRendererError::build(&format!("The vertex range of meshlet {} is out of the table.", index), None))?;
      let primitives = self.primitive_indices.get(meshlet.primitive_range())
        .ok_or(HalaRendererError::build(&format!("The primitive range of meshlet {} is out of the table.", index), None))?;

      if let Some(corner) = primitives.iter()
        .flat_map(|primitive| HalaMeshlet::unpack_primitive(*primitive))
        .find(|corner| *corner >= meshlet.vertex_count)
      {
        return Err(HalaRendererError::build(
          &format!("The meshlet {} refers to local vertex {} of {}.", index, corner, meshlet.vertex_count),
          None,
        ));
      }

      if let Some(vertex_count) = vertex_count {
        if let Some(vertex) = vertices.iter().find(|vertex| **vertex as usize >= vertex_count) {
          return Err(HalaRendererError::build(
            &format!("The meshlet {} refers to vertex {} of {}.", index, vertex, vertex_count),
            None,
          ));
        }
      }
    }

    Ok(())
  }
}

/// The meshlet asset, the persisted unit of a collection and its source mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalaMeshletAsset {
  pub name: String,
  #[serde(default)]
  pub source_mesh: Option<HalaSourceMesh>,
  pub collection: HalaMeshletCollection,
}

/// The implementation of the meshlet asset.
impl HalaMeshletAsset {

  /// Create a new asset.
  /// param name: The name.
  /// param source_mesh: The source mesh.
  /// param collection: The collection.
  /// return: The asset.
  pub fn new(name: &str, source_mesh: Option<HalaSourceMesh>, collection: HalaMeshletCollection) -> Self {
    Self {
      name: name.to_string(),
      source_mesh,
      collection,
    }
  }

  /// Build the meshlets of a source mesh.
  /// param source_mesh: The source mesh.
  /// param options: The build options.
  /// return: The asset.
  pub fn from_source_mesh(source_mesh: HalaSourceMesh, options: &HalaMeshletBuildOptions) -> Result<Self, HalaRendererError> {
    let collection = HalaMeshletBuilder::build(&source_mesh.indices, &source_mesh.positions, options)?;
    log::debug!(
      "A HalaMeshletAsset \"{}\"[{} meshlets] is built.",
      source_mesh.name, collection.len(),
    );
    let name = source_mesh.name.clone();
    Ok(Self::new(&name, Some(source_mesh), collection))
  }

  /// Get the vertex positions bound for drawing.
  pub fn vertex_positions(&self) -> Option<&[[f32; 3]]> {
    self.collection.vertex_positions(self.source_mesh.as_ref())
  }

  /// Validate the collection against the bound vertex positions.
  pub fn validate(&self) -> Result<(), HalaRendererError> {
    self.collection.validate(self.vertex_positions().map(|positions| positions.len()))
  }

  /// Save the asset as JSON.
  /// param path: The file path.
  /// return: The result.
  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), HalaRendererError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
      .map_err(|err| HalaRendererError::io(&format!("Create file \"{}\" failed.", path.display()), Some(Box::new(err))))?;
    serde_json::to_writer(std::io::BufWriter::new(file), self)
      .map_err(|err| HalaRendererError::io(&format!("Write meshlet asset \"{}\" failed.", path.display()), Some(Box::new(err))))?;
    log::debug!("The HalaMeshletAsset \"{}\" is saved to \"{}\".", self.name, path.display());
    Ok(())
  }

  /// Load an asset saved as JSON, the collection is validated.
  /// param path: The file path.
  /// return: The asset.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HalaRendererError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
      .map_err(|err| HalaRendererError::io(&format!("Open file \"{}\" failed.", path.display()), Some(Box::new(err))))?;
    let asset: Self = serde_json::from_reader(std::io::BufReader::new(file))
      .map_err(|err| HalaRendererError::io(&format!("Parse meshlet asset \"{}\" failed.", path.display()), Some(Box::new(err))))?;
    asset.validate()?;
    log::debug!("The HalaMeshletAsset \"{}\" is loaded from \"{}\".", asset.name, path.display());
    Ok(asset)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn two_meshlets() -> HalaMeshletCollection {
    HalaMeshletCollection {
      meshlets: vec![HalaMeshlet::new(0, 0, 3, 1), HalaMeshlet::new(3, 1, 3, 1)],
      bounds_data: vec![
        HalaBoundsData::with_sphere([0.0; 3], 1.0),
        HalaBoundsData::with_sphere([1.0, 0.0, 0.0], 1.0),
      ],
      vertex_indices: vec![0, 1, 2, 2, 1, 3],
      primitive_indices: vec![HalaMeshlet::pack_primitive(0, 1, 2), HalaMeshlet::pack_primitive(0, 1, 2)],
      optimized_vertices: None,
    }
  }

  #[test]
  fn validate_accepts_consistent_tables() {
    assert!(two_meshlets().validate(Some(4)).is_ok());
    assert!(two_meshlets().validate(None).is_ok());
  }

  #[test]
  fn validate_rejects_out_of_range() {
    let mut collection = two_meshlets();
    collection.meshlets[1].vertex_offset = 4;
    assert!(collection.validate(None).is_err());

    let mut collection = two_meshlets();
    collection.primitive_indices[0] = HalaMeshlet::pack_primitive(0, 1, 3);
    assert!(collection.validate(None).is_err());

    assert!(two_meshlets().validate(Some(3)).is_err());

    let mut collection = two_meshlets();
    collection.bounds_data.pop();
    assert!(collection.validate(None).is_err());
  }
}
