use std::path::Path;

use gltf::mesh::Mode;

use crate::error::HalaRendererError;
use crate::scene::cpu::HalaSourceMesh;

/// The glTF loader.
pub struct HalaGltfLoader;

/// The implementation of the glTF loader.
impl HalaGltfLoader {

  /// Load every mesh of a glTF file as a source mesh.
  /// param path: The path of the glTF file.
  /// return: The source meshes in file order.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<HalaSourceMesh>, HalaRendererError> {
    let path = path.as_ref();
    let (gltf, buffers, _images) = gltf::import(path)
      .map_err(|err| HalaRendererError::io(&format!("Load glTF file \"{:?}\" failed.", path), Some(Box::new(err))))?;

    let mut loaded_meshes = Vec::new();
    for mesh in gltf.meshes() {
      loaded_meshes.push(Self::load_mesh(&mesh, &buffers)?);
    }
    if loaded_meshes.is_empty() {
      return Err(HalaRendererError::io(&format!("No mesh in glTF file \"{:?}\".", path), None));
    }

    log::debug!("Loaded {} meshes from glTF file \"{:?}\".", loaded_meshes.len(), path);
    Ok(loaded_meshes)
  }

  /// Load the first mesh of a glTF file.
  /// param path: The path of the glTF file.
  /// return: The source mesh.
  pub fn load_first<P: AsRef<Path>>(path: P) -> Result<HalaSourceMesh, HalaRendererError> {
    let path = path.as_ref();
    let mut meshes = Self::load(path)?;
    if meshes.len() > 1 {
      log::warn!("More than one mesh in glTF file \"{:?}\". Only the first mesh will be used.", path);
    }
    Ok(meshes.swap_remove(0))
  }

  /// Merge all triangle list primitives of a mesh into one source mesh.
  fn load_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<HalaSourceMesh, HalaRendererError> {
    let mesh_name = mesh.name().unwrap_or("<Unnamed>");
    log::debug!("Loading mesh \"{}\".", mesh_name);

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut indices = Vec::new();
    for primitive in mesh.primitives() {
      if primitive.mode() != Mode::Triangles {
        log::warn!(
          "The primitive {} of mesh \"{}\" is {:?}, only triangle lists are loaded.",
          primitive.index(), mesh_name, primitive.mode(),
        );
        continue;
      }

      log::debug!("Loading primitive {} from mesh \"{}\".", primitive.index(), mesh_name);
      let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

      let base_vertex = positions.len() as u32;
      let primitive_positions = reader.read_positions()
        .ok_or(HalaRendererError::io(&format!("Read positions from mesh \"{}\" failed.", mesh_name), None))?
        .collect::<Vec<_>>();
      let primitive_indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect::<Vec<_>>(),
        None => (0..primitive_positions.len() as u32).collect(),
      };

      positions.extend(primitive_positions);
      indices.extend(primitive_indices.into_iter().map(|index| index + base_vertex));
    }

    Ok(HalaSourceMesh::new(mesh_name, positions, indices))
  }
}
