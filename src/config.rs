use std::path::Path;

use glam::{
  Vec2,
  Vec3,
};
use serde::{
  Serialize,
  Deserialize,
};

use crate::error::HalaRendererError;
use crate::gfx::HalaDeviceRequirements;

/// How the visible meshlets reach the rasterizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalaMeshletDrawMode {
  /// Each draw instance is one visible meshlet, the vertex kernel walks the meshlet tables.
  #[default]
  Procedural,
  /// An indirect dispatch first writes a fixed span of indices per visible meshlet.
  Expanded,
}

fn default_as_three() -> u32 {
  3
}

fn default_as_true() -> bool {
  true
}

fn default_spacing() -> [f32; 2] {
  [1.0, 1.0]
}

fn default_memory_budget() -> u64 {
  512 * 1024 * 1024
}

/// The meshlet renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalaMeshletRendererConfig {
  #[serde(default = "default_as_three")]
  pub instance_rows: u32,
  #[serde(default = "default_as_three")]
  pub instance_columns: u32,
  #[serde(default)]
  pub instance_origin: [f32; 3],
  #[serde(default = "default_spacing")]
  pub instance_spacing: [f32; 2],
  #[serde(default)]
  pub color_seed: u64,
  #[serde(default = "default_as_true")]
  pub enable_cone_culling: bool,
  #[serde(default)]
  pub draw_mode: HalaMeshletDrawMode,
  /// The device memory budget in bytes.
  #[serde(default = "default_memory_budget")]
  pub memory_budget: u64,
  /// 0 lets rayon pick the number of kernel threads.
  #[serde(default)]
  pub worker_threads: usize,
}

impl Default for HalaMeshletRendererConfig {
  fn default() -> Self {
    Self {
      instance_rows: default_as_three(),
      instance_columns: default_as_three(),
      instance_origin: [0.0; 3],
      instance_spacing: default_spacing(),
      color_seed: 0,
      enable_cone_culling: default_as_true(),
      draw_mode: HalaMeshletDrawMode::default(),
      memory_budget: default_memory_budget(),
      worker_threads: 0,
    }
  }
}

/// The implementation of the meshlet renderer configuration.
impl HalaMeshletRendererConfig {

  /// Load the configuration from a JSON file.
  /// param path: The path of the file.
  /// return: The configuration.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HalaRendererError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
      .map_err(|err| HalaRendererError::io(&format!("Read config file \"{}\" failed.", path.display()), Some(Box::new(err))))?;
    Self::from_json(&json)
  }

  /// Parse the configuration from JSON, missing fields take their defaults.
  /// param json: The JSON text.
  /// return: The configuration.
  pub fn from_json(json: &str) -> Result<Self, HalaRendererError> {
    serde_json::from_str(json)
      .map_err(|err| HalaRendererError::io("Parse the meshlet renderer config failed.", Some(Box::new(err))))
  }

  /// Check the configuration.
  /// return: The result.
  pub fn validate(&self) -> Result<(), HalaRendererError> {
    if self.instance_rows == 0 || self.instance_columns == 0 {
      return Err(HalaRendererError::configuration(&format!(
        "The instance grid {} x {} is empty.", self.instance_rows, self.instance_columns,
      )));
    }
    if self.instance_rows.checked_mul(self.instance_columns).is_none() {
      return Err(HalaRendererError::configuration(&format!(
        "The instance grid {} x {} is too large.", self.instance_rows, self.instance_columns,
      )));
    }
    if self.instance_origin.iter().chain(self.instance_spacing.iter()).any(|v| !v.is_finite()) {
      return Err(HalaRendererError::configuration("The instance origin and spacing must be finite."));
    }
    if self.memory_budget == 0 {
      return Err(HalaRendererError::configuration("The memory budget is zero."));
    }
    Ok(())
  }

  pub fn instance_count(&self) -> u64 {
    u64::from(self.instance_rows) * u64::from(self.instance_columns)
  }

  pub fn instance_origin(&self) -> Vec3 {
    Vec3::from_array(self.instance_origin)
  }

  pub fn instance_spacing(&self) -> Vec2 {
    Vec2::from_array(self.instance_spacing)
  }

  pub fn device_requirements(&self) -> HalaDeviceRequirements {
    HalaDeviceRequirements {
      memory_budget: self.memory_budget,
      worker_threads: self.worker_threads,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_take_defaults() {
    let config = HalaMeshletRendererConfig::from_json(r#"{ "instance_rows": 10, "draw_mode": "expanded" }"#).unwrap();
    assert_eq!(config.instance_rows, 10);
    assert_eq!(config.instance_columns, 3);
    assert_eq!(config.instance_spacing, [1.0, 1.0]);
    assert!(config.enable_cone_culling);
    assert_eq!(config.draw_mode, HalaMeshletDrawMode::Expanded);
    assert_eq!(config.memory_budget, 512 * 1024 * 1024);

    let config = HalaMeshletRendererConfig::from_json("{}").unwrap();
    assert_eq!(config, HalaMeshletRendererConfig::default());
  }

  #[test]
  fn validate_rejects_empty_grids() {
    let config = HalaMeshletRendererConfig { instance_columns: 0, ..Default::default() };
    assert!(config.validate().unwrap_err().is_configuration());
    assert!(HalaMeshletRendererConfig::default().validate().is_ok());
    assert!(HalaMeshletRendererConfig::from_json(r#"{ "draw_mode": "mesh_shader" }"#).is_err());
  }
}
