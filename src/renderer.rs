use std::sync::Arc;

use crate::config::HalaMeshletRendererConfig;
use crate::error::HalaRendererError;
use crate::gfx::HalaContext;
use crate::graphics_program::{
  HalaNullRasterizer,
  HalaRasterizer,
};
use crate::pipeline::HalaMeshletPipeline;
use crate::scene::HalaInstanceGrid;
use crate::scene::cpu::{
  HalaCamera,
  HalaMeshletAsset,
};
use crate::scene::gpu::HalaMeshletBufferSet;

/// The outcome of one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalaFrameStatus {
  Rendered,
  /// The configuration is incomplete, nothing was drawn. Retried next update.
  Skipped(String),
}

/// The renderer statistics.
pub struct HalaRendererStatistics {
  pub total_frames: u64,
  pub rendered_frames: u64,
  pub skipped_frames: u64,
  pub last_stat_time: std::time::Instant,
  pub elapsed_time: std::time::Duration,
  pub interval_frames: u64,
}

impl Default for HalaRendererStatistics {
  fn default() -> Self {
    Self::new()
  }
}

/// The implementation of the renderer statistics.
impl HalaRendererStatistics {
  pub fn new() -> Self {
    Self {
      total_frames: 0,
      rendered_frames: 0,
      skipped_frames: 0,
      last_stat_time: std::time::Instant::now(),
      elapsed_time: std::time::Duration::from_secs(0),
      interval_frames: 0,
    }
  }

  /// Count one update and log once per second.
  /// param is_rendered: Whether the frame was rendered or skipped.
  /// param visible_count: The visible meshlets of the frame, debug only.
  pub fn tick(&mut self, is_rendered: bool, visible_count: u32) {
    if is_rendered {
      self.rendered_frames += 1;
    } else {
      self.skipped_frames += 1;
    }
    self.interval_frames += 1;

    let now = std::time::Instant::now();
    self.elapsed_time += now - self.last_stat_time;
    if self.elapsed_time > std::time::Duration::from_secs(1) {
      let elapsed_time_nanos = self.elapsed_time.as_nanos();
      log::info!(
        "FPS: {}, CPU Time: {:.4}ms, Visible Meshlets: {}, Skipped Frames: {}, Total Frames: {}",
        self.interval_frames * 1_000_000_000 / elapsed_time_nanos.max(1) as u64,
        elapsed_time_nanos as f64 / self.interval_frames as f64 / 1000000.0,
        visible_count,
        self.skipped_frames,
        self.total_frames + 1,
      );
      self.interval_frames = 0;
      self.elapsed_time = std::time::Duration::from_secs(0);
    }
    self.last_stat_time = now;
    self.total_frames += 1;
  }
}

/// The meshlet renderer.
/// Owns the device context and the pipeline built for the active asset and instance grid.
pub struct HalaMeshletRenderer {
  pub name: String,

  pub(crate) config: HalaMeshletRendererConfig,
  pub(crate) asset: Option<Arc<HalaMeshletAsset>>,
  pub(crate) rasterizer: Arc<dyn HalaRasterizer>,
  pub(crate) pipeline: Option<HalaMeshletPipeline>,
  pub(crate) is_dirty: bool,
  pub(crate) statistics: HalaRendererStatistics,

  pub(crate) context: HalaContext,
}

/// The Drop implementation of the renderer.
impl Drop for HalaMeshletRenderer {
  fn drop(&mut self) {
    // The buffers go before the context.
    self.pipeline = None;
    log::debug!("A HalaMeshletRenderer \"{}\" is dropped.", self.name);
  }
}

/// The implementation of the renderer.
impl HalaMeshletRenderer {

  /// Create a new renderer.
  /// param name: The name of the renderer.
  /// param config: The configuration.
  /// return: The renderer.
  pub fn new(name: &str, config: HalaMeshletRendererConfig) -> Result<Self, HalaRendererError> {
    config.validate()?;
    let context = HalaContext::new(name, &config.device_requirements())?;

    log::debug!(
      "A HalaMeshletRenderer \"{}\"[{} x {} instances, {:?}] is created.",
      name, config.instance_rows, config.instance_columns, config.draw_mode,
    );
    Ok(Self {
      name: name.to_string(),
      config,
      asset: None,
      rasterizer: Arc::new(HalaNullRasterizer),
      pipeline: None,
      is_dirty: true,
      statistics: HalaRendererStatistics::new(),
      context,
    })
  }

  /// Set the active meshlet asset, the old buffers are freed now and rebuilt on the next update.
  /// param asset: The asset or None to disable rendering.
  pub fn set_asset(&mut self, asset: Option<Arc<HalaMeshletAsset>>) {
    self.release_pipeline();
    self.asset = asset;
  }

  /// Replace the configuration, the old buffers are freed now and rebuilt on the next update.
  /// param config: The configuration.
  /// return: The result.
  pub fn set_config(&mut self, config: HalaMeshletRendererConfig) -> Result<(), HalaRendererError> {
    config.validate()?;
    self.release_pipeline();
    if config.device_requirements() != self.config.device_requirements() {
      self.context = HalaContext::new(&self.name, &config.device_requirements())?;
    }
    self.config = config;
    Ok(())
  }

  /// Set the rasterizer receiving the drawn triangles.
  /// param rasterizer: The rasterizer.
  pub fn set_rasterizer(&mut self, rasterizer: Arc<dyn HalaRasterizer>) {
    self.release_pipeline();
    self.rasterizer = rasterizer;
  }

  /// Free the buffers of the current pipeline, a new one is built on the next update.
  fn release_pipeline(&mut self) {
    if let Some(pipeline) = self.pipeline.take() {
      log::debug!(
        "The HalaMeshletRenderer \"{}\" releases {} bytes of buffers.",
        self.name, pipeline.buffer_set.size(),
      );
    }
    self.is_dirty = true;
  }

  pub fn config(&self) -> &HalaMeshletRendererConfig {
    &self.config
  }

  pub fn asset(&self) -> Option<&Arc<HalaMeshletAsset>> {
    self.asset.as_ref()
  }

  pub fn context(&self) -> &HalaContext {
    &self.context
  }

  pub fn pipeline(&self) -> Option<&HalaMeshletPipeline> {
    self.pipeline.as_ref()
  }

  pub fn buffer_set(&self) -> Option<&HalaMeshletBufferSet> {
    self.pipeline.as_ref().map(|pipeline| &pipeline.buffer_set)
  }

  pub fn statistics(&self) -> &HalaRendererStatistics {
    &self.statistics
  }

  pub fn is_dirty(&self) -> bool {
    self.is_dirty
  }

  /// Debug readback of the visible meshlet count of the last frame.
  pub fn visible_count(&self) -> u32 {
    self.buffer_set().map_or(0, |buffer_set| buffer_set.visible_count())
  }

  /// Check that everything a frame needs is present.
  /// return: The asset and camera, or the reason the frame can not run.
  fn check_configuration(&self, camera: Option<&HalaCamera>) -> Result<(Arc<HalaMeshletAsset>, HalaCamera), String> {
    let asset = self.asset.as_ref().ok_or("No meshlet asset is set.".to_string())?;
    let source_mesh = asset.source_mesh.as_ref()
      .ok_or(format!("The meshlet asset \"{}\" has no source mesh.", asset.name))?;
    if !source_mesh.is_readable() {
      return Err(format!("The source mesh \"{}\" of meshlet asset \"{}\" is not readable.", source_mesh.name, asset.name));
    }
    if asset.collection.is_empty() {
      return Err(format!("The meshlet asset \"{}\" has no meshlets.", asset.name));
    }
    let total = self.config.instance_count().checked_mul(asset.collection.len() as u64)
      .filter(|total| *total > 0 && *total <= u64::from(u32::MAX));
    if total.is_none() {
      return Err(format!(
        "The {} x {} instances of {} meshlets do not fit the visible index range.",
        self.config.instance_rows, self.config.instance_columns, asset.collection.len(),
      ));
    }
    let camera = camera.ok_or("No camera is set.".to_string())?;
    Ok((Arc::clone(asset), *camera))
  }

  /// Release the old pipeline and build a new one for the current asset and configuration.
  fn rebuild(&mut self, asset: &HalaMeshletAsset) -> Result<(), HalaRendererError> {
    self.pipeline = None;

    let grid = HalaInstanceGrid::generate(
      self.config.instance_rows,
      self.config.instance_columns,
      self.config.instance_origin(),
      self.config.instance_spacing(),
      self.config.color_seed,
    );
    let pipeline = HalaMeshletPipeline::new(
      &self.context,
      asset,
      &grid.instances,
      self.config.draw_mode,
      self.config.enable_cone_culling,
      Arc::clone(&self.rasterizer),
    )?;

    self.pipeline = Some(pipeline);
    self.is_dirty = false;
    Ok(())
  }

  fn skip(&mut self, reason: String) -> HalaFrameStatus {
    log::warn!("The HalaMeshletRenderer \"{}\" skips the frame: {}", self.name, reason);
    self.statistics.tick(false, 0);
    HalaFrameStatus::Skipped(reason)
  }

  /// Render one frame.
  /// param camera: The camera of this frame.
  /// return: Whether the frame was rendered or skipped.
  pub fn update(&mut self, camera: Option<&HalaCamera>) -> Result<HalaFrameStatus, HalaRendererError> {
    let (asset, camera) = match self.check_configuration(camera) {
      Ok(valid) => valid,
      Err(reason) => return Ok(self.skip(reason)),
    };

    if self.is_dirty || self.pipeline.is_none() {
      if let Err(err) = asset.validate() {
        return Ok(self.skip(format!("The meshlet asset \"{}\" is invalid: {}", asset.name, err)));
      }
      if let Err(err) = self.rebuild(&asset) {
        log::error!("Rebuild the pipeline of HalaMeshletRenderer \"{}\" failed: {}", self.name, err);
        self.statistics.tick(false, 0);
        return Err(err);
      }
    }

    let pipeline = self.pipeline.as_ref()
      .ok_or(HalaRendererError::new("The meshlet pipeline is none!", None))?;
    pipeline.render(&self.context, &camera)?;

    let visible_count = pipeline.buffer_set.visible_count();
    self.statistics.tick(true, visible_count);
    Ok(HalaFrameStatus::Rendered)
  }
}
