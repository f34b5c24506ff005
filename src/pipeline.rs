use std::sync::Arc;

use crate::config::HalaMeshletDrawMode;
use crate::compute_program::HalaComputeProgram;
use crate::error::HalaRendererError;
use crate::gfx::{
  HalaCommandBuffer,
  HalaContext,
};
use crate::graphics_program::{
  HalaGraphicsProgram,
  HalaRasterizer,
};
use crate::kernels::{
  HalaMeshletCullingKernel,
  HalaMeshletExpandKernel,
  HalaMeshletExpandedVertexKernel,
  HalaMeshletProceduralVertexKernel,
  CULLING_GROUP_SIZE,
  EXPAND_GROUP_SIZE,
};
use crate::scene::HalaInstancePara;
use crate::scene::cpu::{
  HalaCamera,
  HalaMeshletAsset,
};
use crate::scene::gpu::{
  HalaFrameUniform,
  HalaMeshletBufferSet,
  DISPATCH_ARGS_GROUP_COUNT_X_OFFSET,
  DRAW_ARGS_INSTANCE_COUNT_OFFSET,
  FRAME_FLAG_CONE_CULLING,
};

/// The expansion stage of the expanded draw mode.
struct HalaExpandStage {
  program: Arc<HalaComputeProgram>,
}

/// The complete visibility and indirect draw pipeline of one buffer set.
pub struct HalaMeshletPipeline {
  pub draw_mode: HalaMeshletDrawMode,
  pub enable_cone_culling: bool,
  pub buffer_set: HalaMeshletBufferSet,

  culling_program: Arc<HalaComputeProgram>,
  expand_stage: Option<HalaExpandStage>,
  draw_program: Arc<HalaGraphicsProgram>,
}

/// The Drop implementation of the pipeline.
impl Drop for HalaMeshletPipeline {
  fn drop(&mut self) {
    log::debug!("A HalaMeshletPipeline[{:?}] is dropped.", self.draw_mode);
  }
}

/// The implementation of the pipeline.
impl HalaMeshletPipeline {

  /// Create the buffers and programs, nothing is kept if any step fails.
  /// param context: The device context.
  /// param asset: The meshlet asset.
  /// param instances: The instance parameters.
  /// param draw_mode: The draw mode.
  /// param enable_cone_culling: Whether back facing clusters are rejected.
  /// param rasterizer: The rasterizer receiving the drawn triangles.
  /// return: The pipeline.
  pub fn new(
    context: &HalaContext,
    asset: &HalaMeshletAsset,
    instances: &[HalaInstancePara],
    draw_mode: HalaMeshletDrawMode,
    enable_cone_culling: bool,
    rasterizer: Arc<dyn HalaRasterizer>,
  ) -> Result<Self, HalaRendererError> {
    let buffer_set = HalaMeshletBufferSet::new(context, asset, instances, draw_mode)?;

    let culling_program = Arc::new(HalaComputeProgram::new(
      HalaMeshletCullingKernel::new(&buffer_set),
      CULLING_GROUP_SIZE,
      "meshlet_culling",
    )?);

    let (expand_stage, draw_program) = match (draw_mode, buffer_set.expanded_indices.as_ref()) {
      (HalaMeshletDrawMode::Expanded, Some(expanded_indices)) => {
        let program = Arc::new(HalaComputeProgram::new(
          HalaMeshletExpandKernel::new(&buffer_set, expanded_indices),
          EXPAND_GROUP_SIZE,
          "meshlet_expand",
        )?);
        let draw_program = Arc::new(HalaGraphicsProgram::new(
          HalaMeshletExpandedVertexKernel::new(&buffer_set, expanded_indices),
          rasterizer,
          "meshlet_expanded_draw",
        )?);
        (Some(HalaExpandStage { program }), draw_program)
      },
      (HalaMeshletDrawMode::Expanded, None) => {
        return Err(HalaRendererError::new("The expanded draw mode has no index buffer.", None));
      },
      (HalaMeshletDrawMode::Procedural, _) => {
        let draw_program = Arc::new(HalaGraphicsProgram::new(
          HalaMeshletProceduralVertexKernel::new(&buffer_set),
          rasterizer,
          "meshlet_procedural_draw",
        )?);
        (None, draw_program)
      },
    };

    log::debug!(
      "A HalaMeshletPipeline[{:?}, {} pairs, {} culling groups] is created.",
      draw_mode, buffer_set.total_meshlet_count, buffer_set.group_count(CULLING_GROUP_SIZE),
    );
    Ok(Self {
      draw_mode,
      enable_cone_culling,
      buffer_set,
      culling_program,
      expand_stage,
      draw_program,
    })
  }

  /// Write this frame's camera constants.
  /// param camera: The camera.
  /// return: The result.
  pub fn update_frame_uniform(&self, camera: &HalaCamera) -> Result<(), HalaRendererError> {
    let flags = if self.enable_cone_culling { FRAME_FLAG_CONE_CULLING } else { 0 };
    let frame = HalaFrameUniform::new(
      camera,
      self.buffer_set.instance_count,
      self.buffer_set.meshlet_count_per_instance,
      flags,
    );
    self.buffer_set.frame_uniform.update_memory(0, &[frame])
  }

  /// Record one frame: reset, cull, derive the arguments on the device, then draw.
  /// param command_buffer: The command buffer.
  pub fn record(&self, command_buffer: &mut HalaCommandBuffer) {
    let buffer_set = &self.buffer_set;

    command_buffer.set_counter_value(&buffer_set.visible_meshlet_indices, 0);
    self.culling_program.dispatch(
      command_buffer,
      buffer_set.group_count(CULLING_GROUP_SIZE),
      1,
      1,
    );
    command_buffer.copy_count(
      &buffer_set.visible_meshlet_indices,
      &buffer_set.draw_args,
      DRAW_ARGS_INSTANCE_COUNT_OFFSET,
    );
    command_buffer.copy_count(
      &buffer_set.visible_meshlet_indices,
      &buffer_set.dispatch_args,
      DISPATCH_ARGS_GROUP_COUNT_X_OFFSET,
    );
    if let Some(expand_stage) = self.expand_stage.as_ref() {
      expand_stage.program.dispatch_indirect(command_buffer, &buffer_set.dispatch_args, 0);
    }
    self.draw_program.draw_indirect(command_buffer, &buffer_set.draw_args, 0);
  }

  /// Upload the camera, record and submit one frame.
  /// param context: The device context.
  /// param camera: The camera.
  /// return: The result.
  pub fn render(&self, context: &HalaContext, camera: &HalaCamera) -> Result<(), HalaRendererError> {
    self.update_frame_uniform(camera)?;

    let mut command_buffer = HalaCommandBuffer::new("meshlet_frame.cmd_buffer");
    self.record(&mut command_buffer);

    self.draw_program.rasterizer().begin_frame();
    context.submit(&command_buffer)
  }
}
