use std::sync::Arc;

use crate::error::HalaRendererError;
use crate::compute_program::HalaComputeProgram;
use crate::graphics_program::HalaGraphicsProgram;
use crate::scene::gpu::{
  HalaDispatchIndirectArgs,
  HalaDrawIndirectArgs,
};
use super::buffer::{
  HalaBuffer,
  HalaBufferUsageFlags,
};

/// A recorded device command.
pub enum HalaCommand {
  SetCounterValue {
    buffer: Arc<HalaBuffer>,
    value: u32,
  },
  CopyBuffer {
    src: Arc<HalaBuffer>,
    src_offset: u64,
    dst: Arc<HalaBuffer>,
    dst_offset: u64,
    size: u64,
  },
  /// Copy the append counter of `src` into `dst` without a host round trip.
  CopyCount {
    src: Arc<HalaBuffer>,
    dst: Arc<HalaBuffer>,
    dst_offset: u64,
  },
  Dispatch {
    program: Arc<HalaComputeProgram>,
    group_count: [u32; 3],
  },
  DispatchIndirect {
    program: Arc<HalaComputeProgram>,
    args: Arc<HalaBuffer>,
    offset: u64,
  },
  DrawIndirect {
    program: Arc<HalaGraphicsProgram>,
    args: Arc<HalaBuffer>,
    offset: u64,
  },
}

impl HalaCommand {
  pub fn name(&self) -> &'static str {
    match self {
      Self::SetCounterValue { .. } => "set_counter_value",
      Self::CopyBuffer { .. } => "copy_buffer",
      Self::CopyCount { .. } => "copy_count",
      Self::Dispatch { .. } => "dispatch",
      Self::DispatchIndirect { .. } => "dispatch_indirect",
      Self::DrawIndirect { .. } => "draw_indirect",
    }
  }
}

/// The command buffer.
/// Commands are recorded on the host and executed in order by `HalaContext::submit`,
/// every command completes before the next one starts.
pub struct HalaCommandBuffer {
  pub debug_name: String,
  commands: Vec<HalaCommand>,
}

/// The implementation of the command buffer.
impl HalaCommandBuffer {
  /// Create a new empty command buffer.
  /// param debug_name: The debug name.
  /// return: The command buffer.
  pub fn new(debug_name: &str) -> Self {
    Self {
      debug_name: debug_name.to_string(),
      commands: Vec::new(),
    }
  }

  pub fn reset(&mut self) {
    self.commands.clear();
  }

  pub fn len(&self) -> usize {
    self.commands.len()
  }

  pub fn is_empty(&self) -> bool {
    self.commands.is_empty()
  }

  pub fn commands(&self) -> &[HalaCommand] {
    &self.commands
  }

  /// Record a command.
  /// param command: The command.
  pub fn record(&mut self, command: HalaCommand) {
    self.commands.push(command);
  }

  /// Set the append counter of a buffer.
  /// param buffer: The append buffer.
  /// param value: The value.
  pub fn set_counter_value(&mut self, buffer: &Arc<HalaBuffer>, value: u32) {
    self.record(HalaCommand::SetCounterValue { buffer: Arc::clone(buffer), value });
  }

  /// Copy bytes between buffers.
  /// param src: The source buffer.
  /// param src_offset: The source byte offset.
  /// param dst: The destination buffer.
  /// param dst_offset: The destination byte offset.
  /// param size: The number of bytes.
  pub fn copy_buffer(&mut self, src: &Arc<HalaBuffer>, src_offset: u64, dst: &Arc<HalaBuffer>, dst_offset: u64, size: u64) {
    self.record(HalaCommand::CopyBuffer {
      src: Arc::clone(src),
      src_offset,
      dst: Arc::clone(dst),
      dst_offset,
      size,
    });
  }

  /// Copy the append counter of a buffer into another buffer.
  /// param src: The append buffer.
  /// param dst: The destination buffer.
  /// param dst_offset: The destination byte offset.
  pub fn copy_count(&mut self, src: &Arc<HalaBuffer>, dst: &Arc<HalaBuffer>, dst_offset: u64) {
    self.record(HalaCommand::CopyCount {
      src: Arc::clone(src),
      dst: Arc::clone(dst),
      dst_offset,
    });
  }

  /// Execute all commands in recording order.
  pub(crate) fn execute(&self) -> Result<(), HalaRendererError> {
    for command in self.commands.iter() {
      self.execute_command(command).map_err(|err| HalaRendererError::new(
        &format!("Execute command \"{}\" of \"{}\" failed.", command.name(), self.debug_name),
        Some(Box::new(err)),
      ))?;
    }
    Ok(())
  }

  fn execute_command(&self, command: &HalaCommand) -> Result<(), HalaRendererError> {
    match command {
      HalaCommand::SetCounterValue { buffer, value } => buffer.set_counter_value(*value),
      HalaCommand::CopyBuffer { src, src_offset, dst, dst_offset, size } => {
        if *size % 4 != 0 {
          return Err(HalaRendererError::new(&format!("The copy size {} must be a multiple of 4.", size), None));
        }
        let data = src.read_memory::<u32>(*src_offset, (*size / 4) as usize)?;
        if dst.write_bytes(*dst_offset as usize, bytemuck::cast_slice(&data)) {
          Ok(())
        } else {
          Err(HalaRendererError::new(&format!("Copy {} bytes into buffer \"{}\" is out of range.", size, dst.debug_name), None))
        }
      },
      HalaCommand::CopyCount { src, dst, dst_offset } => {
        let count = src.counter_value()
          .ok_or(HalaRendererError::new(&format!("The buffer \"{}\" has no append counter.", src.debug_name), None))?;
        if *dst_offset % 4 == 0 && dst.store::<u32>((*dst_offset / 4) as usize, count) {
          Ok(())
        } else {
          Err(HalaRendererError::new(&format!("Copy count into buffer \"{}\" at {} is out of range.", dst.debug_name, dst_offset), None))
        }
      },
      HalaCommand::Dispatch { program, group_count } => {
        program.execute(*group_count);
        Ok(())
      },
      HalaCommand::DispatchIndirect { program, args, offset } => {
        let args = Self::load_args::<HalaDispatchIndirectArgs>(args, *offset)?;
        program.execute([args.group_count_x, args.group_count_y, args.group_count_z]);
        Ok(())
      },
      HalaCommand::DrawIndirect { program, args, offset } => {
        let args = Self::load_args::<HalaDrawIndirectArgs>(args, *offset)?;
        program.execute(&args);
        Ok(())
      },
    }
  }

  fn load_args<T: bytemuck::Pod>(buffer: &HalaBuffer, offset: u64) -> Result<T, HalaRendererError> {
    if !buffer.usage.contains(HalaBufferUsageFlags::INDIRECT_BUFFER) {
      return Err(HalaRendererError::new(&format!("The buffer \"{}\" is not an indirect buffer.", buffer.debug_name), None));
    }
    buffer.read_memory::<T>(offset, 1)?
      .pop()
      .ok_or(HalaRendererError::new(&format!("Read indirect arguments from buffer \"{}\" failed.", buffer.debug_name), None))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gfx::{
    HalaContext,
    HalaDeviceRequirements,
    HalaMemoryLocation,
  };

  #[test]
  fn copy_count_writes_counter_on_device() {
    let context = HalaContext::new("test", &HalaDeviceRequirements::default()).unwrap();
    let append = Arc::new(HalaBuffer::new(
      &context,
      16,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::APPEND,
      HalaMemoryLocation::GpuOnly,
      "append",
    ).unwrap());
    let args = Arc::new(HalaBuffer::new_with_data(
      &context,
      &[7u32, 9, 0, 0, 0],
      HalaBufferUsageFlags::INDIRECT_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      "args",
    ).unwrap());

    append.increment_counter();
    append.increment_counter();
    append.increment_counter();

    let mut command_buffer = HalaCommandBuffer::new("test");
    command_buffer.copy_count(&append, &args, 4);
    context.submit(&command_buffer).unwrap();
    assert_eq!(args.read_memory::<u32>(0, 5).unwrap(), vec![7, 3, 0, 0, 0]);

    command_buffer.reset();
    command_buffer.set_counter_value(&append, 0);
    command_buffer.copy_count(&append, &args, 4);
    context.submit(&command_buffer).unwrap();
    assert_eq!(args.load_u32(1), Some(0));
  }

  #[test]
  fn copy_count_out_of_range_fails() {
    let context = HalaContext::new("test", &HalaDeviceRequirements::default()).unwrap();
    let append = Arc::new(HalaBuffer::new(
      &context,
      4,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::APPEND,
      HalaMemoryLocation::GpuOnly,
      "append",
    ).unwrap());
    let args = Arc::new(HalaBuffer::new(
      &context,
      4,
      HalaBufferUsageFlags::INDIRECT_BUFFER,
      HalaMemoryLocation::GpuOnly,
      "args",
    ).unwrap());
    let mut command_buffer = HalaCommandBuffer::new("test");
    command_buffer.copy_count(&append, &args, 4);
    assert!(context.submit(&command_buffer).is_err());
  }

  #[test]
  fn copy_buffer_moves_words_in_order() {
    let context = HalaContext::new("test", &HalaDeviceRequirements::default()).unwrap();
    let src = Arc::new(HalaBuffer::new_with_data(
      &context,
      &[1u32, 2, 3, 4],
      HalaBufferUsageFlags::STORAGE_BUFFER,
      "src",
    ).unwrap());
    let dst = Arc::new(HalaBuffer::new(
      &context,
      16,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::TRANSFER_DST,
      HalaMemoryLocation::GpuOnly,
      "dst",
    ).unwrap());

    let mut command_buffer = HalaCommandBuffer::new("test");
    command_buffer.copy_buffer(&src, 4, &dst, 8, 8);
    context.submit(&command_buffer).unwrap();
    assert_eq!(dst.read_memory::<u32>(0, 4).unwrap(), vec![0, 0, 2, 3]);

    command_buffer.reset();
    command_buffer.copy_buffer(&src, 0, &dst, 12, 8);
    assert!(context.submit(&command_buffer).is_err());
    command_buffer.reset();
    command_buffer.copy_buffer(&src, 0, &dst, 0, 6);
    assert!(context.submit(&command_buffer).is_err());
  }
}
