use std::sync::Arc;

use glam::UVec3;
use rayon::prelude::*;

use crate::error::HalaRendererError;
use crate::gfx::{
  HalaBuffer,
  HalaCommand,
  HalaCommandBuffer,
};

/// The identifiers of one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalaDispatchId {
  pub group_id: UVec3,
  /// The index of the invocation inside its group.
  pub group_thread_id: u32,
  /// group_id.x * group_size + group_thread_id.
  pub dispatch_thread_id: u32,
}

/// A compute kernel, one call per invocation.
/// Invocations run concurrently and in no particular order.
pub trait HalaComputeKernel: Send + Sync {
  fn execute(&self, id: &HalaDispatchId);
}

/// The compute program.
pub struct HalaComputeProgram {
  pub debug_name: String,
  pub group_size: u32,
  kernel: Box<dyn HalaComputeKernel>,
}

/// The Drop implementation of the compute program.
impl Drop for HalaComputeProgram {
  fn drop(&mut self) {
    log::debug!("A HalaComputeProgram \"{}\" is dropped.", self.debug_name);
  }
}

/// The compute program implementation.
impl HalaComputeProgram {

  /// Create a new compute program.
  /// param kernel: The kernel.
  /// param group_size: The number of invocations per group.
  /// param debug_name: The debug name.
  /// return: The compute program.
  pub fn new<K>(kernel: K, group_size: u32, debug_name: &str) -> Result<Self, HalaRendererError>
  where
    K: HalaComputeKernel + 'static,
  {
    if group_size == 0 {
      return Err(HalaRendererError::new(&format!("The group size of compute program \"{}\" is zero.", debug_name), None));
    }

    log::debug!("A HalaComputeProgram \"{}\"[group size {}] is created.", debug_name, group_size);
    Ok(Self {
      debug_name: debug_name.to_string(),
      group_size,
      kernel: Box::new(kernel),
    })
  }

  /// Dispatch the compute program.
  /// param command_buffer: The command buffer.
  /// param group_count_x: The group count x.
  /// param group_count_y: The group count y.
  /// param group_count_z: The group count z.
  pub fn dispatch(
    self: &Arc<Self>,
    command_buffer: &mut HalaCommandBuffer,
    group_count_x: u32,
    group_count_y: u32,
    group_count_z: u32,
  ) {
    command_buffer.record(HalaCommand::Dispatch {
      program: Arc::clone(self),
      group_count: [group_count_x, group_count_y, group_count_z],
    });
  }

  /// Dispatch the compute program with indirect.
  /// param command_buffer: The command buffer.
  /// param buffer: The buffer.
  /// param offset: The offset.
  pub fn dispatch_indirect(
    self: &Arc<Self>,
    command_buffer: &mut HalaCommandBuffer,
    buffer: &Arc<HalaBuffer>,
    offset: u64,
  ) {
    command_buffer.record(HalaCommand::DispatchIndirect {
      program: Arc::clone(self),
      args: Arc::clone(buffer),
      offset,
    });
  }

  /// Run all invocations of a dispatch, groups are spread over the pool.
  pub(crate) fn execute(&self, group_count: [u32; 3]) {
    let [x, y, z] = group_count.map(u64::from);
    let num_of_groups = x * y * z;
    if num_of_groups == 0 {
      return;
    }

    (0..num_of_groups).into_par_iter().for_each(|linear| {
      let group_id = UVec3::new(
        (linear % x) as u32,
        ((linear / x) % y) as u32,
        (linear / (x * y)) as u32,
      );
      let base = group_id.x.wrapping_mul(self.group_size);
      for group_thread_id in 0..self.group_size {
        self.kernel.execute(&HalaDispatchId {
          group_id,
          group_thread_id,
          dispatch_thread_id: base.wrapping_add(group_thread_id),
        });
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  struct CountingKernel {
    invocations: Arc<AtomicU32>,
    max_thread_id: Arc<AtomicU32>,
  }

  impl HalaComputeKernel for CountingKernel {
    fn execute(&self, id: &HalaDispatchId) {
      self.invocations.fetch_add(1, Ordering::Relaxed);
      self.max_thread_id.fetch_max(id.dispatch_thread_id, Ordering::Relaxed);
    }
  }

  #[test]
  fn runs_every_invocation_once() {
    let invocations = Arc::new(AtomicU32::new(0));
    let max_thread_id = Arc::new(AtomicU32::new(0));
    let program = HalaComputeProgram::new(
      CountingKernel { invocations: invocations.clone(), max_thread_id: max_thread_id.clone() },
      64,
      "counting",
    ).unwrap();

    program.execute([3, 1, 1]);
    assert_eq!(invocations.load(Ordering::Relaxed), 192);
    assert_eq!(max_thread_id.load(Ordering::Relaxed), 191);

    program.execute([0, 1, 1]);
    assert_eq!(invocations.load(Ordering::Relaxed), 192);
  }

  #[test]
  fn rejects_empty_groups() {
    let kernel = CountingKernel {
      invocations: Arc::new(AtomicU32::new(0)),
      max_thread_id: Arc::new(AtomicU32::new(0)),
    };
    assert!(HalaComputeProgram::new(kernel, 0, "empty").is_err());
  }
}
