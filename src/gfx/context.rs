use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering,
};

use crate::error::HalaRendererError;
use super::command_buffer::HalaCommandBuffer;

/// The requirements of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalaDeviceRequirements {
  /// The maximum number of bytes all live buffers may occupy.
  pub memory_budget: u64,
  /// The number of kernel worker threads, 0 lets rayon decide.
  pub worker_threads: usize,
}

impl Default for HalaDeviceRequirements {
  fn default() -> Self {
    Self {
      memory_budget: 512 * 1024 * 1024,
      worker_threads: 0,
    }
  }
}

/// The device memory accounting shared by the context and its buffers.
pub(crate) struct HalaMemoryTracker {
  budget: u64,
  allocated: AtomicU64,
}

impl HalaMemoryTracker {
  fn new(budget: u64) -> Self {
    Self {
      budget,
      allocated: AtomicU64::new(0),
    }
  }

  /// Reserve memory for a buffer.
  /// param size: The size in bytes.
  /// param debug_name: The debug name of the buffer.
  /// return: The result.
  pub(crate) fn allocate(&self, size: u64, debug_name: &str) -> Result<(), HalaRendererError> {
    let mut current = self.allocated.load(Ordering::Relaxed);
    loop {
      let next = current.checked_add(size)
        .filter(|next| *next <= self.budget)
        .ok_or_else(|| HalaRendererError::resource_exhausted(&format!(
          "Allocate {} bytes for buffer \"{}\" failed, {} of {} bytes are in use.",
          size, debug_name, current, self.budget,
        )))?;
      match self.allocated.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
        Ok(_) => return Ok(()),
        Err(actual) => current = actual,
      }
    }
  }

  /// Return the memory of a released buffer.
  /// param size: The size in bytes.
  pub(crate) fn free(&self, size: u64) {
    self.allocated.fetch_sub(size, Ordering::AcqRel);
  }

  pub(crate) fn allocated(&self) -> u64 {
    self.allocated.load(Ordering::Acquire)
  }

  pub(crate) fn budget(&self) -> u64 {
    self.budget
  }
}

/// The device context.
/// Kernels run on the context thread pool, buffers are charged against its memory budget.
pub struct HalaContext {
  pub name: String,
  pub(crate) memory: Arc<HalaMemoryTracker>,
  pub(crate) thread_pool: rayon::ThreadPool,
}

/// The Drop implementation of the context.
impl Drop for HalaContext {
  fn drop(&mut self) {
    if self.memory.allocated() > 0 {
      log::warn!(
        "The HalaContext \"{}\" is dropped while {} bytes of buffers are still alive.",
        self.name, self.memory.allocated(),
      );
    }
    log::debug!("A HalaContext \"{}\" is dropped.", self.name);
  }
}

/// The implementation of the context.
impl HalaContext {
  /// Create a new context.
  /// param name: The name of the context.
  /// param requirements: The device requirements.
  /// return: The context.
  pub fn new(name: &str, requirements: &HalaDeviceRequirements) -> Result<Self, HalaRendererError> {
    let thread_name = name.to_string();
    let thread_pool = rayon::ThreadPoolBuilder::new()
      .num_threads(requirements.worker_threads)
      .thread_name(move |index| format!("{}.worker_{}", thread_name, index))
      .build()
      .map_err(|err| HalaRendererError::new(
        &format!("Create the thread pool of context \"{}\" failed.", name),
        Some(Box::new(err)),
      ))?;

    log::debug!(
      "A HalaContext \"{}\"[{} threads, {} bytes budget] is created.",
      name, thread_pool.current_num_threads(), requirements.memory_budget,
    );
    Ok(Self {
      name: name.to_string(),
      memory: Arc::new(HalaMemoryTracker::new(requirements.memory_budget)),
      thread_pool,
    })
  }

  /// Get the number of bytes held by live buffers.
  /// return: The allocated bytes.
  pub fn allocated_bytes(&self) -> u64 {
    self.memory.allocated()
  }

  /// Get the memory budget.
  /// return: The budget in bytes.
  pub fn memory_budget(&self) -> u64 {
    self.memory.budget()
  }

  /// Submit a command buffer, the commands execute strictly in recording order.
  /// param command_buffer: The command buffer.
  /// return: The result.
  pub fn submit(&self, command_buffer: &HalaCommandBuffer) -> Result<(), HalaRendererError> {
    self.thread_pool.install(|| command_buffer.execute())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocation_respects_budget() {
    let tracker = HalaMemoryTracker::new(16);
    assert!(tracker.allocate(12, "a").is_ok());
    let err = tracker.allocate(8, "b").unwrap_err();
    assert_eq!(err.kind(), crate::error::HalaErrorKind::ResourceExhausted);
    tracker.free(12);
    assert!(tracker.allocate(16, "c").is_ok());
    assert_eq!(tracker.allocated(), 16);
  }
}
