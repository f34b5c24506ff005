use std::sync::Arc;
use std::sync::atomic::{
  AtomicU32,
  Ordering,
};

use bitflags::bitflags;
use bytemuck::Pod;

use crate::error::HalaRendererError;
use super::context::{
  HalaContext,
  HalaMemoryTracker,
};

bitflags! {
  /// The buffer usage flags.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct HalaBufferUsageFlags: u32 {
    const TRANSFER_DST = 0x0000_0002;
    const UNIFORM_BUFFER = 0x0000_0010;
    const STORAGE_BUFFER = 0x0000_0020;
    const INDEX_BUFFER = 0x0000_0040;
    const INDIRECT_BUFFER = 0x0000_0100;
    /// The buffer carries an atomic append counter.
    const APPEND = 0x0000_1000;
  }
}

/// Where the buffer memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaMemoryLocation {
  /// Written once at creation, afterwards only by commands.
  GpuOnly,
  /// Host writable through `update_memory`.
  CpuToGpu,
}

/// A device buffer made of 32-bit words.
/// Every word is atomic, so kernels running on many threads may read and write it without locks.
pub struct HalaBuffer {
  pub size: u64,
  pub usage: HalaBufferUsageFlags,
  pub memory_location: HalaMemoryLocation,
  pub debug_name: String,

  words: Box<[AtomicU32]>,
  counter: Option<AtomicU32>,
  memory: Arc<HalaMemoryTracker>,
}

/// The Drop implementation of the buffer.
impl Drop for HalaBuffer {
  fn drop(&mut self) {
    self.memory.free(self.size);
    log::debug!("A HalaBuffer \"{}\" is dropped.", self.debug_name);
  }
}

/// The implementation of the buffer.
impl HalaBuffer {
  /// Create a new zero initialized buffer.
  /// param context: The device context.
  /// param size: The size in bytes, a non-zero multiple of 4.
  /// param usage: The usage flags.
  /// param memory_location: The memory location.
  /// param debug_name: The debug name.
  /// return: The buffer.
  pub fn new(
    context: &HalaContext,
    size: u64,
    usage: HalaBufferUsageFlags,
    memory_location: HalaMemoryLocation,
    debug_name: &str,
  ) -> Result<Self, HalaRendererError> {
    if size == 0 || size % 4 != 0 {
      return Err(HalaRendererError::new(
        &format!("The size {} of buffer \"{}\" must be a non-zero multiple of 4.", size, debug_name),
        None,
      ));
    }
    let num_of_words = usize::try_from(size / 4)
      .map_err(|err| HalaRendererError::new(&format!("The buffer \"{}\" is too large.", debug_name), Some(Box::new(err))))?;

    context.memory.allocate(size, debug_name)?;
    let words = (0..num_of_words).map(|_| AtomicU32::new(0)).collect::<Vec<_>>().into_boxed_slice();
    let counter = usage.contains(HalaBufferUsageFlags::APPEND).then(|| AtomicU32::new(0));

    log::debug!("A HalaBuffer \"{}\"[{} bytes] is created.", debug_name, size);
    Ok(Self {
      size,
      usage,
      memory_location,
      debug_name: debug_name.to_string(),
      words,
      counter,
      memory: Arc::clone(&context.memory),
    })
  }

  /// Create a new GPU only buffer holding the given data.
  /// param context: The device context.
  /// param data: The initial content.
  /// param usage: The usage flags.
  /// param debug_name: The debug name.
  /// return: The buffer.
  pub fn new_with_data<T: Pod>(
    context: &HalaContext,
    data: &[T],
    usage: HalaBufferUsageFlags,
    debug_name: &str,
  ) -> Result<Self, HalaRendererError> {
    let buffer = Self::new(
      context,
      std::mem::size_of_val(data) as u64,
      usage,
      HalaMemoryLocation::GpuOnly,
      debug_name,
    )?;
    if !buffer.write_bytes(0, bytemuck::cast_slice(data)) {
      return Err(HalaRendererError::new(
        &format!("Upload data to buffer \"{}\" failed, the element size must be a multiple of 4.", debug_name),
        None,
      ));
    }
    Ok(buffer)
  }

  /// Get the number of elements of type T the buffer can hold.
  pub fn len_of<T: Pod>(&self) -> usize {
    match std::mem::size_of::<T>() {
      0 => 0,
      stride => self.size as usize / stride,
    }
  }

  /// Host write into a CPU to GPU buffer.
  /// param offset: The byte offset.
  /// param data: The data.
  /// return: The result.
  pub fn update_memory<T: Pod>(&self, offset: u64, data: &[T]) -> Result<(), HalaRendererError> {
    if self.memory_location != HalaMemoryLocation::CpuToGpu {
      return Err(HalaRendererError::new(
        &format!("The buffer \"{}\" is not host writable.", self.debug_name),
        None,
      ));
    }
    if self.write_bytes(offset as usize, bytemuck::cast_slice(data)) {
      Ok(())
    } else {
      Err(HalaRendererError::new(
        &format!("Update {} bytes at offset {} of buffer \"{}\" failed.", std::mem::size_of_val(data), offset, self.debug_name),
        None,
      ))
    }
  }

  /// Host readback. This waits on the device, the frame pipeline never calls it.
  /// param offset: The byte offset.
  /// param count: The number of elements.
  /// return: The elements.
  pub fn read_memory<T: Pod>(&self, offset: u64, count: usize) -> Result<Vec<T>, HalaRendererError> {
    let mut data = vec![T::zeroed(); count];
    if self.read_bytes(offset as usize, bytemuck::cast_slice_mut(&mut data)) {
      Ok(data)
    } else {
      Err(HalaRendererError::new(
        &format!("Read {} elements at offset {} of buffer \"{}\" failed.", count, offset, self.debug_name),
        None,
      ))
    }
  }

  /// Device side load of the element at the given index.
  /// return: None if the element is out of range.
  pub fn load<T: Pod>(&self, index: usize) -> Option<T> {
    let mut value = T::zeroed();
    let offset = index.checked_mul(std::mem::size_of::<T>())?;
    self.read_bytes(offset, bytemuck::bytes_of_mut(&mut value)).then_some(value)
  }

  /// Device side store of the element at the given index.
  /// return: False if the element is out of range.
  pub fn store<T: Pod>(&self, index: usize, value: T) -> bool {
    match index.checked_mul(std::mem::size_of::<T>()) {
      Some(offset) => self.write_bytes(offset, bytemuck::bytes_of(&value)),
      None => false,
    }
  }

  pub fn load_u32(&self, word_index: usize) -> Option<u32> {
    self.words.get(word_index).map(|word| word.load(Ordering::Relaxed))
  }

  pub fn store_u32(&self, word_index: usize, value: u32) -> bool {
    match self.words.get(word_index) {
      Some(word) => {
        word.store(value, Ordering::Relaxed);
        true
      },
      None => false,
    }
  }

  /// Atomically reserve the next append slot.
  /// Every caller gets a distinct slot, slots are handed out in increasing order.
  /// return: The slot or None if the buffer has no append counter.
  pub fn increment_counter(&self) -> Option<u32> {
    self.counter.as_ref().map(|counter| counter.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the current value of the append counter.
  pub fn counter_value(&self) -> Option<u32> {
    self.counter.as_ref().map(|counter| counter.load(Ordering::Relaxed))
  }

  /// Set the value of the append counter.
  /// param value: The value.
  /// return: The result.
  pub fn set_counter_value(&self, value: u32) -> Result<(), HalaRendererError> {
    let counter = self.counter.as_ref()
      .ok_or(HalaRendererError::new(&format!("The buffer \"{}\" has no append counter.", self.debug_name), None))?;
    counter.store(value, Ordering::Relaxed);
    Ok(())
  }

  pub(crate) fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> bool {
    let Some(range) = self.word_range(offset, dst.len()) else {
      return false;
    };
    for (chunk, word) in dst.chunks_exact_mut(4).zip(self.words[range].iter()) {
      chunk.copy_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
    }
    true
  }

  pub(crate) fn write_bytes(&self, offset: usize, src: &[u8]) -> bool {
    let Some(range) = self.word_range(offset, src.len()) else {
      return false;
    };
    for (chunk, word) in src.chunks_exact(4).zip(self.words[range].iter()) {
      word.store(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]), Ordering::Relaxed);
    }
    true
  }

  fn word_range(&self, offset: usize, len: usize) -> Option<std::ops::Range<usize>> {
    if offset % 4 != 0 || len % 4 != 0 {
      return None;
    }
    let first = offset / 4;
    let last = first.checked_add(len / 4)?;
    (last <= self.words.len()).then_some(first..last)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gfx::HalaDeviceRequirements;

  fn context(budget: u64) -> HalaContext {
    HalaContext::new("test", &HalaDeviceRequirements { memory_budget: budget, worker_threads: 2 }).unwrap()
  }

  #[test]
  fn memory_is_returned_on_drop() {
    let context = context(1024);
    {
      let _a = HalaBuffer::new(&context, 256, HalaBufferUsageFlags::STORAGE_BUFFER, HalaMemoryLocation::GpuOnly, "a").unwrap();
      assert_eq!(context.allocated_bytes(), 256);
    }
    assert_eq!(context.allocated_bytes(), 0);
  }

  #[test]
  fn typed_access_round_trips_through_words() {
    let context = context(1024);
    let buffer = HalaBuffer::new_with_data(
      &context,
      &[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]],
      HalaBufferUsageFlags::STORAGE_BUFFER,
      "positions",
    ).unwrap();
    assert_eq!(buffer.len_of::<[f32; 3]>(), 2);
    assert_eq!(buffer.load::<[f32; 3]>(1), Some([4.0, 5.0, 6.0]));
    assert_eq!(buffer.load::<[f32; 3]>(2), None);
    assert!(buffer.update_memory(0, &[0u32]).is_err());
  }

  #[test]
  fn append_counter_hands_out_distinct_slots() {
    let context = context(1024);
    let buffer = HalaBuffer::new(
      &context,
      64,
      HalaBufferUsageFlags::STORAGE_BUFFER | HalaBufferUsageFlags::APPEND,
      HalaMemoryLocation::GpuOnly,
      "append",
    ).unwrap();
    assert_eq!(buffer.increment_counter(), Some(0));
    assert_eq!(buffer.increment_counter(), Some(1));
    buffer.set_counter_value(0).unwrap();
    assert_eq!(buffer.counter_value(), Some(0));

    let plain = HalaBuffer::new(&context, 4, HalaBufferUsageFlags::STORAGE_BUFFER, HalaMemoryLocation::GpuOnly, "plain").unwrap();
    assert_eq!(plain.increment_counter(), None);
    assert!(plain.set_counter_value(0).is_err());
  }

  #[test]
  fn rejects_unaligned_sizes() {
    let context = context(1024);
    assert!(HalaBuffer::new(&context, 6, HalaBufferUsageFlags::STORAGE_BUFFER, HalaMemoryLocation::GpuOnly, "odd").is_err());
    assert_eq!(context.allocated_bytes(), 0);
  }
}
