mod context;
mod buffer;
mod command_buffer;

pub use context::*;
pub use buffer::*;
pub use command_buffer::*;
