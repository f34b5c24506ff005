pub mod prelude;
pub mod error;
pub mod config;
pub mod gfx;
pub mod compute_program;
pub mod graphics_program;
pub mod kernels;
pub mod pipeline;
pub mod renderer;
pub mod scene;
