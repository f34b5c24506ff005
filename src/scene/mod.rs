pub mod loader;
pub mod vertex;
pub mod bounds;
pub mod meshlet;
pub mod instance;
pub mod cpu;
pub mod gpu;

pub use vertex::HalaVertex;
pub use bounds::HalaBoundsData;
pub use meshlet::HalaMeshlet;
pub use instance::{
  HalaInstanceGrid,
  HalaInstancePara,
};
