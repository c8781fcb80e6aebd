pub mod renderer;
pub mod surface;

pub use renderer::render;
pub use surface::{DisplaySurface, FileSurface};
