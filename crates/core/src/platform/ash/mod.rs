//! Translation of barriers into vulkan via [`ash`](::ash).

mod access_type;
mod recording;

pub use access_type::*;
pub use recording::*;
