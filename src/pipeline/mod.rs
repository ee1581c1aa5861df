pub mod sampler;
pub mod session;
pub mod slot;

pub use session::{PipelineObserver, Session};
pub use slot::{FrameCell, ResultSlot};
