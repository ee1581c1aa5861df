pub mod channel;
pub mod supervisor;
pub mod wire;

pub use channel::{Channel, ChannelHandle};
pub use supervisor::{PipelineStatus, Supervisor};
pub use wire::{Detection, DetectionSet, FramePayload};
