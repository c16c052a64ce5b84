pub mod frame;
pub mod source;
pub mod synthetic;
pub mod v4l2;

pub use frame::Frame;
pub use frame::PixelFormat;
pub use source::FrameSource;
pub use synthetic::SyntheticSource;
pub use v4l2::DeviceSource;
