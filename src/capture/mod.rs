//! Capture module: the live event channel from the browser driver and the
//! control client that starts/stops capture.

pub mod channel;
pub mod driver;

pub use channel::CaptureChannel;
pub use driver::DriverControl;
