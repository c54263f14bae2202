pub mod clock;
pub mod command;
pub mod engine;
pub mod error;
pub mod frame;
pub mod frequency;
pub mod mode;
pub mod report;
pub mod session;
pub mod sink;
pub mod transport;

pub use clock::MirrorClock;
pub use engine::{LinkState, ProtocolEngine};
pub use error::{Result, WsprError};
pub use frame::Frame;
pub use frequency::GeneratorFrequency;
pub use mode::{DeviceModel, LocatorSource, OperatingMode, PowerReportMode};
pub use sink::StatusSink;
