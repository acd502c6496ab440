// src/drivers/mod.rs
// 采集 / 聚合 / 显示流水线
pub mod aggregator;
pub mod buffer;
pub mod channel;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod serial;
pub mod simulated;
pub mod source;
// 公开导出常用类型，方便外部调用
pub use aggregator::Aggregator;
pub use channel::{bounded, Producer};
pub use clock::{PipelineClock, StopSignal};
pub use config::ConfigState;
pub use display::{DisplayLoop, EventSource, Renderer};
pub use error::{AcquisitionError, PersistError};
pub use serial::SerialBridge;
pub use simulated::{SimulatedLoadCell, SimulatedPressureAdc};
pub use source::{spawn_source, LoadCellSource, PressureSource, ScriptedSource, SensorSource, SourceHandle};
