//! # `maclsusb_core` - Core functionality for maclsusb
//!
//! Turns the hierarchical USB report from `system_profiler SPUSBDataType` on
//! macOS into one line per device, in the style of `lsusb` on Linux.
//!
//! The pipeline is [`source::ReportSource`] → [`parser::parse_report`] →
//! [`format::format_system`] (or [`format::listing`] for streaming).

pub mod config;
pub mod format;
pub mod parser;
pub mod source;
pub mod types;

pub use config::ProfilerConfig;
pub use format::{DeviceLine, FormatError, format_system};
pub use parser::{ParseError, parse_report};
pub use source::{ReportSource, SourceError, SystemProfiler, TextReport};
pub use types::{Attributes, Bus, BusId, Device, DeviceKind, System};
