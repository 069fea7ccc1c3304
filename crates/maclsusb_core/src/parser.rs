//! Parser for the output of `system_profiler SPUSBDataType`
//!
//! The report looks like this (blank lines already removed):
//!
//! ```text
//! USB:
//!     USB 3.0 Bus:
//!       Host Controller Driver: AppleUSBXHCISPTLP
//!       PCI Device ID: 0x9d2f
//!         Apple USB Ethernet Adapter:
//!           Product ID: 0x1402
//!           Vendor ID: 0x05ac (Apple Inc.)
//!           Location ID: 0x14500000 / 4
//!     USB 3.1 Bus:
//!       Host Controller Driver: AppleUSBXHCIAR
//!       Bus Number: 0x01
//! ```
//!
//! Indentation is not reliable, so sections are recognised from the trailing
//! `Bus:` or `:` of the heading line alone. Nested devices (behind hubs) end
//! up as siblings of the hub.

use compact_str::CompactString;
use itertools::PutBack;

use crate::types::{Bus, BusId, Device, System};

/// First line of every report
pub const ANCHOR: &str = "USB:";

const BUS_SUFFIX: &str = "Bus:";

/// Errors from parsing a report
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("Report does not start with \"USB:\" (got {0:?})")]
    MissingAnchor(Option<CompactString>),
    #[error("Expected \"Key: Value\" on line {line_no}, got {line:?}")]
    NotKeyValue {
        line_no: usize,
        line: CompactString,
    },
}

/// A classified line
#[derive(Debug, PartialEq, Eq)]
enum Line<'input> {
    /// `USB 3.0 Bus:`, with the text before `Bus:`
    Bus(&'input str),
    /// Any other heading, with the text before the colon (not trimmed)
    Section(&'input str),
    /// Anything else, should be `Key: Value`
    Field(&'input str),
}

impl<'input> Line<'input> {
    fn classify(line: &'input str) -> Self {
        if let Some(name) = line.strip_suffix(BUS_SUFFIX) {
            Line::Bus(name.trim())
        } else if let Some(name) = line.strip_suffix(':') {
            Line::Section(name)
        } else {
            Line::Field(line)
        }
    }
}

/// Parse a report (as returned by [`crate::source::ReportSource`]) into a tree
pub fn parse_report<S: AsRef<str>>(lines: &[S]) -> Result<System, ParseError> {
    // Line numbers are 1-based and kept for error messages
    let mut cursor = itertools::put_back(
        lines
            .iter()
            .map(|l| l.as_ref())
            .enumerate()
            .map(|(idx, l)| (idx + 1, l)),
    );
    match cursor.next() {
        Some((_, ANCHOR)) => (),
        other => {
            return Err(ParseError::MissingAnchor(
                other.map(|(_, l)| CompactString::from(l)),
            ));
        }
    }
    parse_system(&mut cursor)
}

fn parse_system<'input, I>(cursor: &mut PutBack<I>) -> Result<System, ParseError>
where
    I: Iterator<Item = (usize, &'input str)>,
{
    let mut system = System::new();
    while let Some((line_no, raw)) = cursor.next() {
        let line = raw.trim();
        match Line::classify(line) {
            Line::Bus(name) => {
                let bus = parse_bus(cursor, system.next_bus_id(), name)?;
                system.push_bus(bus);
            }
            // Top level headings that are not buses are kept as plain attributes
            Line::Section(_) | Line::Field(_) => {
                let (key, value) = key_value(line_no, line)?;
                system.attributes.set(key, value);
            }
        }
    }
    tracing::debug!(buses = system.buses().len(), "Parsed USB report");
    Ok(system)
}

fn parse_bus<'input, I>(
    cursor: &mut PutBack<I>,
    id: BusId,
    name: &str,
) -> Result<Bus, ParseError>
where
    I: Iterator<Item = (usize, &'input str)>,
{
    let mut bus = Bus::new(id, name);
    while let Some((line_no, raw)) = cursor.next() {
        let line = raw.trim();
        match Line::classify(line) {
            Line::Bus(_) => {
                cursor.put_back((line_no, raw));
                break;
            }
            Line::Section(dev_name) => {
                let device = parse_device(cursor, id, dev_name)?;
                bus.push_device(device);
            }
            Line::Field(field) => {
                let (key, value) = key_value(line_no, field)?;
                bus.attributes.set(key, value);
            }
        }
    }
    let bus = bus.finalize();
    tracing::debug!(bus = %bus.name, devices = bus.devices().len(), "Parsed bus");
    Ok(bus)
}

fn parse_device<'input, I>(
    cursor: &mut PutBack<I>,
    bus: BusId,
    name: &str,
) -> Result<Device, ParseError>
where
    I: Iterator<Item = (usize, &'input str)>,
{
    let mut device = Device::new(bus, name);
    while let Some((line_no, raw)) = cursor.next() {
        let line = raw.trim();
        match Line::classify(line) {
            Line::Bus(_) | Line::Section(_) => {
                cursor.put_back((line_no, raw));
                break;
            }
            Line::Field(field) => {
                let (key, value) = key_value(line_no, field)?;
                device.attributes.set(key, value);
            }
        }
    }
    tracing::trace!(device = %device.name, attributes = device.attributes.len(), "Parsed device");
    Ok(device)
}

/// Split on the first colon, trimming both sides
fn key_value(line_no: usize, line: &str) -> Result<(&str, &str), ParseError> {
    line.split_once(':')
        .map(|(key, value)| (key.trim(), value.trim()))
        .ok_or_else(|| ParseError::NotKeyValue {
            line_no,
            line: line.into(),
        })
}
