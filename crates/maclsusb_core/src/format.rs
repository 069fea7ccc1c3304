//! Render the device tree as `lsusb` style lines
//!
//! Output looks like:
//!
//! ```text
//! Bus 020 Device 004: ID 05ac:1402 Apple Inc. Apple USB Ethernet Adapter, Serial: 267DCA
//! Bus 001 Device 001: ID 05ac:8007 Apple Inc. USB 3.1, AppleUSBXHCIAR
//! ```
//!
//! The numbers are reconstructed from the report on a best effort basis and
//! will not always agree with what `lsusb` on Linux would print.

use std::fmt::Display;

use compact_str::{CompactString, ToCompactString, format_compact};

use crate::types::{Bus, BusId, Device, System};

/// Vendor assumed when the report doesn't say
pub const DEFAULT_VENDOR: &str = "Apple Inc.";

/// Vendor ID used for root hubs. `1d6b` (Linux Foundation) would be another option.
const ROOT_HUB_VENDOR_ID: &str = "05ac";

const DEFAULT_VENDOR_ID: &str = "0x1d6b (xx)";
const DEFAULT_PRODUCT_ID: &str = "0x????";
const DEFAULT_BUS_NUMBER: &str = "0";
const DEFAULT_ROOT_HUB_BUS_NUMBER: &str = "3e7";

/// Attribute keys used from the report
mod keys {
    pub(super) const BUS_NUMBER: &str = "Bus Number";
    pub(super) const HOST_CONTROLLER_DRIVER: &str = "Host Controller Driver";
    pub(super) const LOCATION_ID: &str = "Location ID";
    pub(super) const MANUFACTURER: &str = "Manufacturer";
    pub(super) const PRODUCT_ID: &str = "Product ID";
    pub(super) const SERIAL_NUMBER: &str = "Serial Number";
    pub(super) const VENDOR_ID: &str = "Vendor ID";
}

/// Errors from deriving the fields of a line
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatError {
    #[error("Invalid hexadecimal {field} {value:?} for device {device:?}")]
    InvalidHex {
        field: &'static str,
        value: CompactString,
        device: CompactString,
    },
    #[error("Device {device:?} refers to unknown bus {bus:?}")]
    UnknownBus { bus: BusId, device: CompactString },
}

/// Known host controller drivers and the product ID their root hub gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString)]
enum ControllerDriver {
    #[strum(serialize = "OHCI")]
    Ohci,
    #[strum(serialize = "EHCI")]
    Ehci,
    #[strum(serialize = "XHCI")]
    Xhci,
    #[strum(serialize = "AppleUSBXHCISPTLP")]
    AppleUsbXhciSptlp,
    #[strum(serialize = "AppleUSBXHCIAR")]
    AppleUsbXhciAr,
}

impl ControllerDriver {
    const fn product_id(self) -> &'static str {
        match self {
            Self::Ohci => "8005",
            Self::Ehci => "8006",
            Self::Xhci | Self::AppleUsbXhciSptlp | Self::AppleUsbXhciAr => "8007",
        }
    }
}

/// All the fields of one output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLine {
    /// Three digit decimal
    pub bus_number: CompactString,
    /// Three digit hex
    pub dev_slot: CompactString,
    pub vendor_id: CompactString,
    pub product_id: CompactString,
    pub manufacturer: CompactString,
    pub name: CompactString,
    /// Either empty or starting with `", "`
    pub serial_suffix: CompactString,
}

impl DeviceLine {
    /// Derive the line for a device, looking up its owning bus in `system`
    pub fn new(system: &System, device: &Device) -> Result<Self, FormatError> {
        let bus = system
            .bus(device.bus)
            .ok_or_else(|| FormatError::UnknownBus {
                bus: device.bus,
                device: device.name.clone(),
            })?;
        if device.attributes.contains(keys::PRODUCT_ID) {
            Self::explicit(bus, device)
        } else {
            Self::root_hub(bus, device)
        }
    }

    fn explicit(bus: &Bus, device: &Device) -> Result<Self, FormatError> {
        let attrs = &device.attributes;
        let location = attrs.get(keys::LOCATION_ID);

        let (bus_field, bus_location) = match location {
            Some(location) => (keys::LOCATION_ID, location.to_compact_string()),
            None => (
                keys::BUS_NUMBER,
                format_compact!(
                    "{}/x",
                    bus.attributes
                        .get(keys::BUS_NUMBER)
                        .unwrap_or(DEFAULT_BUS_NUMBER)
                ),
            ),
        };
        let bus_part = bus_location
            .split_once('/')
            .map_or(bus_location.as_str(), |(before, _)| before);
        let bus_number = parse_hex(bus_part, bus_field, device)? >> 24;

        let dev_slot = match location.and_then(|l| l.split_once('/')) {
            Some((_, slot)) => {
                format_compact!("{:03x}", parse_hex(slot, keys::LOCATION_ID, device)?)
            }
            None => "000".into(),
        };

        let vendor = attrs.get(keys::VENDOR_ID);
        let vendor_id = vendor.unwrap_or(DEFAULT_VENDOR_ID);
        let vendor_id = vendor_id
            .split_once(' ')
            .map_or(vendor_id, |(id, _)| id);

        let manufacturer = match (attrs.get(keys::MANUFACTURER), vendor) {
            (Some(manufacturer), _) => manufacturer.to_compact_string(),
            (None, Some(vendor)) => after_first_space(vendor).trim().into(),
            (None, None) => after_first_space(&format_compact!("xxx ({DEFAULT_VENDOR})"))
                .trim()
                .into(),
        };

        let serial_suffix = match attrs.get(keys::SERIAL_NUMBER) {
            Some(serial) if !serial.is_empty() => format_compact!(", Serial: {serial}"),
            _ => CompactString::default(),
        };

        Ok(Self {
            bus_number: format_compact!("{bus_number:03}"),
            dev_slot,
            vendor_id: skip_prefix(vendor_id).into(),
            product_id: skip_prefix(attrs.get(keys::PRODUCT_ID).unwrap_or(DEFAULT_PRODUCT_ID))
                .into(),
            manufacturer: display_manufacturer(&manufacturer).into(),
            name: device.name.clone(),
            serial_suffix,
        })
    }

    fn root_hub(bus: &Bus, device: &Device) -> Result<Self, FormatError> {
        let attrs = &device.attributes;
        let bus_number = bus
            .attributes
            .get(keys::BUS_NUMBER)
            .unwrap_or(DEFAULT_ROOT_HUB_BUS_NUMBER);
        let bus_number = parse_hex(bus_number, keys::BUS_NUMBER, device)?;

        let driver = attrs.get(keys::HOST_CONTROLLER_DRIVER);
        let product_id = driver
            .or_else(|| attrs.get(keys::PRODUCT_ID))
            .unwrap_or(DEFAULT_PRODUCT_ID)
            .trim();
        let product_id = product_id
            .parse::<ControllerDriver>()
            .map_or(product_id, |driver| driver.product_id());

        Ok(Self {
            bus_number: format_compact!("{bus_number:03}"),
            dev_slot: "001".into(),
            vendor_id: ROOT_HUB_VENDOR_ID.into(),
            product_id: product_id.into(),
            manufacturer: display_manufacturer(&format_compact!("({DEFAULT_VENDOR})")).into(),
            name: device.name.clone(),
            serial_suffix: format_compact!(", {}", driver.unwrap_or("???")),
        })
    }
}

impl Display for DeviceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bus {} Device {}: ID {}:{} {} {}{}",
            self.bus_number,
            self.dev_slot,
            self.vendor_id,
            self.product_id,
            self.manufacturer,
            self.name,
            self.serial_suffix
        )
    }
}

/// Format a single device
pub fn format_device(system: &System, device: &Device) -> Result<String, FormatError> {
    Ok(DeviceLine::new(system, device)?.to_string())
}

/// Format all devices of a bus, one per line
pub fn format_bus(system: &System, bus: &Bus) -> Result<String, FormatError> {
    let lines = bus
        .devices()
        .iter()
        .map(|dev| format_device(system, dev))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Format all buses of the system, one line per device
pub fn format_system(system: &System) -> Result<String, FormatError> {
    let buses = system
        .buses()
        .iter()
        .map(|bus| format_bus(system, bus))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(buses.join("\n"))
}

/// Lazily derive the lines for all devices, in document order
pub fn listing(system: &System) -> impl Iterator<Item = Result<DeviceLine, FormatError>> + '_ {
    system
        .devices()
        .map(|(_, device)| DeviceLine::new(system, device))
}

/// Parse hex with an optional `0x` prefix, ignoring surrounding whitespace
fn parse_hex(value: &str, field: &'static str, device: &Device) -> Result<u64, FormatError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| FormatError::InvalidHex {
        field,
        value: value.into(),
        device: device.name.clone(),
    })
}

/// Drop the first two characters (the `0x` of IDs)
fn skip_prefix(value: &str) -> &str {
    value.char_indices().nth(2).map_or("", |(idx, _)| &value[idx..])
}

/// Everything after the first space, or the whole string if there is none
fn after_first_space(value: &str) -> &str {
    value.split_once(' ').map_or(value, |(_, rest)| rest)
}

fn display_manufacturer(value: &str) -> &str {
    value.trim().trim_matches(['(', ')']).trim()
}
