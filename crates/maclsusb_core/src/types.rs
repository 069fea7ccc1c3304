//! Tree of buses and devices as reported by `system_profiler`

use std::fmt::Display;

use ahash::AHashMap;
use compact_str::CompactString;
use itertools::Itertools;

/// Free-form key/value attributes of a node in the report
///
/// The set of keys is open ended (it depends on the macOS version and the
/// hardware), so no attempt is made to model them as fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Attributes(AHashMap<CompactString, CompactString>);

impl Attributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(CompactString::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set an attribute, replacing any previous value for the key
    pub fn set(&mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over attributes in key order
    pub fn sorted(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<CompactString>,
    V: Into<CompactString>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Identifies a bus within its [`System`] (the index in document order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusId(pub usize);

/// Root of the report (the `USB:` section)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct System {
    pub attributes: Attributes,
    buses: Vec<Bus>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buses in document order
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.0)
    }

    /// The id the next added bus must use
    pub fn next_bus_id(&self) -> BusId {
        BusId(self.buses.len())
    }

    /// Add a finalized bus
    pub fn push_bus(&mut self, bus: Bus) {
        debug_assert_eq!(bus.id, self.next_bus_id(), "Bus added out of order");
        debug_assert!(bus.finalized, "Bus {:?} added before finalize", bus.name);
        self.buses.push(bus);
    }

    /// Iterate over all devices of all buses, in document order
    pub fn devices(&self) -> impl Iterator<Item = (&Bus, &Device)> {
        self.buses
            .iter()
            .flat_map(|bus| bus.devices.iter().map(move |dev| (bus, dev)))
    }

    /// Render the tree in a compact single line debug form
    pub fn dump(&self) -> TreeDump<'_> {
        TreeDump(self)
    }
}

/// A host controller section (`USB 3.1 Bus:`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bus {
    id: BusId,
    /// Heading text before `Bus:`, such as `USB 3.1`
    pub name: CompactString,
    pub attributes: Attributes,
    devices: Vec<Device>,
    finalized: bool,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<CompactString>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: Attributes::default(),
            devices: Vec::new(),
            finalized: false,
        }
    }

    pub fn id(&self) -> BusId {
        self.id
    }

    /// Devices in document order (after [`Bus::finalize`] this is never empty)
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Add an explicit device entry
    pub fn push_device(&mut self, device: Device) {
        debug_assert!(!self.finalized, "Device added to finalized bus");
        debug_assert_eq!(device.bus, self.id, "Device belongs to another bus");
        self.devices.push(device);
    }

    /// Close the bus section.
    ///
    /// A bus without explicit devices gets a synthetic root hub device, named
    /// after the bus and carrying a copy of the bus attributes.
    pub fn finalize(mut self) -> Self {
        debug_assert!(!self.finalized, "Bus finalized twice");
        if self.devices.is_empty() {
            tracing::trace!(bus = %self.name, "Synthesizing root hub");
            self.devices.push(Device {
                bus: self.id,
                name: self.name.clone(),
                attributes: self.attributes.clone(),
                kind: DeviceKind::RootHub,
            });
        }
        self.finalized = true;
        self
    }

    /// The synthetic root hub, if one was created
    pub fn root_hub(&self) -> Option<&Device> {
        self.devices.first().filter(|d| d.kind == DeviceKind::RootHub)
    }
}

/// Where a [`Device`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum DeviceKind {
    /// A device section in the report
    #[strum(to_string = "Device")]
    Explicit,
    /// Stands in for the host controller of a bus without devices
    #[strum(to_string = "RootHub")]
    RootHub,
}

/// A device section (`Apple USB Ethernet Adapter:`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Owning bus, used to look up bus level attributes
    pub bus: BusId,
    pub name: CompactString,
    pub attributes: Attributes,
    pub kind: DeviceKind,
}

impl Device {
    pub fn new(bus: BusId, name: impl Into<CompactString>) -> Self {
        Self {
            bus,
            name: name.into(),
            attributes: Attributes::default(),
            kind: DeviceKind::Explicit,
        }
    }
}

/// See [`System::dump`]
#[derive(Debug, Clone, Copy)]
pub struct TreeDump<'tree>(&'tree System);

impl Display for TreeDump<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let system = self.0;
        write_node(f, "USB", "<ROOT>", &system.attributes, |f| {
            for bus in &system.buses {
                f.write_str(" ")?;
                write_node(f, "Bus", &bus.name, &bus.attributes, |f| {
                    for dev in &bus.devices {
                        f.write_str(" ")?;
                        write_node(f, &dev.kind.to_string(), &dev.name, &dev.attributes, |_| {
                            Ok(())
                        })?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
    }
}

fn write_node(
    f: &mut std::fmt::Formatter<'_>,
    kind: &str,
    name: &str,
    attributes: &Attributes,
    children: impl FnOnce(&mut std::fmt::Formatter<'_>) -> std::fmt::Result,
) -> std::fmt::Result {
    write!(f, "<{kind}:{name}")?;
    for (key, value) in attributes.sorted() {
        write!(f, " {key:?}={value:?}")?;
    }
    children(f)?;
    f.write_str(">")
}
