//! Configuration of the report source

use camino::Utf8PathBuf;
use compact_str::CompactString;

/// Name of the `system_profiler` executable (looked up in `PATH`)
pub const DEFAULT_EXECUTABLE: &str = "system_profiler";

/// Report type containing the USB tree
pub const DEFAULT_DATA_TYPE: &str = "SPUSBDataType";

/// How to invoke `system_profiler`
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ProfilerConfig {
    /// Executable to run
    #[builder(default = "DEFAULT_EXECUTABLE.into()")]
    pub executable: Utf8PathBuf,
    /// Report type to request
    #[builder(default = "DEFAULT_DATA_TYPE.into()")]
    pub data_type: CompactString,
    /// Check with `-listDataTypes` that the report type exists before
    /// requesting it
    #[builder(default = "true")]
    pub probe_capability: bool,
}

impl ProfilerConfig {
    pub fn builder() -> ProfilerConfigBuilder {
        ProfilerConfigBuilder::default()
    }
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.into(),
            data_type: DEFAULT_DATA_TYPE.into(),
            probe_capability: true,
        }
    }
}
