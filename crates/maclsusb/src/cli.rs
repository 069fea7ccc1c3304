use camino::Utf8PathBuf;
use clap::Parser;

/// List USB devices on macOS in the format of lsusb
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Read a saved `system_profiler SPUSBDataType` report instead of running
    /// system_profiler (use - for standard input)
    #[arg(short, long)]
    pub input: Option<Utf8PathBuf>,
    /// Print the parsed tree instead of the device list (for debugging)
    #[arg(long)]
    pub dump_tree: bool,
    /// The system_profiler executable to run
    #[arg(long, env = "MACLSUSB_EXECUTABLE", default_value = maclsusb_core::config::DEFAULT_EXECUTABLE)]
    pub executable: Utf8PathBuf,
    /// Report type to request from system_profiler
    #[arg(long, env = "MACLSUSB_DATA_TYPE", default_value = maclsusb_core::config::DEFAULT_DATA_TYPE)]
    pub data_type: String,
}
