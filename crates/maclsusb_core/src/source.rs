//! Sources of the textual USB report

use std::io::Read;
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use compact_str::CompactString;

use crate::config::ProfilerConfig;

/// Errors from obtaining a report
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The executable could not be started at all
    #[error("Cannot run {executable:?}")]
    Launch {
        executable: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The executable ran but reported failure
    #[error("Error {code} in {executable:?}: {stderr}")]
    Failed {
        executable: Utf8PathBuf,
        code: i32,
        stderr: String,
    },
    /// The requested report type is not known to this system
    #[error("No way to iterate {data_type} data")]
    Unsupported { data_type: CompactString },
    #[error("Output of {executable:?} is not valid UTF-8")]
    Encoding {
        executable: Utf8PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Failed to read report from {path}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something that can produce the report as lines
pub trait ReportSource: std::fmt::Debug {
    /// Non-blank lines of the report, in order
    fn fetch_report(&self) -> Result<Vec<String>, SourceError>;
}

/// Trim the whole text and split it into lines, dropping blank ones
pub fn split_report(text: &str) -> Vec<String> {
    text.trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Runs `system_profiler`
#[derive(Debug, Clone, Default)]
pub struct SystemProfiler {
    config: ProfilerConfig,
}

impl SystemProfiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    /// Check if the configured report type is listed by `-listDataTypes`
    pub fn capability_supported(&self) -> Result<bool, SourceError> {
        let output = self.run(&["-listDataTypes"])?;
        Ok(output
            .lines()
            .any(|line| self.config.data_type == line.trim()))
    }

    /// Run the executable with the given arguments and return stdout
    fn run(&self, args: &[&str]) -> Result<String, SourceError> {
        let executable = &self.config.executable;
        tracing::debug!(%executable, ?args, "Running");
        let output = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| SourceError::Launch {
                executable: executable.clone(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            // Killed by a signal: there is no code to pass on
            let code = output.status.code().unwrap_or(1);
            return Err(SourceError::Failed {
                executable: executable.clone(),
                code,
                stderr,
            });
        }
        if !output.stderr.is_empty() {
            // system_profiler likes to log plugin failures while still succeeding
            tracing::debug!(
                "{executable} printed to stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        String::from_utf8(output.stdout).map_err(|source| SourceError::Encoding {
            executable: executable.clone(),
            source,
        })
    }
}

impl ReportSource for SystemProfiler {
    fn fetch_report(&self) -> Result<Vec<String>, SourceError> {
        if self.config.probe_capability && !self.capability_supported()? {
            return Err(SourceError::Unsupported {
                data_type: self.config.data_type.clone(),
            });
        }
        let output = self.run(&[self.config.data_type.as_str()])?;
        let lines = split_report(&output);
        tracing::debug!(lines = lines.len(), "Got report");
        Ok(lines)
    }
}

/// A report captured earlier (from a file or standard input)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReport {
    text: String,
}

impl TextReport {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read from a file, `-` means standard input
    pub fn from_path(path: &Utf8Path) -> Result<Self, SourceError> {
        let read_error = |source: std::io::Error| SourceError::Read {
            path: path.to_owned(),
            source,
        };
        if path.as_str() == "-" {
            let mut text = String::new();
            std::io::stdin()
                .lock()
                .read_to_string(&mut text)
                .map_err(read_error)?;
            Ok(Self::new(text))
        } else {
            Ok(Self::new(std::fs::read_to_string(path).map_err(read_error)?))
        }
    }
}

impl ReportSource for TextReport {
    fn fetch_report(&self) -> Result<Vec<String>, SourceError> {
        Ok(split_report(&self.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_split_report() {
        let text = "\n\nUSB:\n\n    USB 3.1 Bus:\n   \n      Bus Number: 0x01\n\n\n";
        assert_eq!(
            split_report(text),
            vec!["USB:", "    USB 3.1 Bus:", "      Bus Number: 0x01"]
        );
        assert!(split_report("  \n \n").is_empty());
    }

    #[test]
    fn test_text_report_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "USB:\n\n  USB 2.0 Bus:\n    Bus Number: 0x02\n").unwrap();
        let path = Utf8Path::from_path(file.path()).unwrap();
        let report = TextReport::from_path(path).unwrap();
        assert_eq!(
            report.fetch_report().unwrap(),
            vec!["USB:", "  USB 2.0 Bus:", "    Bus Number: 0x02"]
        );
    }

    #[test]
    fn test_text_report_missing_file() {
        let err = TextReport::from_path(Utf8Path::new("/nonexistent/report.txt")).unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn test_launch_failure() {
        let config = ProfilerConfig::builder()
            .executable("/nonexistent/system_profiler")
            .build()
            .unwrap();
        let err = SystemProfiler::new(config).fetch_report().unwrap_err();
        match err {
            SourceError::Launch { executable, .. } => {
                assert_eq!(executable.as_str(), "/nonexistent/system_profiler");
            }
            other => panic!("Unexpected error {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_code() {
        let config = ProfilerConfig::builder()
            .executable("false")
            .probe_capability(false)
            .build()
            .unwrap();
        let err = SystemProfiler::new(config).fetch_report().unwrap_err();
        assert!(matches!(err, SourceError::Failed { code: 1, .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_capability_probe() {
        // `echo -listDataTypes` prints its argument, which is then the only "type"
        let config = ProfilerConfig::builder()
            .executable("echo")
            .data_type("-listDataTypes")
            .build()
            .unwrap();
        let profiler = SystemProfiler::new(config);
        assert!(profiler.capability_supported().unwrap());

        let config = ProfilerConfig::builder()
            .executable("echo")
            .build()
            .unwrap();
        let err = SystemProfiler::new(config).fetch_report().unwrap_err();
        match err {
            SourceError::Unsupported { data_type } => assert_eq!(data_type, "SPUSBDataType"),
            other => panic!("Unexpected error {other:?}"),
        }
    }

    /// Collects formatted log output
    #[cfg(unix)]
    #[derive(Debug, Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    #[cfg(unix)]
    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_on_success_is_quiet() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("system_profiler");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'IOCreatePlugInInterfaceForService failed' >&2\necho 'USB:'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = ProfilerConfig::builder()
            .executable(Utf8Path::from_path(&script).unwrap())
            .probe_capability(false)
            .build()
            .unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let lines = tracing::subscriber::with_default(subscriber, || {
            SystemProfiler::new(config).fetch_report()
        })
        .unwrap();

        assert_eq!(lines, vec!["USB:"]);
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logged, "");
    }
}
