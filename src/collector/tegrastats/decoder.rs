//! Line decoder: one tegrastats line to one complete `Snapshot`.

use std::path::PathBuf;

use crate::collector::tegrastats::parser::{DecodeError, parse_line};
use crate::collector::traits::FileSystem;
use crate::storage::model::Snapshot;

/// Decodes lines and completes them with the cpufreq governor of each
/// online core, which tegrastats itself does not print.
pub struct LineDecoder<F: FileSystem> {
    fs: F,
    sys_path: PathBuf,
}

impl<F: FileSystem> LineDecoder<F> {
    /// Creates a decoder reading governors below `sys_path` (usually "/sys").
    pub fn new(fs: F, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            sys_path: sys_path.into(),
        }
    }

    pub fn decode(&self, line: &str) -> Result<Snapshot, DecodeError> {
        let mut snapshot = parse_line(line)?;
        for core in snapshot.cpu_cores.iter_mut().filter(|c| c.enabled) {
            core.governor = self.governor(core.index);
        }
        Ok(snapshot)
    }

    /// Reads the scaling governor of the 1-based core `index`.
    fn governor(&self, index: usize) -> Option<String> {
        let cpu = index.checked_sub(1)?;
        let path = self
            .sys_path
            .join(format!("devices/system/cpu/cpu{cpu}/cpufreq/scaling_governor"));
        let content = self.fs.read_to_string(&path).ok()?;
        let governor = content.trim();
        (!governor.is_empty()).then(|| governor.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, samples};

    #[test]
    fn test_decode_adds_governors() {
        let decoder = LineDecoder::new(MockFs::jetson_nano(), "/sys");
        let snapshot = decoder.decode(samples::NANO).unwrap();

        assert_eq!(snapshot.cpu_cores.len(), 4);
        for core in &snapshot.cpu_cores {
            assert_eq!(core.governor.as_deref(), Some("schedutil"));
        }
    }

    #[test]
    fn test_decode_offline_cores_have_no_governor() {
        let decoder = LineDecoder::new(MockFs::jetson_tx2(), "/sys");
        let snapshot = decoder.decode(samples::TX2).unwrap();

        let governors: Vec<_> = snapshot
            .cpu_cores
            .iter()
            .map(|c| c.governor.as_deref())
            .collect();
        assert_eq!(
            governors,
            vec![
                Some("schedutil"),
                None,
                None,
                Some("schedutil"),
                Some("schedutil"),
                Some("schedutil"),
            ]
        );
    }

    #[test]
    fn test_decode_missing_or_blank_governor() {
        let fs = MockFs::new();
        fs.add_file(
            "/sys/devices/system/cpu/cpu1/cpufreq/scaling_governor",
            "  \n",
        );
        let decoder = LineDecoder::new(fs, "/sys");
        let snapshot = decoder
            .decode("RAM 1/2MB (lfb 1x4MB) CPU [1%@100,2%@100]")
            .unwrap();

        assert!(snapshot.cpu_cores.iter().all(|c| c.governor.is_none()));
    }

    #[test]
    fn test_decode_custom_sys_root() {
        let fs = MockFs::new();
        fs.add_file(
            "/host/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor",
            "performance\n",
        );
        let decoder = LineDecoder::new(fs, "/host/sys");
        let snapshot = decoder.decode("RAM 1/2MB (lfb 1x4MB) CPU [1%@100]").unwrap();

        assert_eq!(
            snapshot.cpu_cores[0].governor.as_deref(),
            Some("performance")
        );
    }

    #[test]
    fn test_decode_propagates_errors() {
        let decoder = LineDecoder::new(MockFs::jetson_nano(), "/sys");
        assert_eq!(decoder.decode(""), Err(DecodeError::Empty));
        assert_eq!(
            decoder.decode(samples::GARBAGE),
            Err(DecodeError::MissingMemory)
        );
    }
}
