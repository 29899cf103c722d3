//! Platform serial number, used to name devices without a configured name.

use std::path::Path;

use crate::NodeError;

pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// The value of the `Serial` line in cpuinfo-formatted text.
pub fn parse_serial(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() != "Serial" {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub fn serial_from_file(path: &Path) -> Result<String, NodeError> {
    let cpuinfo = std::fs::read_to_string(path)?;
    parse_serial(&cpuinfo).ok_or(NodeError::SerialNotFound)
}

/// Serial number of the board this process runs on.
pub fn platform_serial() -> Result<String, NodeError> {
    serial_from_file(Path::new(CPUINFO_PATH))
}
