//! Battery capacity readout
//!
//! Reads a sysfs-style capacity pseudo-file, e.g.
//! `/sys/class/power_supply/BAT0/capacity`, whose first line is an
//! integer percentage.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read the battery percentage from a capacity file.
///
/// Only the first three bytes are looked at; leading decimal digits are
/// parsed and anything after them (typically a newline) is ignored. A
/// file that opens but holds no digits reads as 0. Any I/O failure
/// yields `None` — the caller skips the battery text silently, so a
/// machine without the configured battery just shows the clock.
pub fn read_capacity(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let mut buf = [0u8; 3];
    let n = file.read(&mut buf).ok()?;

    let digits = buf[..n]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn capacity_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("fbclock-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_two_digits_with_newline() {
        let path = capacity_file("two", "87\n");
        assert_eq!(read_capacity(&path), Some(87));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn parses_single_digit_without_newline() {
        let path = capacity_file("one", "5");
        assert_eq!(read_capacity(&path), Some(5));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn full_charge_reads_all_three_bytes() {
        let path = capacity_file("full", "100\n");
        assert_eq!(read_capacity(&path), Some(100));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn garbage_reads_as_zero() {
        let path = capacity_file("garbage", "n/a\n");
        assert_eq!(read_capacity(&path), Some(0));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_silent() {
        assert_eq!(read_capacity(Path::new("/nonexistent/capacity")), None);
    }
}
