//! Parsers for `/proc` filesystem files.
//!
//! Pure functions over file content, testable with string inputs.

use std::collections::HashSet;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Parses `/proc/uptime` and returns the first field (seconds since boot).
///
/// Format: `350735.47 234388.90`
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    let seconds: f64 = first
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime: {first}")))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ParseError::new(format!("invalid uptime: {first}")));
    }
    Ok(seconds)
}

/// One entry of `/proc/mounts`.
#[derive(Debug, Clone, PartialEq)]
pub struct MountEntry {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
}

/// Decodes the octal escapes the kernel uses for whitespace and backslashes
/// in mount paths (`\040` space, `\011` tab, `\012` newline, `\134` backslash).
fn unescape_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = bytes.get(i + 1..i + 4)
            && digits.iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = digits
                .iter()
                .fold(0u16, |acc, b| acc * 8 + u16::from(b - b'0'));
            if let Ok(value) = u8::try_from(value) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses `/proc/mounts`, keeping only block-device mounts.
///
/// Pseudo filesystems (proc, sysfs, tmpfs, ...) have no `/dev/` device and
/// are dropped; a mountpoint listed twice is reported once.
///
/// Format: `device mountpoint fstype options dump pass`
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    let mut seen = HashSet::new();
    let mut mounts = Vec::new();

    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mountpoint), Some(fstype)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if !device.starts_with("/dev/") {
            continue;
        }

        let mountpoint = unescape_mount_path(mountpoint);
        if seen.insert(mountpoint.clone()) {
            mounts.push(MountEntry {
                device: unescape_mount_path(device),
                mountpoint,
                fstype: fstype.to_string(),
            });
        }
    }

    mounts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("350735.47 234388.90\n").unwrap(), 350735.47);
        assert_eq!(parse_uptime("12 3").unwrap(), 12.0);
    }

    #[test]
    fn test_parse_uptime_invalid() {
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("abc 1.0").is_err());
        assert!(parse_uptime("-5.0 1.0").is_err());
        assert!(parse_uptime("NaN 1.0").is_err());
    }

    #[test]
    fn test_parse_mounts() {
        let content = "\
/dev/mmcblk0p1 / ext4 rw,relatime,data=ordered 0 0
devtmpfs /dev devtmpfs rw,relatime 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,mode=755 0 0
/dev/nvme0n1p1 /data ext4 rw,relatime 0 0
";
        let mounts = parse_mounts(content);
        assert_eq!(
            mounts,
            vec![
                MountEntry {
                    device: "/dev/mmcblk0p1".to_string(),
                    mountpoint: "/".to_string(),
                    fstype: "ext4".to_string(),
                },
                MountEntry {
                    device: "/dev/nvme0n1p1".to_string(),
                    mountpoint: "/data".to_string(),
                    fstype: "ext4".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_mounts_escapes_and_duplicates() {
        let content = "\
/dev/sda1 /mnt/usb\\040drive vfat rw 0 0
/dev/sda1 /mnt/usb\\040drive vfat rw 0 0
/dev/sdb1 /mnt/back\\134slash ext4 rw 0 0
garbage
";
        let mounts = parse_mounts(content);
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].mountpoint, "/mnt/usb drive");
        assert_eq!(mounts[1].mountpoint, "/mnt/back\\slash");
    }

    #[test]
    fn test_unescape_leaves_plain_backslash() {
        assert_eq!(unescape_mount_path("/a\\b"), "/a\\b");
        assert_eq!(unescape_mount_path("/a\\09"), "/a\\09");
    }
}
