//! Best-effort parsing of `df` output captured inside a container.
//!
//! Only the "Used" column of the first data row is read. Anything that does
//! not look like `df -P -k` (or `df -h`) output yields `None`.

/// Command run inside the container to estimate disk usage of its root filesystem.
pub const DF_COMMAND: [&str; 4] = ["df", "-P", "-k", "/"];

const USED_COLUMN: usize = 2;

/// Used bytes reported on the first data row of `df` output.
pub fn parse_df_used(output: &str) -> Option<u64> {
    let row = output
        .lines()
        .skip_while(|l| !l.trim_start().starts_with("Filesystem"))
        .nth(1)?;
    let used = row.split_whitespace().nth(USED_COLUMN)?;
    parse_size(used)
}

/// Plain numbers are 1 KiB blocks; `12M`, `1.5G` and friends are human sizes.
fn parse_size(token: &str) -> Option<u64> {
    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier: u64 = match unit.trim_end_matches(['i', 'B']) {
        "" | "K" | "k" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        _ => return None,
    };
    Some((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_kilobyte_output() {
        let out = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n\
                   overlay           61255492  2048000  56000000       4% /\n";
        assert_eq!(parse_df_used(out), Some(2_048_000 * 1024));
    }

    #[test]
    fn busybox_human_output() {
        let out = "Filesystem                Size      Used Available Use% Mounted on\n\
                   overlay                  58.4G     12.5G     42.9G  23% /\n\
                   tmpfs                    64.0M         0     64.0M   0% /dev\n";
        assert_eq!(parse_df_used(out), Some((12.5 * (1u64 << 30) as f64) as u64));
    }

    #[test]
    fn leading_noise_is_skipped() {
        let out = "OCI runtime warning\nFilesystem 1K-blocks Used Available Use% Mounted on\n\
                   /dev/sda1 1000 512 488 52% /\n";
        assert_eq!(parse_df_used(out), Some(512 * 1024));
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(parse_df_used(""), None);
        assert_eq!(parse_df_used("df: not found"), None);
        assert_eq!(parse_df_used("Filesystem Size Used\noverlay 1G"), None);
        assert_eq!(parse_df_used("Filesystem Size Used\noverlay 1G lots"), None);
        assert_eq!(parse_df_used("Filesystem Size Used\noverlay 1G 3Q"), None);
    }
}
