use std::fs;
use std::io;
use std::path::Path;

const MEMO_DIR: &str = ".rsnap";

/// Seconds the last successful run of this part took; 0 when unknown.
pub fn last_duration(host_dir: &Path, part: &str) -> u64 {
    let path = host_dir.join(MEMO_DIR).join(part);
    match fs::read_to_string(&path) {
        Ok(text) => text.trim().parse().unwrap_or(0),
        Err(_) => 0,
    }
}

pub fn store_last_duration(host_dir: &Path, part: &str, secs: u64) -> io::Result<()> {
    let dir = host_dir.join(MEMO_DIR);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(part), format!("{}\n", secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempdir().expect("tempdir");
        store_last_duration(dir.path(), "full", 321).expect("store");
        assert_eq!(last_duration(dir.path(), "full"), 321);
    }

    #[test]
    fn missing_memo_reads_as_zero() {
        let dir = tempdir().expect("tempdir");
        assert_eq!(last_duration(dir.path(), "rest"), 0);
    }

    #[test]
    fn garbled_memo_reads_as_zero() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(MEMO_DIR)).expect("mkdir");
        fs::write(dir.path().join(MEMO_DIR).join("full"), "not-a-number").expect("write");
        assert_eq!(last_duration(dir.path(), "full"), 0);
    }
}
