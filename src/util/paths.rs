use std::fs;
use std::path::Path;

use crate::error::{Result, RsnapError};

pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Turns a slash path into a file-name-safe token: `/data/a` becomes `data_a`.
pub fn encode_part_path(path: &str) -> String {
    path.trim_matches('/').replace('/', "_")
}

pub fn list_entries(path: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(path)
        .map_err(|e| RsnapError::message(format!("read {}: {}", path.display(), e)))?
    {
        let entry = entry
            .map_err(|e| RsnapError::message(format!("read {}: {}", path.display(), e)))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "." || name == ".." {
            continue;
        }
        out.push(name);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_strips_slashes() {
        assert_eq!(encode_part_path("/data/a"), "data_a");
        assert_eq!(encode_part_path("data/a/"), "data_a");
        assert_eq!(encode_part_path("/srv/www/site1"), "srv_www_site1");
        assert_eq!(encode_part_path("/"), "");
    }

    #[test]
    fn safe_names() {
        assert!(is_safe_name("host-1.example_net"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name("a/b"));
    }
}
