use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};

use crate::errors::Result;

/// Identifiers of reads known to carry adapter contamination, for one end.
#[derive(Debug, Clone, Default)]
pub struct AdapterIndex {
    ids: HashSet<Vec<u8>>,
}

impl AdapterIndex {
    /// Loads a tab-delimited adapter list. The first line is a header; the
    /// first column of every other line is a read identifier without `'@'`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let mut line = Vec::new();
        let mut index = Self::default();

        let mut header = true;
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if std::mem::take(&mut header) {
                continue;
            }
            let field = line.split(|&b| b == b'\t').next().unwrap_or(&[]);
            let field = field.strip_suffix(b"\n").unwrap_or(field);
            let field = field.strip_suffix(b"\r").unwrap_or(field);
            if !field.is_empty() {
                index.insert(field);
            }
        }

        if index.is_empty() {
            warn!("adapter list {} holds no read ids", path.display());
        } else {
            info!("loaded {} adapter read ids from {}", index.len(), path.display());
        }
        Ok(index)
    }

    pub fn insert(&mut self, id: &[u8]) {
        self.ids.insert(id.to_vec());
    }

    /// Tests an identifier (without `'@'`) as a whole, then by its first
    /// whitespace-delimited token.
    pub fn contains(&self, id: &[u8]) -> bool {
        if self.ids.contains(id) {
            return true;
        }
        let token = id.split(|b| b.is_ascii_whitespace()).next().unwrap_or(id);
        token.len() != id.len() && self.ids.contains(token)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_skips_header_and_keeps_first_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adapter.list");
        std::fs::write(
            &path,
            "#reads_id\tread_len\tadapter_id\n\
             r1/1\t100\tA1\n\
             r7/1\t100\tA3\r\n\
             r1/1\t100\tA2\n\
             \n",
        )
        .unwrap();

        let index = AdapterIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains(b"r1/1"));
        assert!(index.contains(b"r7/1"));
        assert!(!index.contains(b"#reads_id"));
        assert!(!index.contains(b"r2/1"));
    }

    #[test]
    fn test_contains_matches_first_token() {
        let mut index = AdapterIndex::default();
        index.insert(b"r1");
        assert!(index.contains(b"r1 1:N:0:ACGT"));
        assert!(!index.contains(b"r10 1:N:0:ACGT"));
    }

    #[test]
    fn test_header_only_list_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adapter.list");
        std::fs::write(&path, "#reads_id\tread_len\n").unwrap();
        let index = AdapterIndex::load(&path).unwrap();
        assert!(index.is_empty());
        assert!(!index.contains(b"#reads_id"));
    }
}
