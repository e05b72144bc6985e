use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info};

/// Transaction ids that must never reach the ledger.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    txids: HashSet<String>,
}

impl Blacklist {
    /// Read a newline-delimited list of txids. A missing file is an empty list.
    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No blacklist at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        let blacklist = Self::parse(&content);
        if !blacklist.is_empty() {
            info!("Loaded {} blacklisted transactions", blacklist.len());
        }
        Ok(blacklist)
    }

    pub fn parse(content: &str) -> Self {
        let txids = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { txids }
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.txids.contains(txid)
    }

    pub fn len(&self) -> usize {
        self.txids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = Blacklist::load(dir.path().join("black_list.txt")).await.unwrap();
        assert!(blacklist.is_empty());
    }

    #[tokio::test]
    async fn loads_trimmed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("black_list.txt");
        tokio::fs::write(&path, "aa\n\n  bb  \r\ncc").await.unwrap();

        let blacklist = Blacklist::load(&path).await.unwrap();
        assert_eq!(blacklist.len(), 3);
        assert!(blacklist.contains("aa"));
        assert!(blacklist.contains("bb"));
        assert!(blacklist.contains("cc"));
        assert!(!blacklist.contains(""));
    }
}
