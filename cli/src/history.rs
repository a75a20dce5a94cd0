use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;

use crate::atomic_write::write_atomic_text;
use crate::config::attache_home;

/// Persisted command history: one command per line, oldest first, capped at
/// `limit` entries with older duplicates dropped.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
}

impl HistoryStore {
    pub fn new(path: PathBuf, limit: usize) -> Self {
        Self { path, limit }
    }

    pub fn new_default(limit: usize) -> anyhow::Result<Self> {
        Ok(Self::new(attache_home()?.join("history"), limit))
    }

    pub fn load(&self) -> anyhow::Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("read history at {}", self.path.display()))),
        }
    }

    /// Append this session's commands and rewrite the file: later entries
    /// win over earlier duplicates, and only the newest `limit` survive.
    pub fn record(&self, commands: &[String]) -> anyhow::Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let mut combined = self.load()?;
        combined.extend(commands.iter().cloned());
        let mut entries = dedupe_keep_latest(combined);
        let overflow = entries.len().saturating_sub(self.limit);
        entries.drain(..overflow);

        write_atomic_text(&self.path, &entries.join("\n"))
            .with_context(|| format!("rewrite history at {}", self.path.display()))
    }
}

fn dedupe_keep_latest(entries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut kept: Vec<String> = entries
        .into_iter()
        .rev()
        .filter(|entry| seen.insert(entry.clone()))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn store(dir: &tempfile::TempDir, limit: usize) -> HistoryStore {
        HistoryStore::new(dir.path().join("history"), limit)
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(store(&dir, 10).load().expect("load").is_empty());
    }

    #[test]
    fn record_appends_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = store(&dir, 10);

        history.record(&["one".to_string()]).expect("record");
        history.record(&["two".to_string()]).expect("record");

        assert_eq!(
            history.load().expect("load"),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    #[test]
    fn duplicates_keep_only_the_latest_occurrence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = store(&dir, 10);

        history
            .record(&["build".to_string(), "test".to_string(), "build".to_string()])
            .expect("record");

        assert_eq!(
            history.load().expect("load"),
            vec!["test".to_string(), "build".to_string()]
        );
    }

    #[test]
    fn limit_drops_the_oldest_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = store(&dir, 2);

        history
            .record(&["a".to_string(), "b".to_string(), "c".to_string()])
            .expect("record");

        assert_eq!(
            history.load().expect("load"),
            vec!["b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn blank_lines_are_skipped_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history");
        std::fs::write(&path, "one\n\n   \ntwo\n").expect("seed");

        let history = HistoryStore::new(path, 10);
        assert_eq!(
            history.load().expect("load"),
            vec!["one".to_string(), "two".to_string()]
        );
    }
}
