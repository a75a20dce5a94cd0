use std::io::Write as _;
use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;

/// Write `contents` to `path` through a temp file in the same directory so
/// readers never observe a half-written file. A trailing newline is added
/// when missing.
pub fn write_atomic_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid path for atomic write: {}", path.display());
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent).context("create temp file")?;
    tmp.write_all(contents.as_bytes())
        .context("write temp file")?;
    if !contents.ends_with('\n') {
        tmp.write_all(b"\n").context("terminate temp file")?;
    }
    tmp.flush().context("flush temp file")?;

    tmp.persist(path).map_err(|err| {
        anyhow::Error::new(err.error).context(format!("persist {}", path.display()))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parents_and_terminates_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state").join("history");

        write_atomic_text(&path, "deploy").expect("write atomic");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "deploy\n");
    }

    #[test]
    fn replaces_existing_contents_whole() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file.txt");
        std::fs::write(&path, "old contents\nwith lines\n").expect("seed");

        write_atomic_text(&path, "new\n").expect("write atomic");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new\n");
    }
}
