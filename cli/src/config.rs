use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::Table as TomlTable;
use toml_edit::Value as TomlValue;
use toml_edit::value;

use crate::atomic_write::write_atomic_text;

const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Read/write access to `~/.attache/config.toml`.
///
/// Keys:
/// - `[agent] command` — the agent command line to launch.
/// - `[agent] completions` — extra commands offered for tab completion.
/// - `color` — ANSI styling toggle (default on).
/// - `[history] limit` — cap on persisted history entries.
///
/// A missing file yields defaults; an unparseable file is reported once and
/// treated as missing rather than blocking startup.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> anyhow::Result<Self> {
        Ok(Self::new(attache_home()?.join("config.toml")))
    }

    pub fn agent_command(&self) -> anyhow::Result<Option<String>> {
        Ok(self.document()?.as_ref().and_then(read_agent_command))
    }

    pub fn known_commands(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .document()?
            .as_ref()
            .and_then(read_known_commands)
            .unwrap_or_default())
    }

    pub fn color_enabled(&self) -> anyhow::Result<bool> {
        Ok(self.document()?.as_ref().and_then(read_color).unwrap_or(true))
    }

    pub fn history_limit(&self) -> anyhow::Result<usize> {
        Ok(self
            .document()?
            .as_ref()
            .and_then(read_history_limit)
            .unwrap_or(DEFAULT_HISTORY_LIMIT))
    }

    /// Persist the agent command, keeping any comments and unrelated keys
    /// in the file intact.
    pub fn set_agent_command(&self, command: &str) -> anyhow::Result<()> {
        let content = read_document_string(&self.path)?.unwrap_or_default();
        let updated = match content.parse::<DocumentMut>() {
            Ok(mut doc) => {
                set_agent_command(&mut doc, command);
                doc.to_string()
            }
            Err(_) => append_agent_fallback(&content, command),
        };
        write_atomic_text(&self.path, &updated)
    }

    fn document(&self) -> anyhow::Result<Option<DocumentMut>> {
        let Some(content) = read_document_string(&self.path)? else {
            return Ok(None);
        };
        match content.parse::<DocumentMut>() {
            Ok(doc) => Ok(Some(doc)),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "config.toml is not valid TOML; using defaults"
                );
                Ok(None)
            }
        }
    }
}

/// Directory holding the config file, history and log.
pub fn attache_home() -> anyhow::Result<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        anyhow::bail!("cannot determine home directory");
    };
    Ok(home.join(".attache"))
}

fn read_agent_command(doc: &DocumentMut) -> Option<String> {
    doc.get("agent")
        .and_then(TomlItem::as_table)
        .and_then(|agent| agent.get("command"))
        .and_then(TomlItem::as_value)
        .and_then(TomlValue::as_str)
        .map(str::to_string)
}

fn read_known_commands(doc: &DocumentMut) -> Option<Vec<String>> {
    let array = doc
        .get("agent")
        .and_then(TomlItem::as_table)
        .and_then(|agent| agent.get("completions"))
        .and_then(TomlItem::as_value)
        .and_then(TomlValue::as_array)?;
    Some(
        array
            .iter()
            .filter_map(TomlValue::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn read_color(doc: &DocumentMut) -> Option<bool> {
    doc.get("color")
        .and_then(TomlItem::as_value)
        .and_then(TomlValue::as_bool)
}

fn read_history_limit(doc: &DocumentMut) -> Option<usize> {
    doc.get("history")
        .and_then(TomlItem::as_table)
        .and_then(|history| history.get("limit"))
        .and_then(TomlItem::as_value)
        .and_then(TomlValue::as_integer)
        .and_then(|limit| usize::try_from(limit).ok())
}

fn set_agent_command(doc: &mut DocumentMut, command: &str) {
    let agent = ensure_table_for_write(doc, "agent");
    agent["command"] = value(command);
}

fn ensure_table_for_write<'a>(doc: &'a mut DocumentMut, key: &str) -> &'a mut TomlTable {
    if doc.get(key).and_then(TomlItem::as_table).is_none() {
        let mut table = TomlTable::new();
        table.set_implicit(false);
        doc[key] = TomlItem::Table(table);
    }
    match &mut doc[key] {
        TomlItem::Table(table) => table,
        _ => unreachable!("`{key}` was just ensured to be a table"),
    }
}

fn append_agent_fallback(existing: &str, command: &str) -> String {
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str("[agent]\n");
    out.push_str(&format!("command = {}\n", toml_edit::Value::from(command)));
    out
}

fn read_document_string(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context("read config.toml")),
    }
}
