use std::path::Path;
use std::path::PathBuf;

/// Why an agent command line could not be resolved to something spawnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommandError {
    Empty,
    NotFoundInPath { command: String },
    InvalidPath { path: PathBuf, reason: String },
}

impl AgentCommandError {
    pub fn render_ansi(&self) -> String {
        match self {
            AgentCommandError::Empty => ansi_red(
                "No agent command given.\n\
                 Pass --agent or set `command` under [agent] in ~/.attache/config.toml.\n"
                    .to_string(),
            ),
            AgentCommandError::NotFoundInPath { command } => ansi_red(format!(
                "Failed to find `{command}` in PATH.\n\
                 attache launches the agent as a subprocess; install it or point --agent at it.\n"
            )),
            AgentCommandError::InvalidPath { path, reason } => ansi_red(format!(
                "Agent binary `{}` cannot be used: {reason}.\n",
                path.display()
            )),
        }
    }
}

/// Split and resolved agent command, ready to hand to `tokio::process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAgent {
    pub program: String,
    pub args: Vec<String>,
}

/// Split `command` shell-style and resolve its program: explicit paths are
/// validated in place, bare names go through a `PATH` lookup.
pub fn resolve_agent_command(command: &str) -> Result<ResolvedAgent, AgentCommandError> {
    let words = shlex::split(command).unwrap_or_default();
    let Some((program, args)) = words.split_first() else {
        return Err(AgentCommandError::Empty);
    };

    if looks_like_path(program) {
        let path = expand_tilde(Path::new(program));
        validate_executable_path(&path)?;
        return Ok(ResolvedAgent {
            program: path.display().to_string(),
            args: args.to_vec(),
        });
    }

    let resolved = which::which(program).map_err(|_| AgentCommandError::NotFoundInPath {
        command: program.clone(),
    })?;

    Ok(ResolvedAgent {
        program: resolved.display().to_string(),
        args: args.to_vec(),
    })
}

fn validate_executable_path(path: &Path) -> Result<(), AgentCommandError> {
    let meta = std::fs::metadata(path).map_err(|err| AgentCommandError::InvalidPath {
        path: path.to_path_buf(),
        reason: describe_metadata_error(&err),
    })?;

    if !meta.is_file() {
        return Err(AgentCommandError::InvalidPath {
            path: path.to_path_buf(),
            reason: "not a file".to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(AgentCommandError::InvalidPath {
                path: path.to_path_buf(),
                reason: "not executable".to_string(),
            });
        }
    }

    Ok(())
}

fn describe_metadata_error(err: &std::io::Error) -> String {
    match err.kind() {
        std::io::ErrorKind::NotFound => "does not exist".to_string(),
        std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

fn looks_like_path(value: &str) -> bool {
    let path = Path::new(value);
    path.is_absolute() || value.contains('/') || value.contains('\\') || value.starts_with('~')
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(stripped),
        None => path.to_path_buf(),
    }
}

fn ansi_red(text: String) -> String {
    format!("\u{1b}[31m{text}\u{1b}[0m")
}
