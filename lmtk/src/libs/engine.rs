use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An external mapping engine that can be opened into a session
pub trait Engine {
    type Session: Session;

    fn open(&self) -> Result<Self::Session>;
}

/// A line-oriented request/response conversation with an engine
pub trait Session {
    /// Send one command and collect the response lines
    fn send(&mut self, command: &str) -> Result<Vec<String>>;

    fn close(self) -> Result<()>;
}

/// Open a session, run `f` and close the session on every exit path
pub fn with_session<E, T, F>(engine: &E, f: F) -> Result<T>
where
    E: Engine,
    F: FnOnce(&mut E::Session) -> Result<T>,
{
    let mut session = engine.open()?;
    match f(&mut session) {
        Ok(value) => {
            session.close()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(close_err) = session.close() {
                tracing::debug!("Closing a failed session: {close_err}");
            }
            Err(e)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Line printed by the engine after every response
    pub end_marker: String,
    /// Command that makes the engine print `end_marker`
    pub echo_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: String::from("carthagene"),
            args: vec![],
            end_marker: String::from("__LMTK_END__"),
            echo_command: String::from("puts __LMTK_END__"),
        }
    }
}

impl EngineConfig {
    pub fn from_json(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::malformed(format!("engine configuration {path:?}: {e}")))
    }
}

/// An engine run as a child process talking over stdin and stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEngine {
    pub config: EngineConfig,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl Engine for ProcessEngine {
    type Session = ProcessSession;

    fn open(&self) -> Result<ProcessSession> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::engine(format!("failed to start {}: {e}", self.config.program)))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        tracing::debug!("Started engine {} (pid {})", self.config.program, child.id());

        Ok(ProcessSession {
            child: Some(child),
            stdin,
            stdout,
            end_marker: self.config.end_marker.clone(),
            echo_command: self.config.echo_command.clone(),
        })
    }
}

#[derive(Debug)]
pub struct ProcessSession {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    end_marker: String,
    echo_command: String,
}

impl Session for ProcessSession {
    fn send(&mut self, command: &str) -> Result<Vec<String>> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::engine("engine stdin is closed"))?;
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| Error::engine("engine stdout is closed"))?;

        tracing::trace!("> {command}");
        writeln!(stdin, "{command}")
            .and_then(|_| writeln!(stdin, "{}", self.echo_command))
            .and_then(|_| stdin.flush())
            .map_err(|e| Error::engine(format!("failed to send {command:?}: {e}")))?;

        let mut response = vec![];
        let mut line = String::new();
        loop {
            line.clear();
            let n = stdout
                .read_line(&mut line)
                .map_err(|e| Error::engine(format!("failed to read the response to {command:?}: {e}")))?;
            if n == 0 {
                return Err(Error::engine(format!(
                    "engine exited before answering {command:?}"
                )));
            }

            let text = line.trim_end_matches(['\r', '\n']);
            if let Some(pos) = text.find(self.end_marker.as_str()) {
                let head = text[..pos].trim();
                if !head.is_empty() {
                    response.push(head.to_string());
                }
                break;
            }
            response.push(text.to_string());
        }

        tracing::trace!("< {} lines", response.len());
        Ok(response)
    }

    fn close(mut self) -> Result<()> {
        drop(self.stdin.take());
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| Error::engine(format!("failed to wait for the engine: {e}")))?;
            if !status.success() {
                tracing::warn!("Engine exited with {status}");
            }
        }
        Ok(())
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(all(test, unix))]
#[rustfmt::skip]
mod tests {
    use super::*;

    fn shell() -> ProcessEngine {
        ProcessEngine::new(EngineConfig {
            program: String::from("sh"),
            args: vec![],
            end_marker: String::from("__LMTK_END__"),
            echo_command: String::from("echo __LMTK_END__"),
        })
    }

    #[test]
    fn request_response() {
        let lines = with_session(&shell(), |s| {
            let a = s.send("echo hello; echo world")?;
            let b = s.send("true")?;
            Ok((a, b))
        }).unwrap();
        assert_eq!(lines.0, vec!["hello", "world"]);
        assert!(lines.1.is_empty());
    }

    #[test]
    fn engine_exits_early() {
        let res = with_session(&shell(), |s| s.send("exit 3"));
        assert!(matches!(res, Err(Error::EngineSession { .. })));
    }

    #[test]
    fn missing_program() {
        let engine = ProcessEngine::new(EngineConfig { program: String::from("/nonexistent/lmtk-engine"), ..Default::default() });
        assert!(matches!(engine.open(), Err(Error::EngineSession { .. })));
    }

    #[test]
    fn config_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"program": "sh", "end_marker": "END", "echo_command": "echo END"}"#).unwrap();
        let config = EngineConfig::from_json(&path).unwrap();
        assert_eq!(config.program, "sh");
        assert!(config.args.is_empty());
    }
}
