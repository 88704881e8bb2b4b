//! Builds the host command for a rebuild script.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use tokio::process::Command;

/// How the script process is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Enter PID 1's namespaces and run as the host user.
    Nsenter,
    /// Run the script with [`HostLauncher::shell`] in this process's own
    /// namespaces.
    Direct,
}

impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nsenter" => Ok(Self::Nsenter),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown launch mode '{other}' (expected nsenter or direct)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostLauncher {
    pub mode: LaunchMode,
    /// Script directory as mounted in this process.
    pub scripts_dir: PathBuf,
    /// The same directory on the host.
    pub host_scripts_dir: PathBuf,
    pub host_user: String,
    /// Interpreter for [`LaunchMode::Direct`].
    pub shell: String,
}

impl HostLauncher {
    /// Translate a local script path to its host path.
    ///
    /// Paths outside the scripts directory are returned unchanged.
    pub fn host_path(&self, local: &Path) -> PathBuf {
        match local.strip_prefix(&self.scripts_dir) {
            Ok(rest) => self.host_scripts_dir.join(rest),
            Err(_) => local.to_path_buf(),
        }
    }

    /// Program and arguments for running `local`.
    pub fn argv(&self, local: &Path) -> (String, Vec<String>) {
        match self.mode {
            LaunchMode::Nsenter => {
                let host = self.host_path(local);
                let inner = format!("bash {}", shell_quote(&host.to_string_lossy()));
                let args = [
                    "--target", "1", "--mount", "--uts", "--ipc", "--net", "--pid", "--", "su", "-",
                ]
                .iter()
                .map(|s| s.to_string())
                .chain([self.host_user.clone(), "-c".to_string(), inner])
                .collect();
                ("nsenter".to_string(), args)
            }
            LaunchMode::Direct => (
                self.shell.clone(),
                vec![local.to_string_lossy().into_owned()],
            ),
        }
    }

    /// Command with piped output, killed if its handle is dropped.
    pub fn command(&self, local: &Path) -> Command {
        let (program, args) = self.argv(local);
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
