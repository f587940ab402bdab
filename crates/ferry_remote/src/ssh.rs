//! OpenSSH command-line transport.
//!
//! Each dial starts a background ControlMaster (`ssh -M -N -f`) bound to a
//! private control socket. Every later operation is a short `ssh` or `scp`
//! invocation multiplexed over that master, so authentication happens once
//! per session. Closing the transport asks the master to exit.
//!
//! All commands run with `BatchMode=yes`: a host that wants an interactive
//! password is reported as [`ConnectionError::AuthRejected`] rather than
//! hanging on a prompt.

use crate::auth::Auth;
use crate::error::ConnectionError;
use crate::transport::{Connector, Transport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Exit status OpenSSH uses for its own (connection-level) failures.
const SSH_FAILURE: i32 = 255;

/// Connector that shells out to the system `ssh` and `scp` binaries.
#[derive(Debug, Clone)]
pub struct SshConnector {
    ssh_program: PathBuf,
    scp_program: PathBuf,
    control_dir: PathBuf,
    connect_timeout: Option<u32>,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SshConnector {
    /// Creates a connector using `ssh`/`scp` from `PATH`, with control
    /// sockets in the OS temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ssh_program: PathBuf::from("ssh"),
            scp_program: PathBuf::from("scp"),
            control_dir: std::env::temp_dir(),
            connect_timeout: Some(10),
        }
    }

    /// Overrides the `ssh` binary.
    #[must_use]
    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    /// Overrides the `scp` binary.
    #[must_use]
    pub fn with_scp_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.scp_program = program.into();
        self
    }

    /// Sets where control sockets are created.
    #[must_use]
    pub fn with_control_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.control_dir = dir.into();
        self
    }

    /// Sets the `ConnectTimeout` passed to ssh, in seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, seconds: Option<u32>) -> Self {
        self.connect_timeout = seconds;
        self
    }
}

impl Connector for SshConnector {
    fn dial(&self, auth: &Auth) -> Result<Box<dyn Transport>, ConnectionError> {
        let control_path = self
            .control_dir
            .join(format!("ferry-{}.sock", nanoid::nanoid!(12)));
        let mut session = SshSession {
            auth: auth.clone(),
            ssh_program: self.ssh_program.clone(),
            scp_program: self.scp_program.clone(),
            control_path,
            connect_timeout: self.connect_timeout,
            open: false,
        };

        let mut master = session.ssh_command();
        master.args(["-M", "-N", "-f"]).arg(auth.destination());
        let output = master.stdin(Stdio::null()).output()?;
        if !output.status.success() {
            return Err(dial_error(auth, &output));
        }

        tracing::debug!(destination = %auth, "ssh control master started");
        session.open = true;
        Ok(Box::new(session))
    }

    fn name(&self) -> &str {
        "ssh"
    }
}

fn dial_error(auth: &Auth, output: &Output) -> ConnectionError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("Permission denied") || stderr.contains("Host key verification failed") {
        ConnectionError::AuthRejected(auth.to_string())
    } else {
        ConnectionError::Unreachable(format!("{auth}: {}", stderr.trim()))
    }
}

/// Quotes `value` for a POSIX shell on the remote side.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

struct SshSession {
    auth: Auth,
    ssh_program: PathBuf,
    scp_program: PathBuf,
    control_path: PathBuf,
    connect_timeout: Option<u32>,
    open: bool,
}

impl SshSession {
    fn common_options(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
        ];
        if let Some(timeout) = self.connect_timeout {
            args.push("-o".to_string());
            args.push(format!("ConnectTimeout={timeout}"));
        }
        if let Some(port) = self.auth.port() {
            args.push(port_flag.to_string());
            args.push(port.to_string());
        }
        if let Some(key) = self.auth.key_file() {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        for (key, value) in self.auth.extra() {
            args.push("-o".to_string());
            args.push(format!("{key}={value}"));
        }
        args
    }

    fn ssh_command(&self) -> Command {
        let mut command = Command::new(&self.ssh_program);
        command.args(self.common_options("-p"));
        command
    }

    fn scp_command(&self) -> Command {
        let mut command = Command::new(&self.scp_program);
        command.arg("-q").args(self.common_options("-P"));
        command
    }

    /// Builds `ssh <opts> dest -- <remote shell command>`.
    fn remote(&self, script: &str) -> Command {
        let mut command = self.ssh_command();
        command.arg(self.auth.destination()).arg("--").arg(script);
        command
    }

    /// Builds scp's `[user@]host:path`, bracketing IPv6 literals.
    fn remote_spec(&self, remote: &str) -> String {
        let host = self.auth.hostname();
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        match self.auth.username() {
            Some(user) => format!("{user}@{host}:{remote}"),
            None => format!("{host}:{remote}"),
        }
    }

    fn run(&self, mut command: Command, program: &str) -> Result<Output, ConnectionError> {
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        let output = command.stdin(Stdio::null()).output()?;
        check(program, output)
    }
}

fn check(program: &str, output: Output) -> Result<Output, ConnectionError> {
    if output.status.success() {
        return Ok(output);
    }
    let status = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if status == SSH_FAILURE {
        return Err(ConnectionError::Unreachable(stderr));
    }
    if stderr.contains("No such file or directory") {
        return Err(ConnectionError::NotFound(stderr));
    }
    Err(ConnectionError::Command {
        program: program.to_string(),
        status,
        stderr,
    })
}

impl Transport for SshSession {
    fn is_active(&self) -> bool {
        if !self.open {
            return false;
        }
        let mut check = self.ssh_command();
        check
            .args(["-O", "check"])
            .arg(self.auth.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        check.status().is_ok_and(|status| status.success())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let mut exit = self.ssh_command();
        exit.args(["-O", "exit"])
            .arg(self.auth.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Err(err) = exit.status() {
            tracing::warn!(destination = %self.auth, error = %err, "failed to stop ssh control master");
        }
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<(), ConnectionError> {
        let mut command = self.scp_command();
        command.arg(local).arg(self.remote_spec(remote));
        self.run(command, "scp").map(drop)
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<(), ConnectionError> {
        let mut command = self.scp_command();
        command.arg(self.remote_spec(remote)).arg(local);
        self.run(command, "scp").map(drop)
    }

    fn read(&mut self, remote: &str) -> Result<Vec<u8>, ConnectionError> {
        let command = self.remote(&format!("cat -- {}", shell_quote(remote)));
        Ok(self.run(command, "ssh")?.stdout)
    }

    fn write(&mut self, remote: &str, contents: &[u8]) -> Result<(), ConnectionError> {
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        let mut command = self.remote(&format!("cat > {}", shell_quote(remote)));
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(contents)?;
        }
        check("ssh", child.wait_with_output()?).map(drop)
    }

    fn remove(&mut self, remote: &str) -> Result<(), ConnectionError> {
        let quoted = shell_quote(remote);
        let script = format!("test -e {quoted} || exit 3; rm -- {quoted}");
        let mut command = self.remote(&script);
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        let output = command.stdin(Stdio::null()).output()?;
        if output.status.code() == Some(3) {
            return Err(ConnectionError::not_found(remote));
        }
        check("ssh", output).map(drop)
    }

    fn exists(&mut self, remote: &str) -> Result<bool, ConnectionError> {
        if !self.open {
            return Err(ConnectionError::Closed);
        }
        let mut command = self.remote(&format!("test -e {}", shell_quote(remote)));
        let output = command.stdin(Stdio::null()).output()?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => check("ssh", output).map(|_| false),
        }
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, ConnectionError> {
        let command = self.remote(&format!("ls -1Ap -- {}", shell_quote(dir)));
        let output = self.run(command, "ssh")?;
        let mut names: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    fn create_dir(&mut self, dir: &str) -> Result<(), ConnectionError> {
        let command = self.remote(&format!("mkdir -p -- {}", shell_quote(dir)));
        self.run(command, "ssh").map(drop)
    }

    fn remove_dir(&mut self, dir: &str) -> Result<(), ConnectionError> {
        let command = self.remote(&format!("rmdir -- {}", shell_quote(dir)));
        self.run(command, "ssh").map(drop)
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(auth: Auth) -> SshSession {
        SshSession {
            auth,
            ssh_program: PathBuf::from("ssh"),
            scp_program: PathBuf::from("scp"),
            control_path: PathBuf::from("/tmp/ferry-test.sock"),
            connect_timeout: None,
            open: false,
        }
    }

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("/tmp/a b.csv"), "'/tmp/a b.csv'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn ssh_uses_lowercase_port_flag_and_scp_uppercase() {
        let s = session(Auth::new("host").with_username("joe").with_port(2222));
        let ssh = args(&s.ssh_command());
        let scp = args(&s.scp_command());
        assert!(ssh.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(scp.windows(2).any(|w| w == ["-P", "2222"]));
        assert!(ssh.contains(&"ControlPath=/tmp/ferry-test.sock".to_string()));
    }

    #[test]
    fn key_file_is_passed_with_identity_flag() {
        let s = session(Auth::new("host").with_key_file("/keys/id"));
        let ssh = args(&s.ssh_command());
        assert!(ssh.windows(2).any(|w| w == ["-i", "/keys/id"]));
    }

    #[test]
    fn extra_options_reach_ssh_and_scp() {
        let s = session(
            Auth::new("host")
                .with_extra("StrictHostKeyChecking", "no")
                .with_extra("Compression", "yes"),
        );
        for argv in [args(&s.ssh_command()), args(&s.scp_command())] {
            assert!(argv.windows(2).any(|w| w == ["-o", "StrictHostKeyChecking=no"]));
            assert!(argv.windows(2).any(|w| w == ["-o", "Compression=yes"]));
        }
    }

    #[test]
    fn remote_command_targets_destination() {
        let s = session(Auth::new("host").with_username("joe"));
        let cmd = args(&s.remote("true"));
        let tail = &cmd[cmd.len() - 3..];
        assert_eq!(tail, ["joe@host", "--", "true"]);
        assert_eq!(s.remote_spec("/data/x.csv"), "joe@host:/data/x.csv");
    }

    #[test]
    fn ipv6_hosts_are_bracketed_for_scp() {
        let s = session(Auth::new("::1").with_username("joe"));
        assert_eq!(s.remote_spec("/data/x.csv"), "joe@[::1]:/data/x.csv");
        let s = session(Auth::new("fe80::2"));
        assert_eq!(s.remote_spec("/x"), "[fe80::2]:/x");
    }

    #[test]
    fn closed_session_refuses_work() {
        let mut s = session(Auth::new("host"));
        assert!(!s.is_active());
        assert!(matches!(s.read("/x"), Err(ConnectionError::Closed)));
        assert!(matches!(s.exists("/x"), Err(ConnectionError::Closed)));
    }
}
