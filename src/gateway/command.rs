//! Command-backed gateway: spawns the external tools and parses their
//! stdout.
//!
//! Arguments are passed as argv, never through a shell, so client ids,
//! session names and title patterns need no quoting. Every call blocks
//! until the child exits, except `switch_to` and `launch`, whose child
//! is reaped on a detached thread.

use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use super::{GatewayError, Port, SessionGateway, SwitchScope, TitleMode, process};
use crate::config::Config;

/// Gateway driving the real session-manager and window tools.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    control_program: String,
    pid_window_program: String,
    title_window_program: String,
    switch_program: String,
}

impl CommandGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            control_program: config.control_program.clone(),
            pid_window_program: config.pid_window_program.clone(),
            title_window_program: config.title_window_program.clone(),
            switch_program: config.switch_program.clone(),
        }
    }

    fn control(&self, port: &Port, args: &[&str]) -> Result<String, GatewayError> {
        let mut argv = vec!["--port", port.as_str()];
        argv.extend_from_slice(args);
        run_capture(&self.control_program, &argv)
    }

    fn spawn_detached(&self, args: &[&str]) -> Result<(), GatewayError> {
        debug!(program = %self.switch_program, ?args, "spawning");
        let child = Command::new(&self.switch_program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| GatewayError::Spawn {
                program: self.switch_program.clone(),
                source,
            })?;
        reap_in_background(child);
        Ok(())
    }
}

impl SessionGateway for CommandGateway {
    fn list_daemons(&self) -> Result<Vec<String>, GatewayError> {
        let out = run_capture(&self.control_program, &["list_daemons"])?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }

    fn session_path(&self, port: &Port) -> Result<Option<String>, GatewayError> {
        let out = self.control(port, &["get_session_path"])?;
        Ok(non_blank(out.trim()))
    }

    fn list_clients(&self, port: &Port) -> Result<Vec<String>, GatewayError> {
        let out = self.control(port, &["list_clients"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn custom_data(
        &self,
        port: &Port,
        client_id: &str,
        key: &str,
    ) -> Result<Option<String>, GatewayError> {
        let out = self.control(port, &["client", client_id, "get_custom_data", key])?;
        Ok(out.lines().next().map(str::to_string))
    }

    fn client_pid(&self, port: &Port, client_id: &str) -> Result<u32, GatewayError> {
        let out = self.control(port, &["client", client_id, "get_pid"])?;
        parse_pid(&out)
    }

    fn list_children(&self, pid: u32) -> Result<Vec<u32>, GatewayError> {
        process::child_pids(pid).map_err(|source| GatewayError::Spawn {
            program: "/proc".to_string(),
            source,
        })
    }

    fn find_windows_by_pid(
        &self,
        pid: u32,
        mode: TitleMode,
        pattern: Option<&str>,
    ) -> Result<String, GatewayError> {
        let pid = pid.to_string();
        let mut args = vec![mode.as_flag(), pid.as_str()];
        if let Some(pattern) = pattern.filter(|p| !p.trim().is_empty()) {
            args.push(pattern);
        }
        run_capture(&self.pid_window_program, &args)
    }

    fn find_windows_by_title(
        &self,
        pattern: &str,
        mode: TitleMode,
    ) -> Result<String, GatewayError> {
        run_capture(&self.title_window_program, &[mode.as_flag(), pattern])
    }

    fn switch_to(&self, scope: SwitchScope<'_>, window_id: &str) -> Result<(), GatewayError> {
        self.spawn_detached(&switch_args(scope, window_id))
    }

    fn launch(&self, launcher: &str, title_hint: Option<&str>) -> Result<(), GatewayError> {
        self.spawn_detached(&launch_args(launcher, title_hint))
    }
}

fn switch_args<'a>(scope: SwitchScope<'a>, window_id: &'a str) -> Vec<&'a str> {
    let mut args = match scope {
        SwitchScope::Session(session) => vec!["--sessionname", session],
        SwitchScope::Launcher(launcher) => vec!["--guitoload", launcher],
        SwitchScope::Unscoped => Vec::new(),
    };
    args.extend(["--windowid", window_id]);
    args
}

fn launch_args<'a>(launcher: &'a str, title_hint: Option<&'a str>) -> Vec<&'a str> {
    let mut args = vec!["--guitoload", launcher];
    if let Some(title) = title_hint {
        args.extend(["--windowtitle", title]);
    }
    args
}

/// Run `program` to completion and return its stdout.
fn run_capture(program: &str, args: &[&str]) -> Result<String, GatewayError> {
    debug!(%program, ?args, "running");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| GatewayError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(GatewayError::Status {
            program: program.to_string(),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn reap_in_background(mut child: Child) {
    let spawned = std::thread::Builder::new()
        .name("gateway-reaper".into())
        .spawn(move || {
            if let Err(e) = child.wait() {
                debug!(error = %e, "wait on detached child failed");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn reaper thread");
    }
}

fn parse_pid(output: &str) -> Result<u32, GatewayError> {
    output
        .lines()
        .next()
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| GatewayError::Malformed {
            what: "pid",
            output: output.to_string(),
        })
}

fn non_blank(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
