//! Process tree inspection through `/proc`.
//!
//! Proxy clients report the pid of a launcher process; the real program
//! is one or two levels below it. These helpers walk the tree downward
//! by reading the `PPid` line of every `/proc/{pid}/status`.

use std::fs;

/// Get the parent PID of a process by reading `/proc/{pid}/status`.
///
/// Returns `None` if the process doesn't exist, `/proc` is unavailable,
/// or the status file doesn't contain a valid `PPid` line.
pub fn get_ppid(pid: u32) -> Option<u32> {
    let status = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_ppid(&status)
}

fn parse_ppid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("PPid:"))
        .and_then(|ppid| ppid.trim().parse().ok())
}

/// List the direct children of `pid`, sorted ascending.
///
/// Processes that exit while the table is being read are skipped.
pub fn child_pids(pid: u32) -> std::io::Result<Vec<u32>> {
    let mut children = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let Ok(entry) = entry else { continue };
        let Some(candidate) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        if get_ppid(candidate) == Some(pid) {
            children.push(candidate);
        }
    }
    children.sort_unstable();
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_ppid_of_self() {
        assert!(
            get_ppid(std::process::id()).is_some(),
            "should be able to read own PPid"
        );
    }

    #[test]
    fn get_ppid_of_nonexistent_pid() {
        assert_eq!(get_ppid(u32::MAX), None);
    }

    #[test]
    fn parse_ppid_ignores_other_lines() {
        let status = "Name:\tsynth\nState:\tS (sleeping)\nPid:\t4242\nPPid:\t17\n";
        assert_eq!(parse_ppid(status), Some(17));
        assert_eq!(parse_ppid("Name:\tsynth\n"), None);
        assert_eq!(parse_ppid("PPid:\tabc\n"), None);
    }

    #[test]
    fn self_is_child_of_parent() {
        let me = std::process::id();
        let parent = get_ppid(me).expect("should have PPid");
        let children = child_pids(parent).unwrap();
        assert!(children.contains(&me));
        assert!(children.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn nonexistent_pid_has_no_children() {
        assert!(child_pids(u32::MAX).unwrap().is_empty());
    }
}
