//! Administrator check and elevated relaunch.
//!
//! Repairs need administrator rights. When the process is not elevated the
//! binary relaunches itself through the platform's elevation prompt and
//! exits with [`ELEVATION_REQUIRED_EXIT_CODE`].
//!
//! ```rust,ignore
//! if !hostfix_elevation::is_elevated() {
//!     hostfix_elevation::relaunch_elevated()?;
//!     std::process::exit(hostfix_elevation::ELEVATION_REQUIRED_EXIT_CODE);
//! }
//! ```

use std::ffi::OsString;
use std::io;
use std::process::{Command, Stdio};

/// Exit code of the unelevated process after it hands off to the elevated
/// one.
pub const ELEVATION_REQUIRED_EXIT_CODE: i32 = 1;

/// Whether the current process holds administrator rights.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    // `net session` is refused with "Access is denied" for standard users.
    let status = Command::new("net")
        .arg("session")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    matches!(status, Ok(status) if status.success())
}

/// Whether the current process holds administrator rights.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Start a new elevated copy of this process with the same arguments.
///
/// Returns once the elevation request was handed to the OS; the caller is
/// expected to exit.
pub fn relaunch_elevated() -> io::Result<()> {
    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let (program, argv) = relaunch_argv(&exe.to_string_lossy(), &args);

    Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Program and arguments that relaunch `exe` elevated.
#[cfg(windows)]
pub fn relaunch_argv(exe: &str, args: &[String]) -> (OsString, Vec<OsString>) {
    (
        OsString::from("powershell.exe"),
        vec![
            OsString::from("-NoProfile"),
            OsString::from("-Command"),
            OsString::from(start_process_command(exe, args)),
        ],
    )
}

/// Program and arguments that relaunch `exe` elevated.
#[cfg(not(windows))]
pub fn relaunch_argv(exe: &str, args: &[String]) -> (OsString, Vec<OsString>) {
    let mut argv = vec![OsString::from(exe)];
    argv.extend(args.iter().map(OsString::from));
    (OsString::from("sudo"), argv)
}

/// `Start-Process ... -Verb RunAs` with every value single-quoted.
#[cfg_attr(not(windows), allow(dead_code))]
fn start_process_command(exe: &str, args: &[String]) -> String {
    let mut command = format!("Start-Process -FilePath {} -Verb RunAs", ps_quote(exe));
    if !args.is_empty() {
        let list: Vec<String> = args.iter().map(String::as_str).map(ps_quote).collect();
        command.push_str(" -ArgumentList ");
        command.push_str(&list.join(","));
    }
    command
}

/// PowerShell single-quoted literal; embedded quotes are doubled.
#[cfg_attr(not(windows), allow(dead_code))]
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn start_process_quotes_every_value() {
        let command = start_process_command(
            r"C:\Program Files\hostfix\hostfix.exe",
            &["--backup-dir".to_string(), r"D:\it's here".to_string()],
        );
        assert_eq!(
            command,
            r"Start-Process -FilePath 'C:\Program Files\hostfix\hostfix.exe' -Verb RunAs -ArgumentList '--backup-dir','D:\it''s here'"
        );
    }

    #[test]
    fn start_process_without_arguments() {
        assert_eq!(
            start_process_command("hostfix.exe", &[]),
            "Start-Process -FilePath 'hostfix.exe' -Verb RunAs"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn unix_relaunch_goes_through_sudo() {
        let (program, argv) = relaunch_argv("/usr/bin/hostfix", &["--skip-backup".to_string()]);
        assert_eq!(program, OsString::from("sudo"));
        assert_eq!(
            argv,
            vec![
                OsString::from("/usr/bin/hostfix"),
                OsString::from("--skip-backup")
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn unix_elevation_matches_effective_uid() {
        let root = unsafe { libc::geteuid() } == 0;
        assert_eq!(is_elevated(), root);
    }
}
