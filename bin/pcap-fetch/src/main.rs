#![deny(unsafe_code)]

use std::io::Write;
use std::{env, io, process::ExitCode};

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    run_with(env::args_os(), &mut stdout, &mut stderr)
}

fn run_with<I, Out, Err>(args: I, stdout: &mut Out, stderr: &mut Err) -> ExitCode
where
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
    Out: Write,
    Err: Write,
{
    let code = cli::run(args, stdout, stderr);
    cli::exit_code_from(code)
}

#[cfg(test)]
mod tests {
    use super::run_with;

    // std::process::ExitCode has no PartialEq, so these exercise run_with's
    // plumbing (argument forwarding, stdout/stderr wiring) and leave the
    // exit-status mapping itself to cli's own tests against its ExitCode enum.

    #[test]
    fn test_flag_reports_success() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let _ = run_with(["pcap-fetch", "--test", "4096", "-q"], &mut stdout, &mut stderr);
        assert!(!stdout.is_empty());
        assert!(stderr.is_empty());
    }

    #[test]
    fn no_operation_reports_usage_failure() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let _ = run_with(["pcap-fetch"], &mut stdout, &mut stderr);
        assert!(stdout.is_empty());
        assert!(!stderr.is_empty());
    }
}
