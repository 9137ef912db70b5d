//! Process exit codes returned by the binary's `main`.
//!
//! Unlike upstream rsync's dense `errcode.h` table, this client only needs a
//! handful of distinct outer states; each still gets its own code so a
//! calling script can tell a usage mistake from a dropped connection from an
//! idle-watchdog abort.

/// Exit status surfaced to the process, matching the conventional
/// `0`/nonzero Unix contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Transfer (or `--list`) completed successfully.
    Ok = 0,
    /// Command-line arguments were invalid.
    Usage = 1,
    /// The control channel rejected `GET` or the connection was refused.
    ControlFailed = 2,
    /// A data connection failed or closed before end-of-stream.
    ConnectionFailed = 3,
    /// The idle watchdog fired: no merger progress within the configured
    /// timeout.
    Idle = 4,
    /// The appliance sent a malformed chunk or command frame.
    ProtocolViolation = 5,
    /// The output file could not be opened or written.
    OutputFailed = 6,
}

impl ExitCode {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn to_process_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self.as_i32() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::ExitCode;

    #[test]
    fn ok_is_zero() {
        assert_eq!(ExitCode::Ok.as_i32(), 0);
    }

    #[test]
    fn every_failure_variant_is_nonzero() {
        for code in [
            ExitCode::Usage,
            ExitCode::ControlFailed,
            ExitCode::ConnectionFailed,
            ExitCode::Idle,
            ExitCode::ProtocolViolation,
            ExitCode::OutputFailed,
        ] {
            assert_ne!(code.as_i32(), 0);
        }
    }
}
