use bytes::{Buf, BufMut};
use thiserror::Error;

/// Length in bytes of the `stream_name`, `filter_bpf`, and `filter_re` fixed
/// byte-string fields.
pub const STREAM_NAME_LEN: usize = 1024;
pub const FILTER_LEN: usize = 1024;
/// Number of `u32` slots in the `arg` field.
pub const ARG_LEN: usize = 1024;

const PROTOCOL_VERSION: u8 = 0x10;

/// Errors decoding a [`CommandFrame`] or its `cmd` discriminant.
#[derive(Debug, Error)]
pub enum CommandFrameError {
    #[error("short read: need {need} bytes, got {got}")]
    ShortBuffer { need: usize, got: usize },
    #[error("unrecognized command code {0}")]
    UnknownCommand(u32),
    #[error("unexpected protocol version 0x{0:02x}, expected 0x{PROTOCOL_VERSION:02x}")]
    UnexpectedVersion(u8),
}

/// Control-channel command discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List = 1,
    Get = 2,
    End = 100,
    Ok = 101,
    Ng = 102,
}

impl Command {
    fn from_u32(value: u32) -> Result<Self, CommandFrameError> {
        match value {
            1 => Ok(Self::List),
            2 => Ok(Self::Get),
            100 => Ok(Self::End),
            101 => Ok(Self::Ok),
            102 => Ok(Self::Ng),
            other => Err(CommandFrameError::UnknownCommand(other)),
        }
    }
}

/// Packed control-channel request/response frame.
///
/// Layout: `version:u8`, `cmd:u32`, `stream_name:[u8; 1024]`,
/// `stream_size:u64`, `arg:[u32; 1024]`, `filter_bpf:[u8; 1024]`,
/// `filter_re:[u8; 1024]`.
///
/// This struct is large (roughly 9 KiB); callers that stack-allocate many of
/// them at once should box it.
#[derive(Clone)]
pub struct CommandFrame {
    pub cmd: Command,
    pub stream_name: [u8; STREAM_NAME_LEN],
    pub stream_size: u64,
    pub arg: [u32; ARG_LEN],
    pub filter_bpf: [u8; FILTER_LEN],
    pub filter_re: [u8; FILTER_LEN],
}

impl CommandFrame {
    pub const ENCODED_LEN: usize = 1 + 4 + STREAM_NAME_LEN + 8 + ARG_LEN * 4 + FILTER_LEN * 2;

    #[must_use]
    pub fn new(cmd: Command) -> Self {
        Self {
            cmd,
            stream_name: [0; STREAM_NAME_LEN],
            stream_size: 0,
            arg: [0; ARG_LEN],
            filter_bpf: [0; FILTER_LEN],
            filter_re: [0; FILTER_LEN],
        }
    }

    #[must_use]
    pub fn list() -> Self {
        Self::new(Command::List)
    }

    #[must_use]
    pub fn get(stream_name: &str) -> Self {
        let mut frame = Self::new(Command::Get);
        frame.set_stream_name(stream_name);
        frame
    }

    pub fn set_stream_name(&mut self, name: &str) {
        write_fixed_str(&mut self.stream_name, name);
    }

    #[must_use]
    pub fn stream_name(&self) -> String {
        read_fixed_str(&self.stream_name)
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u32_le(self.cmd as u32);
        buf.put_slice(&self.stream_name);
        buf.put_u64_le(self.stream_size);
        for value in self.arg {
            buf.put_u32_le(value);
        }
        buf.put_slice(&self.filter_bpf);
        buf.put_slice(&self.filter_re);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, CommandFrameError> {
        if buf.remaining() < Self::ENCODED_LEN {
            return Err(CommandFrameError::ShortBuffer {
                need: Self::ENCODED_LEN,
                got: buf.remaining(),
            });
        }
        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(CommandFrameError::UnexpectedVersion(version));
        }
        let cmd = Command::from_u32(buf.get_u32_le())?;

        let mut stream_name = [0u8; STREAM_NAME_LEN];
        buf.copy_to_slice(&mut stream_name);

        let stream_size = buf.get_u64_le();

        let mut arg = [0u32; ARG_LEN];
        for slot in &mut arg {
            *slot = buf.get_u32_le();
        }

        let mut filter_bpf = [0u8; FILTER_LEN];
        buf.copy_to_slice(&mut filter_bpf);
        let mut filter_re = [0u8; FILTER_LEN];
        buf.copy_to_slice(&mut filter_re);

        Ok(Self {
            cmd,
            stream_name,
            stream_size,
            arg,
            filter_bpf,
            filter_re,
        })
    }
}

fn write_fixed_str(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
    field[n..].fill(0);
}

fn read_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
