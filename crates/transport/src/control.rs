use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::BytesMut;
use protocol::{Command, CommandFrame, CommandFrameError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] CommandFrameError),
    #[error("appliance rejected the request")]
    Rejected,
    #[error("unexpected response command {0:?}")]
    UnexpectedResponse(Command),
}

/// Result of a successful `GET` request.
#[derive(Debug, Clone, Copy)]
pub struct GetOutcome {
    pub stream_size: u64,
}

/// A connection to the appliance's control port.
pub struct ControlClient {
    stream: TcpStream,
}

impl ControlClient {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ControlError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Sends `LIST` and collects every stream name until the appliance
    /// sends `END`.
    pub fn list(&mut self) -> Result<Vec<String>, ControlError> {
        self.send(&CommandFrame::list())?;

        let mut streams = Vec::new();
        loop {
            let frame = self.recv()?;
            match frame.cmd {
                Command::End => break,
                Command::Ok => streams.push(frame.stream_name()),
                other => {
                    warn!(?other, "unexpected frame while listing streams");
                    return Err(ControlError::UnexpectedResponse(other));
                }
            }
        }
        debug!(count = streams.len(), "received stream listing");
        Ok(streams)
    }

    /// Sends `GET` for `stream_name`; an `OK` response authorizes opening
    /// the data connections, an `NG` response is a rejection.
    pub fn get(&mut self, stream_name: &str) -> Result<GetOutcome, ControlError> {
        self.send(&CommandFrame::get(stream_name))?;
        let frame = self.recv()?;
        match frame.cmd {
            Command::Ok => Ok(GetOutcome {
                stream_size: frame.stream_size,
            }),
            Command::Ng => Err(ControlError::Rejected),
            other => Err(ControlError::UnexpectedResponse(other)),
        }
    }

    fn send(&mut self, frame: &CommandFrame) -> Result<(), ControlError> {
        let mut buf = BytesMut::with_capacity(CommandFrame::ENCODED_LEN);
        frame.encode(&mut buf);
        self.stream.write_all(&buf)?;
        Ok(())
    }

    fn recv(&mut self) -> Result<CommandFrame, ControlError> {
        let mut buf = vec![0u8; CommandFrame::ENCODED_LEN];
        self.stream.read_exact(&mut buf)?;
        Ok(CommandFrame::decode(&mut &buf[..])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn respond(mut stream: TcpStream, frames: Vec<CommandFrame>) {
        // Drain the request frame before replying.
        let mut request = vec![0u8; CommandFrame::ENCODED_LEN];
        stream.read_exact(&mut request).unwrap();
        for frame in frames {
            let mut buf = BytesMut::with_capacity(CommandFrame::ENCODED_LEN);
            frame.encode(&mut buf);
            stream.write_all(&buf).unwrap();
        }
    }

    #[test]
    fn list_collects_names_until_end() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            respond(
                stream,
                vec![
                    CommandFrame::get("port0_eth"),
                    CommandFrame::get("port1_eth"),
                    CommandFrame::new(Command::End),
                ]
                .into_iter()
                .map(|mut f| {
                    f.cmd = Command::Ok;
                    f
                })
                .collect(),
            );
        });

        let mut client = ControlClient::connect(addr).unwrap();
        let streams = client.list().unwrap();
        assert_eq!(streams, vec!["port0_eth", "port1_eth"]);
        server.join().unwrap();
    }

    #[test]
    fn get_returns_rejection_on_ng() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            respond(stream, vec![CommandFrame::new(Command::Ng)]);
        });

        let mut client = ControlClient::connect(addr).unwrap();
        let err = client.get("missing").unwrap_err();
        assert!(matches!(err, ControlError::Rejected));
        server.join().unwrap();
    }
}
