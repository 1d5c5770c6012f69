use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use native_tls::{HandshakeError, TlsConnector, TlsStream};

use super::error::ProbeError;
use super::options::ProbeOptions;
use super::types::SmtpReply;
use crate::cancel::{CancelToken, SocketRegistration};

const MAX_LINE_LEN: usize = 4096;
const MAX_REPLY_LINES: usize = 128;

#[derive(Debug)]
enum StreamState {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Invalid,
}

#[derive(Debug)]
struct SmtpStream {
    state: StreamState,
    buffer: Vec<u8>,
    idle_timeout: Duration,
    deadline: Instant,
}

impl SmtpStream {
    fn connect(
        addrs: &[SocketAddr],
        options: &ProbeOptions,
        deadline: Instant,
    ) -> Result<(Self, SocketAddr), std::io::Error> {
        let connect_deadline = (Instant::now() + options.connect_timeout).min(deadline);
        let mut last_err = None;
        for addr in addrs {
            let Some(budget) = remaining(connect_deadline) else {
                break;
            };
            match TcpStream::connect_timeout(addr, budget) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(options.idle_timeout))?;
                    stream.set_write_timeout(Some(options.idle_timeout))?;
                    let stream = Self {
                        state: StreamState::Plain(stream),
                        buffer: Vec::new(),
                        idle_timeout: options.idle_timeout,
                        deadline,
                    };
                    return Ok((stream, *addr));
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timeout elapsed")
        }))
    }

    fn tcp(&self) -> Option<&TcpStream> {
        match &self.state {
            StreamState::Plain(stream) => Some(stream),
            StreamState::Tls(stream) => Some(stream.get_ref()),
            StreamState::Invalid => None,
        }
    }

    /// Clamp the socket timeouts to what is left of the probe budget.
    fn arm_timeouts(&self) -> Result<(), ProbeError> {
        let budget = remaining(self.deadline).ok_or(ProbeError::DeadlineExceeded)?;
        let timeout = Some(budget.min(self.idle_timeout));
        let tcp = self
            .tcp()
            .ok_or_else(|| ProbeError::protocol("invalid stream state"))?;
        tcp.set_read_timeout(timeout).map_err(ProbeError::io)?;
        tcp.set_write_timeout(timeout).map_err(ProbeError::io)?;
        Ok(())
    }

    fn upgrade_tls(&mut self, domain: &str, connector: &TlsConnector) -> Result<(), ProbeError> {
        self.arm_timeouts()?;
        let plain = match std::mem::replace(&mut self.state, StreamState::Invalid) {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => {
                self.state = StreamState::Tls(stream);
                return Ok(());
            }
            StreamState::Invalid => return Err(ProbeError::protocol("invalid stream state")),
        };
        // bytes pipelined before the handshake must not be read as TLS data
        self.buffer.clear();

        let tls = complete_handshake(connector, domain, plain, self.deadline)?;
        self.state = StreamState::Tls(Box::new(tls));
        Ok(())
    }

    fn write_line(&mut self, command: &str) -> Result<(), ProbeError> {
        self.arm_timeouts()?;
        let mut data = command.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        let result = match &mut self.state {
            StreamState::Plain(stream) => stream.write_all(&data).and_then(|_| stream.flush()),
            StreamState::Tls(stream) => stream.write_all(&data).and_then(|_| stream.flush()),
            StreamState::Invalid => return Err(ProbeError::protocol("invalid stream state")),
        };
        result.map_err(ProbeError::io)
    }

    fn read_reply(&mut self) -> Result<SmtpReply, ProbeError> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            let line = self.read_line()?;
            if line.len() < 3 || !line.is_char_boundary(3) {
                return Err(ProbeError::protocol(format!("invalid reply: {line}")));
            }
            let parsed_code = line[..3]
                .parse::<u16>()
                .map_err(|_| ProbeError::protocol(format!("invalid code in line: {line}")))?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(ProbeError::protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());
            if is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(ProbeError::protocol("reply has too many lines"));
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or_default(),
            lines,
        })
    }

    fn read_line(&mut self) -> Result<String, ProbeError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line = self.buffer.drain(..=pos).collect::<Vec<_>>();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if self.buffer.len() > MAX_LINE_LEN {
                return Err(ProbeError::protocol("reply line too long"));
            }

            self.arm_timeouts()?;
            let mut buf = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut buf),
                StreamState::Tls(stream) => stream.read(&mut buf),
                StreamState::Invalid => return Err(ProbeError::protocol("invalid stream state")),
            };
            let read = read.map_err(ProbeError::io)?;
            if read == 0 {
                return Err(ProbeError::io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            self.buffer.extend_from_slice(&buf[..read]);
        }
    }
}

fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

fn complete_handshake(
    connector: &TlsConnector,
    domain: &str,
    stream: TcpStream,
    deadline: Instant,
) -> Result<TlsStream<TcpStream>, ProbeError> {
    match connector.connect(domain, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(err)) => Err(ProbeError::Tls { source: err }),
        // blocking socket: WouldBlock is the idle timeout armed before the handshake
        Err(HandshakeError::WouldBlock(_)) if remaining(deadline).is_none() => {
            Err(ProbeError::DeadlineExceeded)
        }
        Err(HandshakeError::WouldBlock(_)) => Err(ProbeError::io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "TLS handshake stalled",
        ))),
    }
}

/// One SMTP dialogue with a single exchanger. The socket is closed when the
/// session is dropped.
pub(crate) struct SmtpSession {
    host: String,
    stream: SmtpStream,
    cancel: CancelToken,
    _registration: SocketRegistration,
    transcript: Vec<String>,
}

impl SmtpSession {
    pub(crate) fn connect(
        host: &str,
        addrs: &[SocketAddr],
        options: &ProbeOptions,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<Self, ProbeError> {
        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }
        let (stream, peer) =
            SmtpStream::connect(addrs, options, deadline).map_err(|source| ProbeError::Connect {
                host: host.to_string(),
                source,
            })?;
        let tcp = stream
            .tcp()
            .ok_or_else(|| ProbeError::protocol("invalid stream state"))?;
        let registration = cancel.register(tcp).map_err(ProbeError::io)?;

        let mut session = Self {
            host: host.to_string(),
            stream,
            cancel: cancel.clone(),
            _registration: registration,
            transcript: Vec::new(),
        };
        session.record("*", &format!("connected to {peer}"));
        Ok(session)
    }

    pub(crate) fn read_reply(&mut self) -> Result<SmtpReply, ProbeError> {
        self.ensure_live()?;
        let reply = self.stream.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    pub(crate) fn command(&mut self, command: &str) -> Result<SmtpReply, ProbeError> {
        self.ensure_live()?;
        self.record("C", command);
        self.stream.write_line(command)?;
        self.read_reply()
    }

    /// Issue STARTTLS and, when the server agrees, upgrade the stream.
    pub(crate) fn starttls(&mut self, connector: &TlsConnector) -> Result<SmtpReply, ProbeError> {
        let reply = self.command("STARTTLS")?;
        if !reply.is_positive_completion() {
            return Ok(reply);
        }
        let host = self.host.clone();
        self.stream.upgrade_tls(&host, connector)?;
        self.record("*", "TLS established");
        Ok(reply)
    }

    /// Send QUIT without waiting for the 221; errors are only recorded.
    pub(crate) fn quit(&mut self) {
        if self.ensure_live().is_err() {
            return;
        }
        self.record("C", "QUIT");
        if let Err(err) = self.stream.write_line("QUIT") {
            self.record("!", &err.to_string());
        }
    }

    pub(crate) fn transcript(&self) -> &[String] {
        &self.transcript
    }

    fn ensure_live(&self) -> Result<(), ProbeError> {
        if self.cancel.is_cancelled() {
            Err(ProbeError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn record(&mut self, direction: &str, message: &str) {
        let line = format!("[{}] {direction}: {message}", self.host);
        tracing::trace!(target: "mailprobe::smtp", "{line}");
        self.transcript.push(line);
    }

    fn record_reply(&mut self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            self.record("S", &reply.code.to_string());
        } else {
            let lines: Vec<String> = reply
                .lines
                .iter()
                .map(|line| format!("{} {line}", reply.code))
                .collect();
            for line in lines {
                self.record("S", &line);
            }
        }
    }
}
