use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use suppaftp::list::File as ListEntry;
use suppaftp::types::Response;
use suppaftp::{FtpError, FtpStream, Status};

use super::codec::NameCodec;
use super::{RemoteSession, SessionFactory};
use crate::config::FtpConfig;
use crate::error::RemoteError;
use crate::models::{EntryKind, RemoteEntry};
use crate::utils::basename;

/// h1,h2,h3,h4,p1,p2 in a 227 reply
static PASV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})").unwrap());

/// Opens one FTP control connection per call / FTP 会话工厂
pub struct FtpSessionFactory {
    config: FtpConfig,
    codec: NameCodec,
}

impl FtpSessionFactory {
    /// Fails on an unknown `encoding` label / 编码名无效时报错
    pub fn new(config: FtpConfig) -> Result<Self, RemoteError> {
        let codec = NameCodec::for_label(&config.encoding)?;
        Ok(Self { config, codec })
    }

    fn resolve(&self) -> Result<SocketAddr, RemoteError> {
        self.config
            .address
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e.to_string()))?
            .next()
            .ok_or_else(|| self.connect_error("address did not resolve".to_string()))
    }

    fn connect_error(&self, message: String) -> RemoteError {
        RemoteError::Connect {
            address: self.config.address.clone(),
            message,
        }
    }
}

impl SessionFactory for FtpSessionFactory {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let addr = self.resolve()?;

        let mut stream = FtpStream::connect_timeout(addr, self.config.connect_timeout())
            .map_err(|e| match classify(&e) {
                Failure::Timeout => RemoteError::Timeout(format!("connect {}", self.config.address)),
                _ => self.connect_error(e.to_string()),
            })?;

        // 控制连接读写超时，卡住的命令按单项失败处理
        let timeout = Some(self.config.operation_timeout());
        stream
            .get_ref()
            .set_read_timeout(timeout)
            .and_then(|_| stream.get_ref().set_write_timeout(timeout))
            .map_err(|e| self.connect_error(e.to_string()))?;

        stream
            .login(self.config.username.as_str(), self.config.password.as_str())
            .map_err(|e| self.connect_error(format!("login failed: {}", e)))?;

        tracing::debug!("FTP session opened to {}", self.config.address);
        Ok(Box::new(FtpSession {
            stream,
            codec: self.codec,
            connect_timeout: self.config.connect_timeout(),
            operation_timeout: self.config.operation_timeout(),
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        format!("ftp://{} ({})", self.config.address, self.codec.name())
    }
}

/// A logged-in FTP control connection / FTP 会话
///
/// Path arguments and listing bytes go through the configured codec. LIST and
/// NLST use a passive data connection opened here, bounded by the same
/// timeouts as the control connection.
pub struct FtpSession {
    stream: FtpStream,
    codec: NameCodec,
    connect_timeout: Duration,
    operation_timeout: Duration,
    closed: bool,
}

enum Reply {
    Accepted(Response),
    Rejected(Response),
}

impl FtpSession {
    /// Send `verb path` with the path in server encoding / 发送命令
    fn command(&mut self, verb: &str, path: &str, expected: &[Status]) -> Result<Reply, RemoteError> {
        let line = command_line(&self.codec, verb, path)?;
        let sent = match String::from_utf8(line) {
            Ok(text) => self.stream.custom_command(text, expected),
            Err(raw) => {
                // Not UTF-8: write the bytes, the empty command adds CRLF and reads the reply
                let mut socket = self.stream.get_ref();
                socket.write_all(raw.as_bytes()).map_err(|e| io_error(verb, path, e))?;
                self.stream.custom_command("", expected)
            }
        };
        match sent {
            Ok(response) => Ok(Reply::Accepted(response)),
            Err(FtpError::UnexpectedResponse(response)) => Ok(Reply::Rejected(response)),
            Err(e) => Err(command_error(verb, path, e)),
        }
    }

    /// Run LIST or NLST over a passive data connection, one raw line per entry
    fn transfer(&mut self, verb: &str, path: &str) -> Result<Vec<Vec<u8>>, RemoteError> {
        let pasv = self
            .stream
            .custom_command("PASV", &[Status::PassiveMode])
            .map_err(|e| command_error("PASV", path, e))?;
        let peer = self.stream.get_ref().peer_addr().ok().map(|addr| addr.ip());
        let addr = passive_address(&pasv.body, peer).ok_or_else(|| RemoteError::Command {
            command: format!("PASV {}", path),
            message: reply_text(&pasv.body),
        })?;

        let mut data = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| io_error(verb, path, e))?;
        data.set_read_timeout(Some(self.operation_timeout))
            .map_err(|e| io_error(verb, path, e))?;

        match self.command(verb, path, &[Status::AboutToSend, Status::AlreadyOpen])? {
            Reply::Accepted(_) => {}
            Reply::Rejected(response) => return Err(rejected(verb, path, &response)),
        }

        let mut raw = Vec::new();
        let read = data.read_to_end(&mut raw);
        // Closing the data connection first lets the server send 226
        let finished = self.stream.finalize_retr_stream(data);
        read.map_err(|e| io_error(verb, path, e))?;
        finished.map_err(|e| command_error(verb, path, e))?;

        Ok(split_lines(&raw).into_iter().map(<[u8]>::to_vec).collect())
    }

    /// Decode listing lines, skipping names the codec cannot carry
    fn decode_lines(&self, path: &str, lines: &[Vec<u8>]) -> Vec<String> {
        lines
            .iter()
            .filter_map(|line| match self.codec.decode(line) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!("Skipping entry in {}: {}", path, e);
                    None
                }
            })
            .collect()
    }
}

impl RemoteSession for FtpSession {
    fn change_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        match self.command("CWD", path, &[Status::RequestedFileActionOk])? {
            Reply::Accepted(_) => Ok(()),
            Reply::Rejected(response) => Err(rejected("CWD", path, &response)),
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let raw = self.transfer("LIST", path)?;
        let lines = self.decode_lines(path, &raw);
        if let Some(entries) = parse_listing(&lines) {
            return Ok(entries);
        }

        // Unknown LIST format: names only, the walker classifies them / 无法解析时退回 NLST
        tracing::debug!("Unparseable LIST output for {}, falling back to NLST", path);
        let raw = self.transfer("NLST", path)?;
        Ok(self
            .decode_lines(path, &raw)
            .iter()
            .map(|name| basename(name.trim()))
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(RemoteEntry::untyped)
            .collect())
    }

    fn size(&mut self, path: &str) -> Result<Option<u64>, RemoteError> {
        match self.command("SIZE", path, &[Status::File])? {
            Reply::Accepted(response) => {
                let text = reply_text(&response.body);
                text.parse::<u64>().map(Some).map_err(|_| RemoteError::Command {
                    command: format!("SIZE {}", path),
                    message: format!("malformed reply '{}'", text),
                })
            }
            // 550 等拒绝应答：文件不存在或路径无效
            Reply::Rejected(_) => Ok(None),
        }
    }

    fn modified_at(&mut self, path: &str) -> Result<String, RemoteError> {
        match self.command("MDTM", path, &[Status::File])? {
            Reply::Accepted(response) => {
                let token = reply_text(&response.body);
                if token.is_empty() {
                    return Err(RemoteError::Command {
                        command: format!("MDTM {}", path),
                        message: "empty reply".to_string(),
                    });
                }
                Ok(token)
            }
            Reply::Rejected(_) => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.quit() {
            tracing::debug!("FTP QUIT failed: {}", e);
        }
    }
}

/// `verb path` as sent on the wire, without CRLF / 命令行字节
fn command_line(codec: &NameCodec, verb: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
    let encoded = codec.encode(path)?;
    let mut line = Vec::with_capacity(verb.len() + 1 + encoded.len());
    line.extend_from_slice(verb.as_bytes());
    line.push(b' ');
    line.extend_from_slice(&encoded);
    Ok(line)
}

/// Text after the reply code on the first line, e.g. `20240101000000.123`
fn reply_text(body: &[u8]) -> String {
    let first = body.split(|b| *b == b'\n').next().unwrap_or_default();
    let rest = first.get(4..).unwrap_or_default();
    String::from_utf8_lossy(rest).trim().to_string()
}

/// Data address from a 227 reply; an unspecified host means the control peer
fn passive_address(body: &[u8], peer: Option<IpAddr>) -> Option<SocketAddr> {
    let text = String::from_utf8_lossy(body);
    let caps = PASV_RE.captures(&text)?;
    let mut parts = [0u8; 6];
    for (i, part) in parts.iter_mut().enumerate() {
        *part = caps.get(i + 1)?.as_str().parse().ok()?;
    }
    let host = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
    let port = u16::from(parts[4]) << 8 | u16::from(parts[5]);
    let ip = match peer {
        Some(peer) if host.is_unspecified() => peer,
        _ => IpAddr::V4(host),
    };
    Some(SocketAddr::new(ip, port))
}

fn split_lines(raw: &[u8]) -> Vec<&[u8]> {
    raw.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Parse LIST lines into typed entries; `None` if any line is not understood / 解析 LIST 输出
///
/// Symbolic links carry no reliable kind and are left untyped.
pub fn parse_listing(lines: &[String]) -> Option<Vec<RemoteEntry>> {
    let mut entries = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with("total ") {
            continue;
        }
        let entry = ListEntry::from_str(line).ok()?;
        let name = entry.name();
        if name == "." || name == ".." {
            continue;
        }
        let kind = if entry.is_symlink() {
            None
        } else if entry.is_directory() {
            Some(EntryKind::Directory)
        } else {
            Some(EntryKind::File)
        };
        entries.push(RemoteEntry { name: name.to_string(), kind });
    }
    Some(entries)
}

enum Failure {
    Timeout,
    Other,
}

fn classify(err: &FtpError) -> Failure {
    match err {
        FtpError::ConnectionError(io) if is_timeout(io) => Failure::Timeout,
        _ => Failure::Other,
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

fn command_error(command: &str, path: &str, err: FtpError) -> RemoteError {
    match classify(&err) {
        Failure::Timeout => RemoteError::Timeout(format!("{} {}", command, path)),
        Failure::Other => RemoteError::Command {
            command: format!("{} {}", command, path),
            message: err.to_string(),
        },
    }
}

fn io_error(command: &str, path: &str, err: std::io::Error) -> RemoteError {
    command_error(command, path, FtpError::ConnectionError(err))
}

fn rejected(command: &str, path: &str, response: &Response) -> RemoteError {
    RemoteError::Command {
        command: format!("{} {}", command, path),
        message: format!("{} {}", response.status.code(), reply_text(&response.body)),
    }
}
