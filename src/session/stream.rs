//! Plain-TCP/TLS stream abstraction so the reader thread and the
//! outbound writer can treat both uniformly (spec §4.6 "tls?").

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};

use crate::error::{ConnectionError, Error, Result};
use crate::session::config::TlsMode;

pub struct OwnedTlsStream {
    conn: ClientConnection,
    stream: TcpStream,
}

impl Read for OwnedTlsStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        rustls::Stream::new(&mut self.conn, &mut self.stream).read(buf)
    }
}

impl Write for OwnedTlsStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        rustls::Stream::new(&mut self.conn, &mut self.stream).write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        rustls::Stream::new(&mut self.conn, &mut self.stream).flush()
    }
}

pub enum StreamType {
    Plain(TcpStream),
    Tls(OwnedTlsStream),
}

impl StreamType {
    pub fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = connect_with_timeout(host, port, timeout)?;
        Ok(StreamType::Plain(stream))
    }

    pub fn connect_tls(host: &str, port: u16, timeout: Duration, mode: &TlsMode) -> Result<Self> {
        let tcp = connect_with_timeout(host, port, timeout)?;
        let config = build_tls_config(mode)?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Connection(ConnectionError::Tls { message: format!("invalid server name '{host}'") }))?;
        let conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| Error::Connection(ConnectionError::Tls { message: e.to_string() }))?;
        Ok(StreamType::Tls(OwnedTlsStream { conn, stream: tcp }))
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let tcp = match self {
            StreamType::Plain(s) => s,
            StreamType::Tls(s) => &s.stream,
        };
        tcp.set_read_timeout(timeout).map_err(Error::from)
    }

    pub fn shutdown(&self) {
        let tcp = match self {
            StreamType::Plain(s) => s,
            StreamType::Tls(s) => &s.stream,
        };
        let _ = tcp.shutdown(std::net::Shutdown::Both);
    }
}

impl Read for StreamType {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            StreamType::Plain(s) => s.read(buf),
            StreamType::Tls(s) => s.read(buf),
        }
    }
}

impl Write for StreamType {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            StreamType::Plain(s) => s.write(buf),
            StreamType::Tls(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            StreamType::Plain(s) => s.flush(),
            StreamType::Tls(s) => s.flush(),
        }
    }
}

fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    use std::net::ToSocketAddrs;
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|_| Error::Connection(ConnectionError::DnsResolution { host: host.to_string() }))?
        .next()
        .ok_or_else(|| Error::Connection(ConnectionError::DnsResolution { host: host.to_string() }))?;
    TcpStream::connect_timeout(&addr, timeout).map_err(|e| match e.kind() {
        std::io::ErrorKind::TimedOut =>
            Error::Connection(ConnectionError::Timeout { host: host.to_string(), port, timeout_ms: timeout.as_millis() as u64 }),
        std::io::ErrorKind::ConnectionRefused =>
            Error::Connection(ConnectionError::Refused { host: host.to_string(), port }),
        _ => Error::Connection(ConnectionError::Closed { reason: e.to_string() }),
    })
}

/// Hand-rolled PEM certificate extraction: finds each
/// `-----BEGIN CERTIFICATE----- ... -----END CERTIFICATE-----` block and
/// base64-decodes its body, matching the teacher's CA-bundle loader
/// rather than pulling in a dedicated PEM-parsing crate.
fn load_pem_certificates(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    use base64::Engine;

    const MAX_BUNDLE_BYTES: u64 = 10_000_000;
    let metadata = std::fs::metadata(path)
        .map_err(|e| Error::Connection(ConnectionError::Tls { message: format!("reading {path}: {e}") }))?;
    if metadata.len() > MAX_BUNDLE_BYTES {
        return Err(Error::Connection(ConnectionError::Tls { message: "CA bundle too large".into() }));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Connection(ConnectionError::Tls { message: format!("reading {path}: {e}") }))?;

    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";
    let mut certs = Vec::new();
    let mut rest = text.as_str();
    while let Some(begin_idx) = rest.find(BEGIN) {
        let after_begin = &rest[begin_idx + BEGIN.len()..];
        let Some(end_idx) = after_begin.find(END) else { break };
        let body: String = after_begin[..end_idx].chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| Error::Connection(ConnectionError::Tls { message: format!("invalid PEM body: {e}") }))?;
        certs.push(rustls::pki_types::CertificateDer::from(der));
        rest = &after_begin[end_idx + END.len()..];
    }
    if certs.is_empty() {
        return Err(Error::Connection(ConnectionError::Tls { message: format!("no certificates found in {path}") }));
    }
    Ok(certs)
}

fn build_tls_config(mode: &TlsMode) -> Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    match mode {
        TlsMode::NativeRoots => {
            for cert in rustls_native_certs::load_native_certs()
                .map_err(|e| Error::Connection(ConnectionError::Tls { message: e.to_string() }))?
            {
                roots
                    .add(cert)
                    .map_err(|e| Error::Connection(ConnectionError::Tls { message: e.to_string() }))?;
            }
        }
        TlsMode::CaBundle(path) => {
            for cert in load_pem_certificates(path)? {
                roots
                    .add(cert)
                    .map_err(|e| Error::Connection(ConnectionError::Tls { message: e.to_string() }))?;
            }
        }
    }
    Ok(ClientConfig::builder().with_root_certificates(roots).with_no_client_auth())
}
