//! TCP/TLS transport to the host
//!
//! Provides an ordered byte stream with no framing: connect, timed
//! reads, writes, and idempotent shutdown. TLS is optional and carries
//! two knobs: a verification mode and a security level that sets the
//! minimum protocol version. Lowering the floor never happens
//! automatically; it requires explicit configuration.

use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};
use native_tls::{Certificate, Protocol, TlsConnector};

use crate::error::{TransportError, TransportResult};

/// Certificate verification mode for TLS connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VerifyMode {
    /// No verification at all
    None,
    /// Verify the certificate chain but not the hostname
    Cert,
    /// Full verification
    Hostname,
}

impl VerifyMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "cert" => Some(Self::Cert),
            "hostname" => Some(Self::Hostname),
            _ => None,
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub use_tls: bool,
    pub verify: VerifyMode,
    /// TLS protocol floor: 0 accepts SSL 3.0, 1 accepts TLS 1.0,
    /// 2 requires TLS 1.2
    pub seclevel: u8,
    /// Optional PEM or DER bundle of additional trusted CAs
    pub ca_bundle_path: Option<String>,
    pub connect_timeout: Duration,
    /// Poll granularity for `read`; expiry is reported as zero bytes
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            use_tls: true,
            verify: VerifyMode::Hostname,
            seclevel: 2,
            ca_bundle_path: None,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Default port for the chosen transport
pub fn default_port(use_tls: bool) -> u16 {
    if use_tls {
        992
    } else {
        23
    }
}

// helper trait alias for objects that implement both Read and Write
trait ReadWrite: Read + Write {}
impl<T: Read + Write> ReadWrite for T {}

type DynStream = Box<dyn ReadWrite + Send>;

/// A connection to the host, optionally TLS-wrapped
pub struct HostConnection {
    stream: Option<DynStream>,
    /// Clone of the TCP socket, kept for shutdown
    socket: Option<TcpStream>,
    host: String,
    port: u16,
}

impl std::fmt::Debug for HostConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

impl HostConnection {
    /// Establish the connection, wrapping with TLS when configured
    pub fn connect(host: &str, port: u16, config: &TransportConfig) -> TransportResult<Self> {
        let address = format!("{host}:{port}");
        let addr: SocketAddr = address
            .to_socket_addrs()
            .map_err(|e| TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                reason: "no addresses resolved".to_string(),
            })?;

        let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| {
            TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();
        tcp.set_read_timeout(Some(config.read_timeout))?;
        let socket = tcp.try_clone().ok();

        let stream: DynStream = if config.use_tls {
            let connector = build_tls_connector(config)?;
            let tls = connector
                .connect(host, tcp)
                .map_err(|e| TransportError::Tls { reason: e.to_string() })?;
            info!("TLS connection established to {host}:{port}");
            Box::new(tls)
        } else {
            info!("plain connection established to {host}:{port}");
            Box::new(tcp)
        };

        Ok(Self {
            stream: Some(stream),
            socket,
            host: host.to_string(),
            port,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn peer(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Read available bytes
    ///
    /// Returns `Ok(0)` when the read timeout expired with nothing to
    /// deliver; a closed peer is an error.
    pub fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        match stream.read(buf) {
            Ok(0) => {
                self.close();
                Err(TransportError::Closed)
            }
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(e) => {
                self.close();
                Err(TransportError::from(e))
            }
        }
    }

    pub fn write_all(&mut self, data: &[u8]) -> TransportResult<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(data)?;
        stream.flush()?;
        debug!("sent {} byte(s)", data.len());
        Ok(())
    }

    /// Close the connection; safe to call repeatedly
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.shutdown(std::net::Shutdown::Both).ok();
        }
        self.stream = None;
    }
}

/// Build a TLS connector honoring the security level, verification
/// mode, and optional CA bundle
fn build_tls_connector(config: &TransportConfig) -> TransportResult<TlsConnector> {
    let mut builder = TlsConnector::builder();

    let floor = match config.seclevel {
        0 => Protocol::Sslv3,
        1 => Protocol::Tlsv10,
        _ => Protocol::Tlsv12,
    };
    builder.min_protocol_version(Some(floor));

    match config.verify {
        VerifyMode::None => {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        VerifyMode::Cert => {
            builder.danger_accept_invalid_hostnames(true);
        }
        VerifyMode::Hostname => {}
    }

    if let Some(path) = &config.ca_bundle_path {
        let bytes = fs::read(path).map_err(|e| TransportError::Tls {
            reason: format!("CA bundle {path}: {e}"),
        })?;
        let mut added = 0;
        if let Ok(cert) = Certificate::from_der(&bytes) {
            builder.add_root_certificate(cert);
            added += 1;
        } else if let Ok(text) = String::from_utf8(bytes) {
            // a PEM bundle may hold several certificates
            const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
            const END: &str = "-----END CERTIFICATE-----";
            let mut rest = text.as_str();
            while let (Some(start), Some(stop)) = (rest.find(BEGIN), rest.find(END)) {
                let block = &rest[start..stop + END.len()];
                if let Ok(cert) = Certificate::from_pem(block.as_bytes()) {
                    builder.add_root_certificate(cert);
                    added += 1;
                }
                rest = &rest[stop + END.len()..];
            }
        }
        if added == 0 {
            return Err(TransportError::Tls {
                reason: format!("no certificates found in {path}"),
            });
        }
        debug!("loaded {added} CA certificate(s) from {path}");
    }

    builder
        .build()
        .map_err(|e| TransportError::Tls { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_default_ports() {
        assert_eq!(default_port(true), 992);
        assert_eq!(default_port(false), 23);
    }

    #[test]
    fn test_verify_mode_parsing() {
        assert_eq!(VerifyMode::from_name("none"), Some(VerifyMode::None));
        assert_eq!(VerifyMode::from_name("CERT"), Some(VerifyMode::Cert));
        assert_eq!(VerifyMode::from_name("hostname"), Some(VerifyMode::Hostname));
        assert_eq!(VerifyMode::from_name("full"), None);
    }

    #[test]
    fn test_plain_connect_and_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(&buf).unwrap();
        });

        let config = TransportConfig {
            use_tls: false,
            read_timeout: Duration::from_millis(500),
            ..TransportConfig::default()
        };
        let mut conn = HostConnection::connect("127.0.0.1", port, &config).unwrap();
        assert!(conn.is_connected());
        conn.write_all(b"ping").unwrap();
        let mut buf = [0u8; 16];
        let mut got = 0;
        while got < 4 {
            got += conn.read(&mut buf[got..]).unwrap();
        }
        assert_eq!(&buf[..4], b"ping");
        server.join().unwrap();

        conn.close();
        conn.close(); // idempotent
        assert!(!conn.is_connected());
        assert!(matches!(conn.read(&mut buf), Err(TransportError::Closed)));
    }

    #[test]
    fn test_read_timeout_yields_zero() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let _guard = std::thread::spawn(move || listener.accept());

        let config = TransportConfig {
            use_tls: false,
            read_timeout: Duration::from_millis(50),
            ..TransportConfig::default()
        };
        let mut conn = HostConnection::connect("127.0.0.1", port, &config).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(conn.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_connect_refused() {
        let config = TransportConfig {
            use_tls: false,
            connect_timeout: Duration::from_millis(500),
            ..TransportConfig::default()
        };
        // a port nothing listens on
        let result = HostConnection::connect("127.0.0.1", 1, &config);
        assert!(matches!(result, Err(TransportError::ConnectionFailed { .. })));
    }
}
