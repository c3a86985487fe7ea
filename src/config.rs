use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context as _, Result};

fn listen_socket_addr(host: &str, port: &str) -> Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("failed to parse listen host: '{host}'"))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("failed to parse listen port: '{port}'"))?;
    Ok(SocketAddr::new(ip, port))
}

/// Settings consumed by the wire engine of each connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Protocol version used by responses which don't set one.
    pub version: String,
    /// Character encoding advertised for text bodies.
    pub charset: String,
    /// Upper bound on the number of bytes taken from the socket by a single receive.
    pub chunk_size: usize,
}

impl Default for ProtocolConfig {
    #[inline]
    fn default() -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            charset: "utf-8".to_string(),
            chunk_size: 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) addr: SocketAddr,
    pub(crate) root: PathBuf,
    pub(crate) backlog: u32,
    pub(crate) protocol: ProtocolConfig,
}

impl Config {
    #[inline]
    pub fn from_args() -> Result<Self> {
        Self::parse_args(std::env::args().skip(1))
    }

    /// Parse configuration from command-line arguments (without the program name).
    ///
    /// Unknown arguments are ignored.
    pub fn parse_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::<String>::into);

        let mut cfg = Self::default();
        let mut host = cfg.addr.ip().to_string();
        let mut port = cfg.addr.port().to_string();

        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .with_context(|| format!("missing argument value for {arg}"))
            };

            match arg.as_str() {
                "--host" => host = value()?,

                "--port" | "-p" => port = value()?,

                "--dir" | "--directory" | "--root" => cfg.root = PathBuf::from(value()?),

                "--backlog" => {
                    let backlog = value()?;
                    let Ok(backlog) = backlog.parse::<u32>() else {
                        bail!("invalid argument value for --backlog: '{backlog}'");
                    };
                    cfg.backlog = backlog;
                }

                "--http-version" => cfg.protocol.version = value()?,

                "--charset" => cfg.protocol.charset = value()?,

                "--chunk-size" => {
                    let size = value()?;
                    let Ok(size) = size.parse::<usize>() else {
                        bail!("invalid argument value for --chunk-size: '{size}'");
                    };
                    cfg.protocol.chunk_size = size;
                }

                _ => continue,
            }
        }

        cfg.addr = listen_socket_addr(&host, &port).context("invalid listen address")?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.protocol.chunk_size > 0, "--chunk-size must be positive");
        ensure!(!self.protocol.charset.is_empty(), "--charset must not be empty");
        ensure!(
            !self.protocol.version.is_empty() && !self.protocol.version.contains(char::is_whitespace),
            "invalid --http-version: '{}'",
            self.protocol.version
        );
        Ok(())
    }

    #[inline]
    pub fn listen_addr(&self) -> SocketAddr {
        self.addr
    }

    #[inline]
    pub fn document_root(&self) -> &Path {
        self.root.as_path()
    }

    #[inline]
    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    #[inline]
    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            root: PathBuf::from("public"),
            backlog: 5,
            protocol: ProtocolConfig::default(),
        }
    }
}
