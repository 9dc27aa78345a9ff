//! TCP connection setup.
//!
//! Resolves the host, tries every resolved address in order and applies the
//! socket policy from [`SessionConfig`]: `TCP_NODELAY` and read/write
//! deadlines. A deadline that fires surfaces as a fatal I/O error in the
//! frame transport.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};

use crate::config::SessionConfig;
use crate::error::Result;

/// Open a TCP connection to `host:port` and configure it.
pub fn connect(host: &str, port: u16, config: &SessionConfig) -> Result<TcpStream> {
    let addrs = (host, port).to_socket_addrs()?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                tracing::debug!(%addr, "tcp connected");
                configure(&stream, config)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "tcp connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("could not resolve {host}:{port}"),
            )
        })
        .into())
}

fn configure(stream: &TcpStream, config: &SessionConfig) -> Result<()> {
    stream.set_nodelay(config.nodelay)?;
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;
    Ok(())
}
