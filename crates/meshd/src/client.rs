//! Blocking RESP client used to fetch keys from peer nodes

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use bytes::BytesMut;
use meshcache::{Error, PeerGetter};
use tracing::debug;

use crate::resp::Frame;

/// `PeerGetter` that asks another meshd node with `GET <group> <key>`
///
/// Opens one connection per fetch. Called from the lookup path, which runs on
/// the blocking pool, so plain std sockets are fine here.
pub struct RespPeer {
    addr: String,
    timeout: Duration,
}

impl RespPeer {
    /// Create a getter for the node listening on `addr`
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    fn fetch(&self, group: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        let addr = self
            .addr
            .to_socket_addrs()?
            .next()
            .with_context(|| format!("{} did not resolve", self.addr))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(&Frame::command(&["GET", group, key]).to_bytes())?;

        let mut buffer = BytesMut::with_capacity(4096);
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(reply) = Frame::decode(&mut buffer)? {
                return match reply {
                    Frame::Bulk(data) => Ok(data),
                    Frame::Null => bail!("{} not found on peer", key),
                    Frame::Error(msg) => Err(anyhow!(msg)),
                    other => bail!("unexpected reply {:?}", other),
                };
            }

            let n = stream.read(&mut chunk)?;
            if n == 0 {
                bail!("connection closed before reply");
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

impl PeerGetter for RespPeer {
    fn get(&self, group: &str, key: &str) -> meshcache::Result<Vec<u8>> {
        debug!(peer = %self.addr, group, key, "fetching from peer");
        self.fetch(group, key)
            .map_err(|e| Error::PeerFetch(format!("{}: {:#}", self.addr, e)))
    }
}
