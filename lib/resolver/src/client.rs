use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::{ToSocketAddrs, UdpSocket, lookup_host};
use tracing::debug;

use crate::proto::{self, HEADER_SIZE, Message, Query, decode_message};

/// Maximum DNS packet size.
/// Value taken from https://dnsflagday.net/2020/.
const MAX_UDP_SIZE: usize = 1232;

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dial timeout after {0:?}")]
    DialTimeout(Duration),

    #[error("no usable address for nameserver")]
    NoAddress,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encode query failed, {0}")]
    Encode(proto::Error),

    #[error("decode response failed, {0}")]
    Decode(proto::Error),
}

/// A one-shot DNS over UDP client, every exchange uses a fresh socket.
#[derive(Clone, Debug)]
pub struct Client {
    local_addr: Option<IpAddr>,
    dial_timeout: Duration,
}

impl Default for Client {
    fn default() -> Self {
        Client {
            local_addr: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

impl Client {
    /// Bounds resolving, binding and connecting the socket, not the exchange.
    #[must_use]
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Send requests from this address, the port is picked by the OS.
    #[must_use]
    pub fn with_local_addr(mut self, addr: IpAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    #[inline]
    pub fn local_addr(&self) -> Option<IpAddr> {
        self.local_addr
    }

    #[inline]
    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    /// Send the query and wait for the matching response. Datagrams with a
    /// different id, or without the QR bit, are dropped.
    ///
    /// There is no deadline on the exchange itself, wrap the future with
    /// `tokio::time::timeout` and dropping it cancels the request.
    pub async fn exchange<A: ToSocketAddrs>(
        &self,
        query: &Query,
        addr: A,
    ) -> Result<(Message, Duration), Error> {
        let req = query.encode().map_err(Error::Encode)?;

        let socket = tokio::time::timeout(self.dial_timeout, self.dial(addr))
            .await
            .map_err(|_| Error::DialTimeout(self.dial_timeout))??;

        let start = Instant::now();
        socket.send(&req).await?;

        let mut buf = vec![0u8; MAX_UDP_SIZE];
        loop {
            let size = socket.recv(&mut buf).await?;
            let resp = &buf[..size];
            if resp.len() < HEADER_SIZE {
                return Err(Error::Decode(proto::Error::TooSmall));
            }

            let id = u16::from_be_bytes([resp[0], resp[1]]);
            let flags = u16::from_be_bytes([resp[2], resp[3]]);
            if id != query.id() || flags & (1 << 15) == 0 {
                debug!(
                    message = "drop unexpected datagram",
                    id,
                    expected = query.id(),
                    size
                );
                continue;
            }

            let rtt = start.elapsed();
            let msg = decode_message(resp).map_err(Error::Decode)?;

            return Ok((msg, rtt));
        }
    }

    async fn dial<A: ToSocketAddrs>(&self, addr: A) -> Result<UdpSocket, Error> {
        let target = lookup_host(addr)
            .await?
            .find(|addr| match self.local_addr {
                Some(local) => local.is_ipv4() == addr.is_ipv4(),
                None => true,
            })
            .ok_or(Error::NoAddress)?;

        let bind = match self.local_addr {
            Some(ip) => SocketAddr::new(ip, 0),
            None if target.is_ipv4() => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            None => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };

        let socket = UdpSocket::bind(bind).await?;
        socket.connect(target).await?;

        debug!(
            message = "udp socket connected",
            local = ?socket.local_addr().ok(),
            remote = %target
        );

        Ok(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{RecordClass, RecordData, RecordType};

    fn reply(req: &[u8], id: u16, answers: &[[u8; 4]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&0x8180u16.to_be_bytes());
        buf.extend_from_slice(&[0, 1]);
        buf.extend_from_slice(&(answers.len() as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&req[HEADER_SIZE..]);

        for ip in answers {
            buf.extend_from_slice(&[0xc0, 0x0c, 0, 1, 0, 1]);
            buf.extend_from_slice(&300u32.to_be_bytes());
            buf.extend_from_slice(&[0, 4]);
            buf.extend_from_slice(ip);
        }

        buf
    }

    async fn serve_once(
        socket: UdpSocket,
        respond: impl FnOnce(&[u8]) -> Vec<Vec<u8>>,
    ) -> SocketAddr {
        let mut buf = [0u8; 512];
        let (size, peer) = socket.recv_from(&mut buf).await.unwrap();
        for datagram in respond(&buf[..size]) {
            socket.send_to(&datagram, peer).await.unwrap();
        }

        peer
    }

    #[tokio::test]
    async fn exchange_a_record() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(serve_once(server, |req| {
            let id = u16::from_be_bytes([req[0], req[1]]);
            vec![reply(req, id, &[[1, 2, 3, 4]])]
        }));

        let query = Query::new("example.com", RecordType::A, RecordClass::INET)
            .recursion_desired(true);
        let (msg, _rtt) = Client::default().exchange(&query, addr).await.unwrap();
        handle.await.unwrap();

        assert_eq!(msg.header.id(), query.id());
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].ttl, 300);
        assert_eq!(
            msg.answers[0].data,
            RecordData::A(Ipv4Addr::new(1, 2, 3, 4))
        );
    }

    #[tokio::test]
    async fn mismatched_id_is_ignored() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(serve_once(server, |req| {
            let id = u16::from_be_bytes([req[0], req[1]]);
            vec![
                reply(req, id.wrapping_add(1), &[[9, 9, 9, 9]]),
                reply(req, id, &[[1, 2, 3, 4]]),
            ]
        }));

        let query = Query::new("example.com", RecordType::A, RecordClass::INET);
        let (msg, _rtt) = Client::default().exchange(&query, addr).await.unwrap();
        handle.await.unwrap();

        assert_eq!(
            msg.answers[0].data,
            RecordData::A(Ipv4Addr::new(1, 2, 3, 4))
        );
    }

    #[tokio::test]
    async fn short_datagram_is_decode_error() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(serve_once(server, |_req| vec![vec![0, 1, 2]]));

        let query = Query::new("example.com", RecordType::A, RecordClass::INET);
        let err = Client::default().exchange(&query, addr).await.unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, Error::Decode(proto::Error::TooSmall)), "{err:?}");
    }

    #[tokio::test]
    async fn bind_to_local_addr() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(serve_once(server, |req| {
            let id = u16::from_be_bytes([req[0], req[1]]);
            vec![reply(req, id, &[])]
        }));

        let client = Client::default().with_local_addr(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let query = Query::new("example.com", RecordType::A, RecordClass::INET);
        let (msg, _rtt) = client.exchange(&query, addr).await.unwrap();
        let peer = handle.await.unwrap();

        assert_eq!(peer.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(msg.answers.is_empty());
    }

    #[tokio::test]
    async fn local_addr_family_mismatch() {
        let client = Client::default().with_local_addr(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let query = Query::new("example.com", RecordType::A, RecordClass::INET);

        let err = client.exchange(&query, "[::1]:53").await.unwrap_err();
        assert!(matches!(err, Error::NoAddress), "{err:?}");
    }

    #[tokio::test]
    async fn invalid_query_is_not_sent() {
        let query = Query::new("foo..bar", RecordType::A, RecordClass::INET);
        let err = Client::default()
            .exchange(&query, "127.0.0.1:53")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Encode(proto::Error::EmptyLabel)), "{err:?}");
    }
}
