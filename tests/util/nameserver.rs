use std::net::{SocketAddr, UdpSocket};
use std::thread::JoinHandle;
use std::time::Duration;

/// What the mock saw, the raw query and where it came from.
pub struct Received {
    pub request: Vec<u8>,
    pub peer: SocketAddr,
}

/// A nameserver answering exactly one query on a background thread, so it
/// works for async tests and for tests running the binary alike.
pub struct MockNameserver {
    addr: SocketAddr,
    handle: JoinHandle<Received>,
}

impl MockNameserver {
    /// `respond` builds the reply from the raw query, `None` never answers.
    pub fn start<F>(respond: F) -> MockNameserver
    where
        F: FnOnce(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind mock nameserver");
        socket
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("set read timeout");
        let addr = socket.local_addr().expect("local addr of mock nameserver");

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 512];
            let (size, peer) = socket.recv_from(&mut buf).expect("receive query");
            let request = buf[..size].to_vec();

            if let Some(reply) = respond(&request) {
                socket.send_to(&reply, peer).expect("send reply");
            }

            Received { request, peer }
        });

        MockNameserver { addr, handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn join(self) -> Received {
        self.handle.join().expect("mock nameserver panicked")
    }
}

/// Build a reply to `request` with the given rcode and answers, each answer
/// is `(type, ttl, rdata)` and owned by the question name.
pub fn response(request: &[u8], rcode: u16, answers: &[(u16, u32, Vec<u8>)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512);

    // id
    buf.extend_from_slice(&request[..2]);
    // QR, RD copied from the query, RA
    let flags = 0x8000 | (u16::from(request[2] & 0x01) << 8) | 0x0080 | (rcode & 0xF);
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&[0, 1]);
    buf.extend_from_slice(&(answers.len() as u16).to_be_bytes());
    buf.extend_from_slice(&[0, 0, 0, 0]);
    // question section, verbatim
    buf.extend_from_slice(&request[12..]);

    for (typ, ttl, rdata) in answers {
        // pointer to the question name
        buf.extend_from_slice(&[0xc0, 0x0c]);
        buf.extend_from_slice(&typ.to_be_bytes());
        buf.extend_from_slice(&[0, 1]);
        buf.extend_from_slice(&ttl.to_be_bytes());
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(rdata);
    }

    buf
}
