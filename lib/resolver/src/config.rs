//! Read system DNS config from /etc/resolv.conf

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;

/// Well-known DNS port, resolv.conf has no way to override it.
pub const DEFAULT_PORT: u16 = 53;

/// The nameservers listed in a resolv.conf(5) file, every other keyword is
/// ignored.
#[derive(Debug, PartialEq)]
pub struct Config {
    /// server addresses, in file order
    pub servers: Vec<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            servers: default_nameservers(),
        }
    }
}

/// default name servers to use in the absence of DNS configurations
fn default_nameservers() -> Vec<SocketAddr> {
    vec![
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
        SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), DEFAULT_PORT),
    ]
}

impl Config {
    /// Read and parse a resolv.conf(5) file. A missing or unreadable file is an
    /// error, an empty one is not.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Config> {
        let content = std::fs::read_to_string(path)?;

        Ok(Config::parse(&content))
    }

    /// The first configured nameserver, what a single-shot client should talk to.
    pub fn first_server(&self) -> Option<SocketAddr> {
        self.servers.first().copied()
    }

    pub fn parse(content: &str) -> Config {
        let mut servers = vec![];

        for line in content.lines() {
            let Some(mut fields) = line
                .split([';', '#'])
                .next()
                .map(|line| line.split_ascii_whitespace())
            else {
                continue;
            };

            if fields.next() != Some("nameserver") {
                continue;
            }

            // Only IP literals, anything else would need DNS to look it up
            if let Some(ip) = fields.next().and_then(|field| field.parse::<IpAddr>().ok()) {
                servers.push(SocketAddr::new(ip, DEFAULT_PORT));
            }
        }

        if servers.is_empty() {
            return Config::default();
        }

        Config { servers }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn servers(addrs: &[&str]) -> Config {
        Config {
            servers: addrs.iter().map(|addr| addr.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn parse_config() {
        for (content, expected) in [
            (
                "# /etc/resolv.conf\n\
                 \n\
                 domain localdomain\n\
                 nameserver 8.8.8.8\n\
                 nameserver 2001:4860:4860::8888\n\
                 nameserver fe80::1%lo0\n\
                 options ndots:5 timeout:10 attempts:3 rotate\n",
                servers(&["8.8.8.8:53", "[2001:4860:4860::8888]:53"]),
            ),
            (
                "search test invalid\nnameserver 8.8.8.8\n",
                servers(&["8.8.8.8:53"]),
            ),
            ("", Config::default()),
            ("# nameserver 8.8.8.8\n", Config::default()),
            (
                "nameserver 169.254.169.254 ; metadata\nnameserver 10.240.0.1\nsearch c.example.internal\nlookup file bind\n",
                servers(&["169.254.169.254:53", "10.240.0.1:53"]),
            ),
            ("nameserver dns.example.com\n", Config::default()),
            ("nameserver\n", Config::default()),
            ("  nameserver\t192.0.2.1  \n", servers(&["192.0.2.1:53"])),
        ] {
            assert_eq!(Config::parse(content), expected, "content: {content:?}");
        }
    }

    #[test]
    fn first_server() {
        assert_eq!(
            Config::parse("nameserver 192.0.2.2\nnameserver 192.0.2.1\n").first_server(),
            Some("192.0.2.2:53".parse().unwrap())
        );
        assert_eq!(
            Config::parse("").first_server(),
            Some("127.0.0.1:53".parse().unwrap())
        );
        assert_eq!(Config { servers: vec![] }.first_server(), None);
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("resolv-{}.conf", rand::random::<u32>()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"nameserver 192.0.2.53\nnameserver 192.0.2.54\n")
            .unwrap();
        drop(file);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.first_server(), Some("192.0.2.53:53".parse().unwrap()));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn none_exist_file() {
        let err = Config::load("a-non-existent-file").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
