use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};

/// The type of the resource record
///
/// This specifies the type of data in the RData field of the Resource Record
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordType {
    // ResourceHeader.Type and Question.Type
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,

    // Question.Type
    WKS,
    HINFO,
    MINFO,
    AXFR,
    ALL,

    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            41 => RecordType::OPT,

            11 => RecordType::WKS,
            13 => RecordType::HINFO,
            14 => RecordType::MINFO,
            252 => RecordType::AXFR,
            255 => RecordType::ALL,

            _ => RecordType::Unknown(value),
        }
    }
}

impl RecordType {
    pub fn to_u16(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::OPT => 41,

            RecordType::WKS => 11,
            RecordType::HINFO => 13,
            RecordType::MINFO => 14,
            RecordType::AXFR => 252,
            RecordType::ALL => 255,

            RecordType::Unknown(value) => *value,
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordType::A => "A",
            RecordType::NS => "NS",
            RecordType::CNAME => "CNAME",
            RecordType::SOA => "SOA",
            RecordType::PTR => "PTR",
            RecordType::MX => "MX",
            RecordType::TXT => "TXT",
            RecordType::AAAA => "AAAA",
            RecordType::SRV => "SRV",
            RecordType::OPT => "OPT",
            RecordType::WKS => "WKS",
            RecordType::HINFO => "HINFO",
            RecordType::MINFO => "MINFO",
            RecordType::AXFR => "AXFR",
            RecordType::ALL => "ANY",
            // RFC 3597 section 5
            RecordType::Unknown(value) => return write!(f, "TYPE{value}"),
        };

        f.write_str(s)
    }
}

/// The DNS Record class
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordClass {
    /// Internet
    INET,
    CSNET,
    /// Chaos
    CHAOS,
    /// Hesiod
    HESIOD,
    /// QCLASS NONE
    NONE,
    /// QCLASS * (ANY)
    ANY,
    /// Special class for OPT Version, it was overloaded for EDNS - RFC 6891
    /// From the RFC: `Values lower than 512 MUST be treated as equal to 512`
    OPT(u16),
    /// Unknown DNSClass was parsed
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::INET,
            2 => RecordClass::CSNET,
            3 => RecordClass::CHAOS,
            4 => RecordClass::HESIOD,
            254 => RecordClass::NONE,
            255 => RecordClass::ANY,
            _ => RecordClass::Unknown(value),
        }
    }
}

impl RecordClass {
    pub fn to_u16(&self) -> u16 {
        match self {
            RecordClass::INET => 1,
            RecordClass::CSNET => 2,
            RecordClass::CHAOS => 3,
            RecordClass::HESIOD => 4,
            RecordClass::NONE => 254,
            RecordClass::ANY => 255,
            RecordClass::OPT(value) => *value,
            RecordClass::Unknown(unknown) => *unknown,
        }
    }
}

impl Display for RecordClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordClass::INET => f.write_str("IN"),
            RecordClass::CSNET => f.write_str("CS"),
            RecordClass::CHAOS => f.write_str("CH"),
            RecordClass::HESIOD => f.write_str("HS"),
            RecordClass::NONE => f.write_str("NONE"),
            RecordClass::ANY => f.write_str("ANY"),
            RecordClass::OPT(size) => write!(f, "UDP{size}"),
            RecordClass::Unknown(value) => write!(f, "CLASS{value}"),
        }
    }
}

/// An RCode is a DNS response status code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RCode {
    Success,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,

    /// An unknown or unregistered response code was received.
    ///
    /// 24-3840      Unassigned
    /// 3841-4095    Reserved for Private Use                        [RFC6895]
    /// 4096-65534   Unassigned
    /// 65535        Reserved, can be allocated by Standards Action  [RFC6895]
    Unknown(u16),
}

impl From<u16> for RCode {
    fn from(value: u16) -> Self {
        match value {
            0 => RCode::Success,
            1 => RCode::FormatError,
            2 => RCode::ServerFailure,
            3 => RCode::NameError,
            4 => RCode::NotImplemented,
            5 => RCode::Refused,
            _ => RCode::Unknown(value),
        }
    }
}

impl RCode {
    pub fn to_u16(&self) -> u16 {
        match self {
            RCode::Success => 0,
            RCode::FormatError => 1,
            RCode::ServerFailure => 2,
            RCode::NameError => 3,
            RCode::NotImplemented => 4,
            RCode::Refused => 5,
            RCode::Unknown(value) => *value,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RCode::Success => "Success",
            RCode::FormatError => "FormatError",
            RCode::ServerFailure => "ServerFailure",
            RCode::NameError => "NameError",
            RCode::NotImplemented => "NotImplemented",
            RCode::Refused => "Refused",
            RCode::Unknown(_) => "Unknown",
        }
    }
}

impl Display for RCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const FLAG_RESPONSE: u16 = 1 << 15;
const FLAG_RECURSION_DESIRED: u16 = 1 << 8;

#[derive(Clone, Debug, Default)]
pub struct Header {
    pub id: u16,
    pub flags: u16,

    pub questions: u16,
    pub answers: u16,
    pub authorities: u16,
    pub additionals: u16,
}

impl Header {
    /// A 16 bit identifier assigned by the program that generates any kind of query.
    /// This identifier is copied the corresponding reply and can be used by the requester
    /// to match up replies to outstanding queries.
    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Authoritative Answer, valid in responses.
    #[inline]
    pub fn authoritative(&self) -> bool {
        self.flags & (1 << 10) != 0
    }

    /// Message was truncated due to length greater than that permitted on the
    /// transmission channel.
    #[inline]
    pub fn truncated(&self) -> bool {
        (self.flags & (1 << 9)) != 0
    }

    #[inline]
    pub fn recursion_desired(&self) -> bool {
        (self.flags & FLAG_RECURSION_DESIRED) != 0
    }

    /// Response code - this 4 bit field is set as part of responses.
    #[inline]
    pub fn response_code(&self) -> RCode {
        RCode::from(self.flags & 0xF)
    }

    /// `QR` A one bit field that specifies whether this message is a query(0) or
    /// response(1)
    #[inline]
    pub fn response(&self) -> bool {
        (self.flags & FLAG_RESPONSE) != 0
    }
}

pub(crate) const HEADER_SIZE: usize = 12;

/// Query struct for looking up resource records, basically a resource record without RDATA.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Question {
    pub name: Vec<u8>,
    pub typ: RecordType,
    pub class: RecordClass,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordData {
    NoData,

    A(Ipv4Addr),
    NS(Vec<u8>),
    CNAME(Vec<u8>),
    SOA {
        ns: Vec<u8>,
        mbox: Vec<u8>,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,

        // RFC 2308 Section 4
        min_ttl: u32,
    },
    PTR(Vec<u8>),
    MX {
        /// Lower values are preferred
        preference: u16,
        exchange: Vec<u8>,
    },
    TXT(Vec<Vec<u8>>),
    AAAA(Ipv6Addr),
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        /// A target of "." means that the service is decidedly not available at
        /// this domain.
        target: Vec<u8>,
    },
    OPT(Vec<Opt>),

    Unknown {
        typ: RecordType,
        data: Vec<u8>,
    },
}

impl Display for RecordData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordData::NoData => Ok(()),
            RecordData::A(addr) => Display::fmt(addr, f),
            RecordData::AAAA(addr) => Display::fmt(addr, f),
            RecordData::NS(name) | RecordData::CNAME(name) | RecordData::PTR(name) => {
                f.write_str(&String::from_utf8_lossy(name))
            }
            RecordData::SOA {
                ns,
                mbox,
                serial,
                refresh,
                retry,
                expire,
                min_ttl,
            } => write!(
                f,
                "{} {} {serial} {refresh} {retry} {expire} {min_ttl}",
                String::from_utf8_lossy(ns),
                String::from_utf8_lossy(mbox),
            ),
            RecordData::MX {
                preference,
                exchange,
            } => write!(f, "{preference} {}", String::from_utf8_lossy(exchange)),
            RecordData::TXT(fields) => {
                for (index, field) in fields.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }

                    write!(f, "{:?}", String::from_utf8_lossy(field))?;
                }

                Ok(())
            }
            RecordData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(
                f,
                "{priority} {weight} {port} {}",
                String::from_utf8_lossy(target)
            ),
            RecordData::OPT(options) => {
                for (index, opt) in options.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }

                    write!(f, "{}:", opt.code)?;
                    write_hex(f, &opt.data)?;
                }

                Ok(())
            }
            // RFC 3597 section 5, generic rdata encoding
            RecordData::Unknown { data, .. } => {
                write!(f, "\\# {} ", data.len())?;
                write_hex(f, data)
            }
        }
    }
}

fn write_hex(f: &mut Formatter<'_>, data: &[u8]) -> std::fmt::Result {
    for b in data {
        write!(f, "{b:02x}")?;
    }

    Ok(())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Opt {
    pub code: u16,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub name: Vec<u8>,
    pub typ: RecordType,
    pub class: RecordClass,
    pub ttl: u32,
    pub data: RecordData,
}

/// Presentation format, the same layout `dig` prints in its answer section.
impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            String::from_utf8_lossy(&self.name),
            self.ttl,
            self.class,
            self.typ,
            self.data
        )
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub header: Header,

    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("buffer is too small")]
    TooSmall,

    #[error("too many compression pointers")]
    TooManyCompressionPointers,

    #[error("invalid record data")]
    InvalidRecordData,

    #[error("domain name exceeded 255 wire-format octets")]
    LongDomain,

    #[error("label exceeded 63 octets")]
    LongLabel,

    #[error("empty label in domain name")]
    EmptyLabel,
}

/// See RFC 1035 section 2.3.4
const MAX_DOMAIN_NAME_WIRE_OCTETS: usize = 255;
const MAX_LABEL_OCTETS: usize = 63;

/// This is the maximum number of compression pointers that should occur in a
/// semantically valid message. Each label in a domain name must be at least one
/// octet and is separated by a period.
const MAX_COMPRESSION_POINTERS: usize = 10;

/// Returns the name with a trailing dot appended if it is not already there.
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        return name.to_string();
    }

    format!("{name}.")
}

/// A single question query, the only kind of message this crate sends.
#[derive(Clone, Debug)]
pub struct Query {
    id: u16,
    flags: u16,
    question: Question,
}

impl Query {
    /// Build a query with a fresh random transaction id. The name is made
    /// fully-qualified.
    pub fn new(name: &str, typ: RecordType, class: RecordClass) -> Self {
        Query {
            id: rand::random::<u16>(),
            flags: 0,
            question: Question {
                name: fqdn(name).into_bytes(),
                typ,
                class,
            },
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn recursion_desired(mut self, desired: bool) -> Self {
        if desired {
            self.flags |= FLAG_RECURSION_DESIRED;
        } else {
            self.flags &= !FLAG_RECURSION_DESIRED;
        }
        self
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    #[inline]
    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.question.name.len() + 5);

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        // qdcount, ancount, nscount, arcount
        buf.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);

        encode_name(&self.question.name, &mut buf)?;

        buf.extend_from_slice(&self.question.typ.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.question.class.to_u16().to_be_bytes());

        Ok(buf)
    }
}

fn encode_name(name: &[u8], buf: &mut Vec<u8>) -> Result<(), Error> {
    let start = buf.len();

    let name = name.strip_suffix(b".").unwrap_or(name);
    if !name.is_empty() {
        for label in name.split(|ch| *ch == b'.') {
            if label.is_empty() {
                return Err(Error::EmptyLabel);
            }
            if label.len() > MAX_LABEL_OCTETS {
                return Err(Error::LongLabel);
            }

            buf.push(label.len() as u8);
            buf.extend_from_slice(label);
        }
    }

    // root label
    buf.push(0);

    if buf.len() - start > MAX_DOMAIN_NAME_WIRE_OCTETS {
        return Err(Error::LongDomain);
    }

    Ok(())
}

#[inline]
fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16, Error> {
    let bytes = buf.get(*pos..*pos + 2).ok_or(Error::TooSmall)?;
    *pos += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32, Error> {
    let bytes = buf.get(*pos..*pos + 4).ok_or(Error::TooSmall)?;
    *pos += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
fn read_slice<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], Error> {
    let bytes = buf.get(*pos..*pos + len).ok_or(Error::TooSmall)?;
    *pos += len;
    Ok(bytes)
}

fn decode_name(buf: &[u8], start: &mut usize) -> Result<Vec<u8>, Error> {
    let mut name = Vec::<u8>::with_capacity(32);

    let mut pointers = 0;
    let mut pos = *start;
    loop {
        let len = *buf.get(pos).ok_or(Error::TooSmall)? as usize;
        pos += 1;

        match len & 0xc0 {
            0x00 => {
                if len == 0 {
                    break;
                }

                // +1 for the label separator
                if name.len() + len + 1 > MAX_DOMAIN_NAME_WIRE_OCTETS {
                    return Err(Error::LongDomain);
                }

                let label = read_slice(buf, &mut pos, len)?;
                name.extend_from_slice(label);
                name.push(b'.');
            }
            0xc0 => {
                let low = *buf.get(pos).ok_or(Error::TooSmall)? as usize;

                if pointers == 0 {
                    *start = pos + 1;
                }

                pointers += 1;
                if pointers > MAX_COMPRESSION_POINTERS {
                    return Err(Error::TooManyCompressionPointers);
                }

                pos = ((len ^ 0xc0) << 8) | low;
            }
            _ => {
                // 0x80 and 0x40 are reserved
                return Err(Error::InvalidRecordData);
            }
        }
    }

    if name.is_empty() {
        name.push(b'.');
    }

    if pointers == 0 {
        *start = pos;
    }

    Ok(name)
}

pub fn decode_message(buf: &[u8]) -> Result<Message, Error> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::TooSmall);
    }

    let mut pos = 0;
    let header = Header {
        id: read_u16(buf, &mut pos)?,
        flags: read_u16(buf, &mut pos)?,
        questions: read_u16(buf, &mut pos)?,
        answers: read_u16(buf, &mut pos)?,
        authorities: read_u16(buf, &mut pos)?,
        additionals: read_u16(buf, &mut pos)?,
    };

    // every question takes at least 5 octets, so the count is bounded by the
    // buffer, not by what the header claims.
    let mut questions = Vec::with_capacity((header.questions as usize).min(buf.len() / 5));
    for _ in 0..header.questions {
        let name = decode_name(buf, &mut pos)?;
        let typ = RecordType::from(read_u16(buf, &mut pos)?);
        let class = RecordClass::from(read_u16(buf, &mut pos)?);

        questions.push(Question { name, typ, class });
    }

    let answers = decode_records(header.answers, buf, &mut pos)?;
    let authorities = decode_records(header.authorities, buf, &mut pos)?;
    let additionals = decode_records(header.additionals, buf, &mut pos)?;

    Ok(Message {
        header,
        questions,
        answers,
        authorities,
        additionals,
    })
}

fn decode_records(count: u16, buf: &[u8], pos: &mut usize) -> Result<Vec<Record>, Error> {
    // 11 octets is the smallest possible resource record
    let mut records = Vec::with_capacity((count as usize).min(buf.len() / 11));

    for _ in 0..count {
        let name = decode_name(buf, pos)?;
        let typ = RecordType::from(read_u16(buf, pos)?);
        let value = read_u16(buf, pos)?;
        let class = if typ == RecordType::OPT {
            RecordClass::OPT(value)
        } else {
            RecordClass::from(value)
        };
        let ttl = read_u32(buf, pos)?;
        let rdlen = read_u16(buf, pos)? as usize;

        let reloc = *pos + rdlen;
        if reloc > buf.len() {
            return Err(Error::TooSmall);
        }

        // an address record always carries its address
        let data = if rdlen == 0 && !matches!(typ, RecordType::A | RecordType::AAAA) {
            RecordData::NoData
        } else {
            decode_record_data(typ, buf, pos, reloc)?
        };

        *pos = reloc;

        records.push(Record {
            name,
            typ,
            class,
            ttl,
            data,
        });
    }

    Ok(records)
}

/// `reloc` is the end of this record's rdata, already checked against `buf`.
fn decode_record_data(
    typ: RecordType,
    buf: &[u8],
    pos: &mut usize,
    reloc: usize,
) -> Result<RecordData, Error> {
    let rdata = &buf[..reloc];

    let data = match typ {
        RecordType::A => {
            if reloc - *pos != 4 {
                return Err(Error::InvalidRecordData);
            }

            let b = read_slice(rdata, pos, 4)?;
            RecordData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
        }
        RecordType::AAAA => {
            if reloc - *pos != 16 {
                return Err(Error::InvalidRecordData);
            }

            let mut octets = [0u8; 16];
            octets.copy_from_slice(read_slice(rdata, pos, 16)?);
            RecordData::AAAA(Ipv6Addr::from(octets))
        }
        RecordType::NS => RecordData::NS(decode_name(buf, pos)?),
        RecordType::CNAME => RecordData::CNAME(decode_name(buf, pos)?),
        RecordType::PTR => RecordData::PTR(decode_name(buf, pos)?),
        RecordType::SOA => {
            let ns = decode_name(buf, pos)?;
            let mbox = decode_name(buf, pos)?;

            RecordData::SOA {
                ns,
                mbox,
                serial: read_u32(rdata, pos)?,
                refresh: read_u32(rdata, pos)?,
                retry: read_u32(rdata, pos)?,
                expire: read_u32(rdata, pos)?,
                min_ttl: read_u32(rdata, pos)?,
            }
        }
        RecordType::MX => {
            let preference = read_u16(rdata, pos)?;

            RecordData::MX {
                preference,
                exchange: decode_name(buf, pos)?,
            }
        }
        RecordType::TXT => {
            let mut fields = Vec::new();
            while *pos < reloc {
                let len = read_slice(rdata, pos, 1)?[0] as usize;
                fields.push(read_slice(rdata, pos, len)?.to_vec());
            }

            RecordData::TXT(fields)
        }
        RecordType::SRV => {
            let priority = read_u16(rdata, pos)?;
            let weight = read_u16(rdata, pos)?;
            let port = read_u16(rdata, pos)?;

            RecordData::SRV {
                priority,
                weight,
                port,
                // name compression is not to be used for this field.
                target: decode_name(buf, pos)?,
            }
        }
        RecordType::OPT => {
            let mut options = Vec::new();
            while *pos < reloc {
                let code = read_u16(rdata, pos)?;
                let len = read_u16(rdata, pos)? as usize;
                let data = read_slice(rdata, pos, len)?.to_vec();

                options.push(Opt { code, data });
            }

            RecordData::OPT(options)
        }
        _ => RecordData::Unknown {
            typ,
            data: buf[*pos..reloc].to_vec(),
        },
    };

    Ok(data)
}
