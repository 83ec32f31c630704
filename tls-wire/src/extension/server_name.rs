//! `server_name` (SNI) — [RFC 6066 §3](https://datatracker.ietf.org/doc/html/rfc6066#section-3).

use crate::codec::{read_opaque, read_u8, write_opaque, write_u8, LengthPrefix, Reader};
use crate::error::Result;

/// A `ServerNameList`, as sent by the client. In practice servers never
/// send this extension back, so only the client-hello shape exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNameList {
    pub names: Vec<ServerName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerName {
    HostName(String),
    /// A `NameType` this crate doesn't interpret, preserved as raw bytes.
    Unknown { name_type: u8, value: Vec<u8> },
}

impl ServerNameList {
    #[must_use]
    pub fn host_name(name: impl Into<String>) -> Self {
        Self { names: vec![ServerName::HostName(name.into())] }
    }

    /// The first `host_name` entry, if any. RFC 6066 permits a list but
    /// every deployed client sends exactly one entry of type `host_name`.
    #[must_use]
    pub fn primary_host_name(&self) -> Option<&str> {
        self.names.iter().find_map(|name| match name {
            ServerName::HostName(host) => Some(host.as_str()),
            ServerName::Unknown { .. } => None,
        })
    }

    pub(crate) fn read_from(c: &mut Reader<'_>) -> Result<Self> {
        let list_bytes = read_opaque(c, LengthPrefix::U16)?;
        let mut list_cursor = Reader::new(&list_bytes);
        let mut names = Vec::new();
        while (list_cursor.position() as usize) < list_bytes.len() {
            let name_type = read_u8(&mut list_cursor)?;
            let value = read_opaque(&mut list_cursor, LengthPrefix::U16)?;
            names.push(match name_type {
                0 => ServerName::HostName(String::from_utf8_lossy(&value).into_owned()),
                other => ServerName::Unknown { name_type: other, value },
            });
        }
        Ok(Self { names })
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        let mut list = Vec::new();
        for name in &self.names {
            match name {
                ServerName::HostName(host) => {
                    write_u8(&mut list, 0);
                    write_opaque(&mut list, LengthPrefix::U16, host.as_bytes()).unwrap();
                }
                ServerName::Unknown { name_type, value } => {
                    write_u8(&mut list, *name_type);
                    write_opaque(&mut list, LengthPrefix::U16, value).unwrap();
                }
            }
        }
        write_opaque(out, LengthPrefix::U16, &list).unwrap();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_a_host_name() {
        let sni = ServerNameList::host_name("example.com");
        let mut buf = Vec::new();
        sni.write_to(&mut buf);
        let decoded = ServerNameList::read_from(&mut Reader::new(&buf)).unwrap();
        assert_eq!(decoded, sni);
    }
}
