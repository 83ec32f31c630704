//! NSS-format `SSLKEYLOGFILE` output, keyed by the connection's
//! ClientHello random.

use std::io::Write;
use std::sync::Mutex;

/// One of the six secrets an NSS keylog file can record. `Display` gives
/// the exact NSS keylog label text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLogLabel {
    ClientEarlyTrafficSecret,
    ClientHandshakeTrafficSecret,
    ServerHandshakeTrafficSecret,
    ClientTrafficSecret0,
    ServerTrafficSecret0,
    ExporterSecret,
}

impl KeyLogLabel {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClientEarlyTrafficSecret => "CLIENT_EARLY_TRAFFIC_SECRET",
            Self::ClientHandshakeTrafficSecret => "CLIENT_HANDSHAKE_TRAFFIC_SECRET",
            Self::ServerHandshakeTrafficSecret => "SERVER_HANDSHAKE_TRAFFIC_SECRET",
            Self::ClientTrafficSecret0 => "CLIENT_TRAFFIC_SECRET_0",
            Self::ServerTrafficSecret0 => "SERVER_TRAFFIC_SECRET_0",
            Self::ExporterSecret => "EXPORTER_SECRET",
        }
    }
}

/// A sink for derived secrets. The state machine calls `log` at each
/// derivation point, whether or not the caller has wired up anything
/// that does something with it.
pub trait KeyLog: Send + Sync {
    fn log(&self, label: KeyLogLabel, client_random: &[u8; 32], secret: &[u8]);
}

/// The default: logging is off unless a caller opts in.
pub struct NoKeyLog;

impl KeyLog for NoKeyLog {
    fn log(&self, _label: KeyLogLabel, _client_random: &[u8; 32], _secret: &[u8]) {}
}

/// Writes one NSS-format line (`LABEL <hex client_random> <hex secret>\n`)
/// per call, to whatever `Write` the caller supplies — typically a file
/// opened from `$SSLKEYLOGFILE`. Wrapped in a `Mutex` since `KeyLog` is
/// `Sync` but an arbitrary `Write` generally isn't safe to share without
/// one.
pub struct WriterKeyLog<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterKeyLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

impl<W: Write + Send> KeyLog for WriterKeyLog<W> {
    fn log(&self, label: KeyLogLabel, client_random: &[u8; 32], secret: &[u8]) {
        let line = format!("{} {} {}\n", label.as_str(), hex(client_random), hex(secret));
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.write_all(line.as_bytes());
            let _ = writer.flush();
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_one_nss_format_line() {
        let mut buf = Vec::new();
        {
            let log = WriterKeyLog::new(&mut buf);
            log.log(KeyLogLabel::ClientTrafficSecret0, &[0xaa; 32], &[0xbb; 4]);
        }
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line, format!("CLIENT_TRAFFIC_SECRET_0 {} bbbbbbbb\n", "aa".repeat(32)));
    }
}
