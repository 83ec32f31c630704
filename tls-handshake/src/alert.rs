//! The TLS alert protocol (RFC 8446 §6): a 2-byte `{level, description}`
//! message carried as `ContentType::Alert` records.

use tls_wire::codec::{read_u8, write_u8, Reader};
use tls_wire::error::Result as CodecResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl From<u8> for AlertLevel {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Warning,
            2 => Self::Fatal,
            other => Self::Unknown(other),
        }
    }
}

impl From<AlertLevel> for u8 {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => value,
        }
    }
}

/// The alert descriptions this crate can emit or must recognise on
/// receipt (RFC 8446 §6.2). Alerts this implementation never sends but
/// might receive from a peer still decode to a named variant — the
/// taxonomy is closed over the RFC registry, not over "things we emit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    InappropriateFallback,
    UserCanceled,
    MissingExtension,
    UnsupportedExtension,
    CertificateRequired,
    NoApplicationProtocol,
    Unknown(u8),
}

impl From<u8> for AlertDescription {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::CloseNotify,
            10 => Self::UnexpectedMessage,
            20 => Self::BadRecordMac,
            22 => Self::RecordOverflow,
            40 => Self::HandshakeFailure,
            42 => Self::BadCertificate,
            43 => Self::UnsupportedCertificate,
            44 => Self::CertificateRevoked,
            45 => Self::CertificateExpired,
            46 => Self::CertificateUnknown,
            47 => Self::IllegalParameter,
            48 => Self::UnknownCa,
            49 => Self::AccessDenied,
            50 => Self::DecodeError,
            51 => Self::DecryptError,
            70 => Self::ProtocolVersion,
            71 => Self::InsufficientSecurity,
            80 => Self::InternalError,
            86 => Self::InappropriateFallback,
            90 => Self::UserCanceled,
            109 => Self::MissingExtension,
            110 => Self::UnsupportedExtension,
            116 => Self::CertificateRequired,
            120 => Self::NoApplicationProtocol,
            other => Self::Unknown(other),
        }
    }
}

impl From<AlertDescription> for u8 {
    fn from(description: AlertDescription) -> Self {
        match description {
            AlertDescription::CloseNotify => 0,
            AlertDescription::UnexpectedMessage => 10,
            AlertDescription::BadRecordMac => 20,
            AlertDescription::RecordOverflow => 22,
            AlertDescription::HandshakeFailure => 40,
            AlertDescription::BadCertificate => 42,
            AlertDescription::UnsupportedCertificate => 43,
            AlertDescription::CertificateRevoked => 44,
            AlertDescription::CertificateExpired => 45,
            AlertDescription::CertificateUnknown => 46,
            AlertDescription::IllegalParameter => 47,
            AlertDescription::UnknownCa => 48,
            AlertDescription::AccessDenied => 49,
            AlertDescription::DecodeError => 50,
            AlertDescription::DecryptError => 51,
            AlertDescription::ProtocolVersion => 70,
            AlertDescription::InsufficientSecurity => 71,
            AlertDescription::InternalError => 80,
            AlertDescription::InappropriateFallback => 86,
            AlertDescription::UserCanceled => 90,
            AlertDescription::MissingExtension => 109,
            AlertDescription::UnsupportedExtension => 110,
            AlertDescription::CertificateRequired => 116,
            AlertDescription::NoApplicationProtocol => 120,
            AlertDescription::Unknown(value) => value,
        }
    }
}

impl AlertDescription {
    /// Every alert this crate itself sends is fatal except `CloseNotify`
    /// and `UserCanceled`, per RFC 8446 §6: "Alerts other than close_notify
    /// and user_canceled are fatal".
    #[must_use]
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::CloseNotify | Self::UserCanceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    #[must_use]
    pub fn fatal(description: AlertDescription) -> Self {
        Self { level: AlertLevel::Fatal, description }
    }

    #[must_use]
    pub fn close_notify() -> Self {
        Self { level: AlertLevel::Warning, description: AlertDescription::CloseNotify }
    }

    pub fn read_from(c: &mut Reader<'_>) -> CodecResult<Self> {
        let level = AlertLevel::from(read_u8(c)?);
        let description = AlertDescription::from(read_u8(c)?);
        Ok(Self { level, description })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> CodecResult<()> {
        write_u8(out, u8::from(self.level));
        write_u8(out, u8::from(self.description));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn alert_round_trips() {
        let alert = Alert::fatal(AlertDescription::BadRecordMac);
        let mut buf = Vec::new();
        alert.write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![2, 20]);
        assert_eq!(Alert::read_from(&mut Reader::new(&buf)).unwrap(), alert);
    }

    #[test]
    fn close_notify_and_user_canceled_are_not_fatal() {
        assert!(!AlertDescription::CloseNotify.is_fatal());
        assert!(!AlertDescription::UserCanceled.is_fatal());
        assert!(AlertDescription::HandshakeFailure.is_fatal());
    }
}
