//! Wiring `--key-log-file`/`SSLKEYLOGFILE` to `tls-handshake`'s
//! [`tls_handshake::keylog::KeyLog`] trait.

use std::fs::OpenOptions;
use std::sync::Arc;

use tls_handshake::error::{HandshakeError, Result};
use tls_handshake::keylog::{KeyLog, NoKeyLog, WriterKeyLog};

/// Opens (creating or appending to) the file named by `--key-log-file`,
/// or returns a no-op sink if the user didn't ask for one.
pub fn open(path: Option<&str>) -> Result<Arc<dyn KeyLog>> {
    match path {
        None => Ok(Arc::new(NoKeyLog)),
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path).map_err(HandshakeError::from)?;
            Ok(Arc::new(WriterKeyLog::new(file)))
        }
    }
}
