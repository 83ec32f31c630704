//! Colours, colour schemes, and terminal styling.

use ansi_term::Style;
use ansi_term::Color::*;


/// The **colours** used to paint a handshake summary.
#[derive(Debug, Default)]
pub struct Colours {

    /// The peer's negotiated server name, ALPN protocol, or ticket label.
    pub label: Style,

    /// The negotiated cipher suite, key-exchange group, and signature scheme.
    pub negotiated: Style,

    /// Informational lines (ticket issued, early data accepted, ...).
    pub info: Style,

    /// A fatal alert or connection error.
    pub error: Style,
}

impl Colours {

    /// Create a new colour palette that has a variety of different styles
    /// defined. This is used by default.
    pub fn pretty() -> Self {
        Self {
            label: Blue.bold(),
            negotiated: Green.bold(),
            info: Cyan.normal(),
            error: Red.bold(),
        }
    }

    /// Create a new colour palette where no styles are defined, causing
    /// output to be rendered as plain text without any formatting.
    /// This is used when output is not to a terminal.
    pub fn plain() -> Self {
        Self::default()
    }
}
