//! Printing a completed handshake's negotiated parameters, either as
//! coloured text or as JSON (`--json`), mirroring the teacher's
//! `OutputFormat` split between a pretty terminal view and a machine-
//! readable one.

use tls_handshake::NegotiatedParams;

use crate::colours::Colours;

/// Renders `negotiated` (plus whatever role-specific extras the caller
/// has on hand) to stdout.
pub struct Summary<'a> {
    pub negotiated: &'a NegotiatedParams,
    pub early_data_accepted: bool,
    pub ticket_issued: bool,
    pub reply: Option<&'a [u8]>,
}

impl Summary<'_> {
    pub fn print(&self, json: bool, colours: &Colours) {
        if json {
            self.print_json();
        } else {
            self.print_text(colours);
        }
    }

    fn print_text(&self, colours: &Colours) {
        println!("{} {:?}", colours.label.paint("cipher suite:"), self.negotiated.cipher_suite);
        println!("{} {:?}", colours.label.paint("key exchange group:"), self.negotiated.group);
        if let Some(scheme) = self.negotiated.signature_scheme {
            println!("{} {:?}", colours.label.paint("signature scheme:"), scheme);
        }
        if let Some(alpn) = &self.negotiated.alpn {
            println!("{} {}", colours.label.paint("alpn:"), String::from_utf8_lossy(alpn));
        }
        if let Some(name) = &self.negotiated.server_name {
            println!("{} {}", colours.label.paint("server name:"), name);
        }
        if self.early_data_accepted {
            println!("{}", colours.info.paint("0-RTT early data was accepted"));
        }
        if self.ticket_issued {
            println!("{}", colours.info.paint("issued a NewSessionTicket"));
        }
        if let Some(reply) = self.reply {
            println!("{} {}", colours.negotiated.paint("reply:"), String::from_utf8_lossy(reply));
        }
    }

    fn print_json(&self) {
        let mut object = json::JsonValue::new_object();
        object["cipher_suite"] = format!("{:?}", self.negotiated.cipher_suite).into();
        object["group"] = format!("{:?}", self.negotiated.group).into();
        if let Some(scheme) = self.negotiated.signature_scheme {
            object["signature_scheme"] = format!("{scheme:?}").into();
        }
        if let Some(alpn) = &self.negotiated.alpn {
            object["alpn"] = String::from_utf8_lossy(alpn).into_owned().into();
        }
        if let Some(name) = &self.negotiated.server_name {
            object["server_name"] = name.clone().into();
        }
        object["early_data_accepted"] = self.early_data_accepted.into();
        object["ticket_issued"] = self.ticket_issued.into();
        if let Some(reply) = self.reply {
            object["reply"] = String::from_utf8_lossy(reply).into_owned().into();
        }
        println!("{}", json::stringify_pretty(object, 2));
    }
}
