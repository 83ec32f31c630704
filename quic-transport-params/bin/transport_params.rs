//! Decodes a base64'd `quic_transport_parameters` extension body passed as
//! the first command-line argument and prints it as JSON, for interop
//! debugging.

use quic_transport_params::TransportParameters;

fn main() {
    env_logger::init();

    let Some(base) = std::env::args().nth(1) else {
        eprintln!("usage: transport-params <base64-encoded-transport-parameters>");
        std::process::exit(2);
    };

    let bytes = match base64::decode(&base) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("invalid base64: {e}");
            std::process::exit(1);
        }
    };

    match TransportParameters::decode(&bytes) {
        Ok(params) => println!("{}", serde_json::to_string_pretty(&params).unwrap()),
        Err(e) => {
            eprintln!("failed to parse transport parameters: {e}");
            std::process::exit(1);
        }
    }
}
