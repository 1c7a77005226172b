use std::{env, fs, process};

use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: dump <file-with-amf3-values>");
        process::exit(2);
    };

    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(err) => {
            error!(%err, %path, "Failed to read input file.");
            process::exit(1);
        }
    };

    match amf3::decode_amf3_values(data.into()) {
        Ok(amf_values) => {
            for amf_value in &amf_values {
                info!(?amf_value, "Decoded AMF3 value.");
            }
        }
        Err(err) => {
            error!(%err, "Decoding failed.");
            process::exit(1);
        }
    }
}
