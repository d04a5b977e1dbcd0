//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = osm_export_cli::run() {
        eprintln!("osm-export: {err}");
        std::process::exit(1);
    }
}
