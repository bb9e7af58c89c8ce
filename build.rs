use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .file_descriptor_set_path(out_dir.join("chord_descriptor.bin"))
        .compile(&["proto/chord.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/chord.proto");
    Ok(())
}
