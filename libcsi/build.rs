fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Client stubs are only used by the integration tests, but generating
    // them here keeps a single copy of the wire types.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/csi.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/csi.proto");
    Ok(())
}
