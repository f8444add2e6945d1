fn main() {
    // macOS refuses to link a cdylib with unresolved libpython symbols, so
    // defer their resolution to module load time. Keeps the wheel independent
    // of any particular Python installation.
    #[cfg(target_os = "macos")]
    {
        println!("cargo:rustc-link-arg=-undefined");
        println!("cargo:rustc-link-arg=dynamic_lookup");
    }
}
