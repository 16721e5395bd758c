fn main() {
    // Let a bundled libpdfium.dylib resolve from the app's Frameworks directory
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("macos") {
        println!("cargo:rustc-link-arg=-Wl,-rpath,@executable_path/../Frameworks");
    }

    // On Windows pdfium.dll is expected next to the executable; it is bound at
    // runtime, so nothing is linked here.

    println!("cargo:rerun-if-changed=build.rs");
}
