fn main() {
    // macOS: leave Python symbols undefined, the interpreter provides them
    // when it loads the extension module.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("macos") {
        println!("cargo:rustc-link-arg=-undefined");
        println!("cargo:rustc-link-arg=dynamic_lookup");
    }
}
