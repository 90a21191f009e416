fn main() {
    for (var, exported) in [
        ("TARGET", "TRAYMON_BUILD_TARGET"),
        ("PROFILE", "TRAYMON_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}
