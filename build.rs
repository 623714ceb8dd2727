fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "bin")]
    {
        let build_date = chrono::Utc::now().format("%Y-%m-%d");
        let full_version = format!("{}_{}", env!("CARGO_PKG_VERSION"), build_date);
        println!("cargo:rustc-env=FULL_VERSION={full_version}");
    }
}
