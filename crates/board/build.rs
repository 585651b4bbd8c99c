//! Linker script placement for the hardware target.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "hardware")]
    {
        use std::path::PathBuf;

        // cortex-m-rt's link.x includes memory.x from the linker search path.
        let out = PathBuf::from(std::env::var_os("OUT_DIR").ok_or("OUT_DIR not set")?);
        std::fs::write(out.join("memory.x"), include_bytes!("../../memory.x"))?;
        println!("cargo:rustc-link-search={}", out.display());
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
        println!("cargo:rerun-if-changed=../../memory.x");
    }

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
