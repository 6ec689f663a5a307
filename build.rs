use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    let target = env::var("TARGET")?;

    // 只有固件需要内存布局，主机测试和基准跳过
    if target.starts_with("thumbv") {
        let out_dir = PathBuf::from(env::var("OUT_DIR")?);
        fs::write(out_dir.join("memory.x"), include_bytes!("memory.x"))?;
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=--nmagic");
    }

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
