fn main() {
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap();

    if target_os != "linux" && target_os != "macos" {
        panic!("unsupported OS: {}", target_os);
    }

    let (asm_file, lib_file, lib_name) = match target_arch.as_str() {
        "x86_64" => (
            "asm/context_x86_64.S",
            "asm/libcontext_x86_64.a",
            "context_x86_64",
        ),
        "aarch64" => (
            "asm/context_aarch64.S",
            "asm/libcontext_aarch64.a",
            "context_aarch64",
        ),
        _ => panic!("unsupported architecture: {}", target_arch),
    };

    if !std::path::Path::new(asm_file).exists() {
        panic!("assembly file {} not found", asm_file);
    }

    // stale archives from a previous target confuse the linker
    let _ = std::fs::remove_file(lib_file);

    let mut build = cc::Build::new();
    build.file(asm_file).flag("-fPIC");
    build.compile("switch_context");

    // locate the object the cc crate just produced; cc already emitted link
    // directives for its own archive, so a miss here is not fatal
    let out_dir = std::env::var("OUT_DIR").unwrap();
    let Some(object) = find_object(std::path::Path::new(&out_dir)) else {
        return;
    };

    // repackage it as a static archive next to the assembly sources
    let object_data = std::fs::read(&object).unwrap();
    let mut header = ar::Header::new(
        object
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .as_bytes()
            .to_vec(),
        object_data.len() as u64,
    );
    header.set_mode(0o644);

    let mut archive = ar::Builder::new(std::fs::File::create(lib_file).unwrap());
    archive
        .append(&header, object_data.as_slice())
        .expect("failed to add object file to archive");
    drop(archive);

    println!("cargo:rustc-link-search=native=asm");
    println!("cargo:rustc-link-lib=static={}", lib_name);
    println!("cargo:rerun-if-changed={}", asm_file);
    println!("cargo:rerun-if-changed=build.rs");
}

fn find_object(dir: &std::path::Path) -> Option<std::path::PathBuf> {
    for entry in std::fs::read_dir(dir).ok()? {
        let path = entry.ok()?.path();
        if path.is_dir() {
            if let Some(found) = find_object(&path) {
                return Some(found);
            }
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("o")
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.contains("context"))
                .unwrap_or(false)
        {
            return Some(path);
        }
    }
    None
}
