fn main() {
    // `IntoFuture!` names its future type directly on nightly instead of boxing it.
    println!("cargo::rustc-check-cfg=cfg(nightly_rust)");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".into());
    let Ok(output) = std::process::Command::new(rustc).arg("--version").output() else {
        return;
    };

    if String::from_utf8_lossy(&output.stdout).contains("nightly") {
        println!("cargo::rustc-cfg=nightly_rust");
    }
}
