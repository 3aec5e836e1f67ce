fn main() {
    // Re-run when HEAD moves
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let described = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    // Outside a git checkout, fall back to the package version
    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string());
    let version = match described {
        Some(rev) if !rev.is_empty() => format!("{package} ({rev})"),
        _ => package,
    };

    println!("cargo:rustc-env=GIT_VERSION={}", version);
}
