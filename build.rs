use std::process::Command;

fn get_revision() -> Option<String> {
    if let Ok(out) = Command::new("git")
        .args(&["rev-parse", "--short", "--verify", "HEAD"])
        .output()
    {
        if out.status.success() {
            return Some(String::from_utf8_lossy(&out.stdout).trim().to_string());
        }
    }
    None
}

fn main() {
    use std::fs::OpenOptions;
    use std::io::Write;

    println!("cargo:rerun-if-changed=.git/HEAD");

    let revision = if let Some(rev) = get_revision() {
        format!("Some(\"{}\")", rev)
    } else {
        "None".to_string()
    };
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open("src/common/revision.rs")
        .expect("while opening revision file");
    file.write_fmt(format_args!(
        "\
//! Stores the current revision.

/// The current revision.
pub const REVISION: Option<&str> = {};
",
        revision
    ))
    .expect("while writing revision file");
    file.flush().expect("while flushing revision file");
}
