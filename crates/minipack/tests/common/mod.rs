#![allow(dead_code)]

use std::{fs, path::Path, process::Command};

use tempfile::TempDir;

/// Temporary project populated with `(relative path, contents)` pairs
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write_files(temp_dir.path(), files);
    temp_dir
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

/// Run a bundle with node and return its stdout, or `None` when node is not
/// installed
#[allow(clippy::print_stderr)]
pub fn run_with_node(bundle: &Path) -> Option<String> {
    let output = match Command::new("node").arg(bundle).output() {
        Ok(output) => output,
        Err(err) => {
            eprintln!("skipping: cannot run node ({err})");
            return None;
        }
    };
    assert!(
        output.status.success(),
        "bundle failed under node:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8(output.stdout).unwrap())
}
