use crate::{Error, Result, WORKSPACE};

/// Resolve a caller-supplied path to a normalized absolute path under
/// `/workspace`, or reject it.
///
/// Relative paths are resolved against `/workspace`. `.` and `..`
/// components are removed lexically before the containment check, so
/// `notes/../../etc/passwd` is rejected rather than smuggled through.
pub fn workspace_path(input: &str) -> Result<String> {
    let absolute = if input.starts_with('/') {
        normalize(input)
    } else {
        normalize(&format!("{WORKSPACE}/{input}"))
    };

    if absolute == WORKSPACE || absolute.starts_with("/workspace/") {
        Ok(absolute)
    } else {
        Err(Error::Traversal(input.to_string()))
    }
}

// Lexical normalization: collapse empty and `.` components, resolve `..`
// against the stack. `..` at the root stays at the root.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => (),
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}
