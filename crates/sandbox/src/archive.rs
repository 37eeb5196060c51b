//! Single-entry uncompressed tar streams, the shape the container
//! runtime's archive endpoints speak.

use std::io::Read;

use crate::{Error, Result};

/// Wrap `content` as a tar stream holding one regular file named
/// `name` (a path relative to the archive root).
pub fn wrap_file(name: &str, content: &[u8]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, name, content)
        .map_err(|e| Error::Archive("build", e))?;
    builder.into_inner().map_err(|e| Error::Archive("finalize", e))
}

/// Extract the first entry of a tar stream fetched for `path`.
///
/// The runtime returns a directory entry first when `path` names a
/// directory; that case is an error rather than empty content.
pub fn unwrap_file(tar_bytes: &[u8], path: &str) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(tar_bytes);
    let entries = archive.entries().map_err(|e| Error::Archive("read", e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::Archive("read", e))?;
        if entry.header().entry_type().is_dir() {
            return Err(Error::IsDirectory(path.to_string()));
        }
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::Archive("read", e))?;
        return Ok(content);
    }
    Err(Error::NotFound(path.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    #[test]
    fn wrap_then_unwrap_round_trips_bytes() {
        let content = b"hello sandbox\n\x00\xff binary ok";
        let tar = wrap_file("a.txt", content).unwrap();
        let out = unwrap_file(&tar, "/workspace/a.txt").unwrap();
        assert_eq!(out, content);
    }

    #[test]
    fn empty_file_round_trips() {
        let tar = wrap_file("empty", b"").unwrap();
        assert_eq!(unwrap_file(&tar, "/workspace/empty").unwrap(), b"");
    }

    #[test]
    fn empty_stream_is_not_found() {
        // An empty archive (just the trailing zero blocks) has no entries.
        let tar = tar::Builder::new(Vec::new()).into_inner().unwrap();
        match unwrap_file(&tar, "/workspace/missing") {
            Err(Error::NotFound(path)) => assert_eq!(path, "/workspace/missing"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn directory_entry_is_rejected() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "dir/", &[][..]).unwrap();
        let tar = builder.into_inner().unwrap();

        match unwrap_file(&tar, "/workspace/dir") {
            Err(Error::IsDirectory(path)) => assert_eq!(path, "/workspace/dir"),
            other => panic!("expected IsDirectory, got {other:?}"),
        }
    }
}
