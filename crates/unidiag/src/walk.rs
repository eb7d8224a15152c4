//! Directory walking for scans.
//!
//! Entries are reported with both their bare file name and their path
//! relative to the scan root, each as raw OS bytes so names that are not
//! valid UTF-8 reach the diagnoser untouched.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use unidiag_core::SubjectId;

/// A regular file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Full path on disk.
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative: PathBuf,
}

impl WalkEntry {
    /// Raw bytes of the file name alone.
    #[must_use]
    pub fn name_bytes(&self) -> Vec<u8> {
        self.relative
            .file_name()
            .map(os_bytes)
            .unwrap_or_default()
    }

    /// Subject for the relative path with `/` separators.
    #[must_use]
    pub fn path_subject(&self) -> SubjectId {
        relative_subject(&self.relative)
    }
}

fn relative_subject(relative: &Path) -> SubjectId {
    let mut bytes = Vec::new();
    for (index, component) in relative.iter().enumerate() {
        if index > 0 {
            bytes.push(b'/');
        }
        bytes.extend(os_bytes(component));
    }
    SubjectId::from_bytes(bytes)
}

/// Raw bytes of an OS string.
///
/// On Unix these are the exact bytes the kernel returned. Elsewhere the
/// platform string is converted lossily.
#[cfg(unix)]
#[must_use]
pub fn os_bytes(value: &OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    value.as_bytes().to_vec()
}

/// Raw bytes of an OS string.
///
/// On Unix these are the exact bytes the kernel returned. Elsewhere the
/// platform string is converted lossily.
#[cfg(not(unix))]
#[must_use]
pub fn os_bytes(value: &OsStr) -> Vec<u8> {
    value.to_string_lossy().into_owned().into_bytes()
}

/// Builds an OS string from raw bytes, the inverse of [`os_bytes`].
#[cfg(unix)]
#[must_use]
pub fn os_string(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

/// Builds an OS string from raw bytes, the inverse of [`os_bytes`].
#[cfg(not(unix))]
#[must_use]
pub fn os_string(bytes: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Rebuilds a relative path from subject bytes produced by
/// [`WalkEntry::path_subject`].
#[cfg(unix)]
#[must_use]
pub fn subject_path(subject: &SubjectId) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(subject.as_bytes()))
}

/// Rebuilds a relative path from subject bytes produced by
/// [`WalkEntry::path_subject`].
#[cfg(not(unix))]
#[must_use]
pub fn subject_path(subject: &SubjectId) -> PathBuf {
    PathBuf::from(subject.to_lossy())
}

fn is_hidden(name: &OsStr) -> bool {
    os_bytes(name).first() == Some(&b'.')
}

/// A directory or entry the walk could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreadable {
    /// Path relative to the scan root.
    pub relative: PathBuf,
    /// The I/O error, as text.
    pub error: String,
}

impl Unreadable {
    /// Subject for the unreadable path, joined like [`WalkEntry::path_subject`].
    #[must_use]
    pub fn subject(&self) -> SubjectId {
        relative_subject(&self.relative)
    }
}

/// Result of a walk: the files found and whatever could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Walk {
    /// Regular files, sorted by relative path.
    pub entries: Vec<WalkEntry>,
    /// Directories and entries skipped after an I/O error, in walk order.
    pub unreadable: Vec<Unreadable>,
}

/// Recursively lists regular files under `root`, sorted by relative path.
///
/// Hidden files and directories are skipped, as is any path listed in
/// `exclude` (for example the results file of a previous run). A
/// subdirectory or entry that cannot be read is logged, recorded in
/// [`Walk::unreadable`] and skipped; the rest of the tree is still walked.
///
/// # Errors
///
/// Returns the I/O error when `root` itself cannot be listed.
pub fn walk(root: &Path, exclude: &[PathBuf]) -> io::Result<Walk> {
    let listing = fs::read_dir(root)?;
    let mut found = Walk::default();
    walk_listing(listing, Path::new(""), exclude, &mut found);
    found.entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(found)
}

fn skip_unreadable(found: &mut Walk, relative: &Path, error: &io::Error) {
    warn!(path = %relative.display(), %error, "skipping unreadable entry");
    found.unreadable.push(Unreadable {
        relative: relative.to_path_buf(),
        error: error.to_string(),
    });
}

fn walk_dir(dir: &Path, relative: &Path, exclude: &[PathBuf], found: &mut Walk) {
    match fs::read_dir(dir) {
        Ok(listing) => walk_listing(listing, relative, exclude, found),
        Err(error) => skip_unreadable(found, relative, &error),
    }
}

fn walk_listing(listing: fs::ReadDir, relative: &Path, exclude: &[PathBuf], found: &mut Walk) {
    for item in listing {
        let item = match item {
            Ok(item) => item,
            Err(error) => {
                skip_unreadable(found, relative, &error);
                continue;
            }
        };
        let name = item.file_name();
        if is_hidden(&name) {
            continue;
        }
        let path = item.path();
        if exclude.iter().any(|skip| *skip == path) {
            continue;
        }
        let child = relative.join(&name);
        match item.file_type() {
            Ok(file_type) if file_type.is_dir() => walk_dir(&path, &child, exclude, found),
            Ok(file_type) if file_type.is_file() => found.entries.push(WalkEntry {
                path,
                relative: child,
            }),
            Ok(_) => {}
            Err(error) => skip_unreadable(found, &child, &error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_skips_hidden_entries_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), b"b").expect("write");
        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        fs::write(dir.path().join(".hidden"), b"h").expect("write");
        fs::create_dir(dir.path().join(".git")).expect("mkdir");
        fs::write(dir.path().join(".git").join("config"), b"c").expect("write");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("sub").join("c.txt"), b"c").expect("write");

        let found = walk(dir.path(), &[]).expect("walk");
        assert!(found.unreadable.is_empty());
        let relative: Vec<_> = found.entries.iter().map(|e| e.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("sub").join("c.txt"),
            ]
        );
    }

    #[test]
    fn walk_honours_exclusions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let results = dir.path().join("results.txt");
        fs::write(&results, b"old").expect("write");
        fs::write(dir.path().join("keep.txt"), b"k").expect("write");

        let entries = walk(dir.path(), &[results]).expect("walk").entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_bytes(), b"keep.txt");
    }

    #[test]
    fn subject_is_slash_joined_relative_path() {
        let entry = WalkEntry {
            path: PathBuf::from("/root/sub/caf\u{e9}.txt"),
            relative: PathBuf::from("sub").join("caf\u{e9}.txt"),
        };
        assert_eq!(entry.name_bytes(), "caf\u{e9}.txt".as_bytes());
        assert_eq!(
            entry.path_subject().as_bytes(),
            "sub/caf\u{e9}.txt".as_bytes()
        );
        assert_eq!(
            subject_path(&entry.path_subject()),
            PathBuf::from("sub/caf\u{e9}.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_keep_their_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"bad\xff\xfe.txt");
        assert_eq!(os_bytes(name), b"bad\xff\xfe.txt");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(walk(&dir.path().join("absent"), &[]).is_err());
    }

    #[test]
    fn unreadable_subdirectory_is_recorded_and_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut found = Walk::default();
        walk_dir(
            &dir.path().join("vanished"),
            Path::new("vanished"),
            &[],
            &mut found,
        );
        assert!(found.entries.is_empty());
        assert_eq!(found.unreadable.len(), 1);
        assert_eq!(found.unreadable[0].relative, PathBuf::from("vanished"));
        assert_eq!(found.unreadable[0].subject().as_bytes(), b"vanished");
    }

    #[cfg(unix)]
    #[test]
    fn locked_subdirectory_does_not_stop_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).expect("mkdir");
        fs::write(locked.join("inside.txt"), b"i").expect("write");
        fs::write(dir.path().join("z.txt"), b"z").expect("write");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        // Privileged users read through the mode bits.
        let enforced = fs::read_dir(&locked).is_err();

        let found = walk(dir.path(), &[]).expect("walk");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");

        let names: Vec<_> = found.entries.iter().map(WalkEntry::path_subject).collect();
        assert!(names.contains(&SubjectId::from("a.txt")));
        assert!(names.contains(&SubjectId::from("z.txt")));
        if enforced {
            assert_eq!(found.unreadable.len(), 1);
            assert_eq!(found.unreadable[0].relative, PathBuf::from("locked"));
        } else {
            assert!(names.contains(&SubjectId::from("locked/inside.txt")));
        }
    }
}
