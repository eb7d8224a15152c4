//! Transports that move subject bytes to and from a device.
//!
//! [`FsTransport`] reads files below a local root. [`CommandTransport`]
//! shells out to a device-control tool and reads the file from its standard
//! output, killing the child when the deadline passes. [`Uploader`] copies
//! local files onto the device and judges each copy by exit status alone.
//!
//! Command templates are split on whitespace; `{target}`, `{path}` and
//! `{local}` are substituted inside each word as raw bytes, so names that
//! are not valid UTF-8 reach the device tool unchanged.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;
use unidiag_core::{SubjectId, Transport, TransportError};

use crate::walk::{os_bytes, os_string, subject_path, WalkEntry};

/// Fetch command used when the target is `auto`.
pub const AUTO_FETCH_TEMPLATE: &str = "mpremote cat :{path}";

/// Fetch command used for an explicit target.
pub const DEFAULT_FETCH_TEMPLATE: &str = "mpremote connect {target} cat :{path}";

/// Copy command used when the target is `auto`.
pub const AUTO_COPY_TEMPLATE: &str = "mpremote cp {local} :{path}";

/// Copy command used for an explicit target.
pub const DEFAULT_COPY_TEMPLATE: &str = "mpremote connect {target} cp {local} :{path}";

/// Directory creation command used when the target is `auto`.
pub const AUTO_MKDIR_TEMPLATE: &str = "mpremote mkdir :{path}";

/// Directory creation command used for an explicit target.
pub const DEFAULT_MKDIR_TEMPLATE: &str = "mpremote connect {target} mkdir :{path}";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reads subject contents from the local filesystem.
///
/// Local reads are not bounded by the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsTransport {
    root: PathBuf,
}

impl FsTransport {
    /// Creates a transport resolving subjects relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Transport for FsTransport {
    fn fetch(&mut self, subject: &SubjectId, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let path = self.root.join(subject_path(subject));
        fs::read(&path).map_err(|e| TransportError::Io(format!("{}: {e}", path.display())))
    }
}

/// Whitespace-split command words with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Template {
    words: Vec<String>,
}

impl Template {
    fn parse(template: &str, kind: &str) -> Result<Self, TransportError> {
        let words: Vec<String> = template.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            return Err(TransportError::Io(format!("empty {kind} command")));
        }
        Ok(Self { words })
    }

    fn render(&self, values: &[(&str, &[u8])]) -> Vec<OsString> {
        self.words
            .iter()
            .map(|word| os_string(substitute(word.as_bytes(), values)))
            .collect()
    }
}

/// Replaces each placeholder in one left-to-right pass; substituted bytes
/// are never scanned again.
fn substitute(word: &[u8], values: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::with_capacity(word.len());
    let mut rest = word;
    'scan: while let Some((&first, tail)) = rest.split_first() {
        if first == b'{' {
            for (placeholder, value) in values {
                if let Some(after) = rest.strip_prefix(placeholder.as_bytes()) {
                    out.extend_from_slice(value);
                    rest = after;
                    continue 'scan;
                }
            }
        }
        out.push(first);
        rest = tail;
    }
    out
}

/// Device path for `subject` below `dest`. An empty `dest` leaves the
/// subject path as is.
fn remote_path(dest: &[u8], subject: &SubjectId) -> Vec<u8> {
    let base = dest.strip_suffix(b"/").unwrap_or(dest);
    if base.is_empty() {
        return subject.as_bytes().to_vec();
    }
    let mut path = base.to_vec();
    path.push(b'/');
    path.extend_from_slice(subject.as_bytes());
    path
}

fn pick<'a>(template: Option<&'a str>, target: &str, auto: &'a str, named: &'a str) -> &'a str {
    template.unwrap_or(if target == "auto" { auto } else { named })
}

/// Runs `argv` to completion or until `timeout`, returning its standard
/// output on a zero exit status.
fn run(argv: &[OsString], timeout: Duration) -> Result<Vec<u8>, TransportError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TransportError::Io("empty command".to_string()))?;
    debug!(command = ?argv, "spawning device command");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| TransportError::Io(format!("{}: {e}", program.to_string_lossy())))?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let waited = wait_until(&mut child, timeout);
    let output = join(stdout);
    let errors = join(stderr);
    let status = waited?;

    if status.success() {
        Ok(output)
    } else {
        Err(TransportError::Failed {
            status: status.code(),
            detail: String::from_utf8_lossy(&errors).trim().to_string(),
        })
    }
}

/// Polls `child` until it exits. Past the deadline, or when polling fails,
/// the child is killed and reaped before returning.
fn wait_until(child: &mut Child, timeout: Duration) -> Result<ExitStatus, TransportError> {
    // A deadline beyond what `Instant` can hold means no deadline.
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if deadline.is_some_and(|at| Instant::now() >= at) => {
                reap(child);
                return Err(TransportError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                reap(child);
                return Err(TransportError::Io(e.to_string()));
            }
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // A read error leaves whatever was collected so far.
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Runs an external command per subject and returns its standard output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTransport {
    template: Template,
    target: String,
    dest: Vec<u8>,
}

impl CommandTransport {
    /// Builds a transport from an explicit template.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when the template has no program word.
    pub fn new(template: &str, target: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self {
            template: Template::parse(template, "fetch")?,
            target: target.into(),
            dest: Vec::new(),
        })
    }

    /// Builds a transport for `target`, using the default template unless
    /// one is given.
    ///
    /// # Errors
    ///
    /// See [`CommandTransport::new`].
    pub fn for_target(template: Option<&str>, target: &str) -> Result<Self, TransportError> {
        Self::new(
            pick(template, target, AUTO_FETCH_TEMPLATE, DEFAULT_FETCH_TEMPLATE),
            target,
        )
    }

    /// Returns a transport reading subjects below the device directory `dest`.
    #[must_use]
    pub fn with_dest(mut self, dest: &str) -> Self {
        self.dest = dest.as_bytes().to_vec();
        self
    }

    /// The command words that would run for `subject`.
    #[must_use]
    pub fn command_line(&self, subject: &SubjectId) -> Vec<OsString> {
        let path = remote_path(&self.dest, subject);
        self.template.render(&[
            ("{target}", self.target.as_bytes()),
            ("{path}", &path),
        ])
    }
}

impl Transport for CommandTransport {
    fn fetch(&mut self, subject: &SubjectId, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        run(&self.command_line(subject), timeout)
    }
}

/// Copies walked files onto the device, creating remote directories first.
///
/// A copy passes when the command exits with status zero; its output is
/// ignored. Directory creation failures are logged and otherwise ignored,
/// since the directory usually exists already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    copy: Template,
    mkdir: Template,
    target: String,
    dest: Vec<u8>,
    created: BTreeSet<Vec<u8>>,
}

impl Uploader {
    /// Builds an uploader from explicit templates.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] when either template has no program word.
    pub fn new(copy: &str, mkdir: &str, target: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self {
            copy: Template::parse(copy, "copy")?,
            mkdir: Template::parse(mkdir, "mkdir")?,
            target: target.into(),
            dest: Vec::new(),
            created: BTreeSet::new(),
        })
    }

    /// Builds an uploader for `target`, using the default templates where
    /// none is given.
    ///
    /// # Errors
    ///
    /// See [`Uploader::new`].
    pub fn for_target(
        copy: Option<&str>,
        mkdir: Option<&str>,
        target: &str,
    ) -> Result<Self, TransportError> {
        Self::new(
            pick(copy, target, AUTO_COPY_TEMPLATE, DEFAULT_COPY_TEMPLATE),
            pick(mkdir, target, AUTO_MKDIR_TEMPLATE, DEFAULT_MKDIR_TEMPLATE),
            target,
        )
    }

    /// Returns an uploader placing files below the device directory `dest`.
    #[must_use]
    pub fn with_dest(mut self, dest: &str) -> Self {
        self.dest = dest.as_bytes().to_vec();
        self
    }

    /// The copy command words for `entry`.
    #[must_use]
    pub fn copy_command(&self, entry: &WalkEntry) -> Vec<OsString> {
        let path = remote_path(&self.dest, &entry.path_subject());
        let local = os_bytes(entry.path.as_os_str());
        self.copy.render(&[
            ("{target}", self.target.as_bytes()),
            ("{path}", &path),
            ("{local}", &local),
        ])
    }

    /// Device directories that must exist before `subject` is copied,
    /// outermost first.
    #[must_use]
    pub fn remote_dirs(&self, subject: &SubjectId) -> Vec<Vec<u8>> {
        let path = remote_path(&self.dest, subject);
        path.iter()
            .enumerate()
            .filter(|&(at, &byte)| byte == b'/' && at > 0)
            .map(|(at, _)| path[..at].to_vec())
            .collect()
    }

    /// Copies one file, creating any missing parent directories on the
    /// device first.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when the copy outlives `timeout`,
    /// otherwise [`TransportError::Failed`] or [`TransportError::Io`].
    pub fn upload(&mut self, entry: &WalkEntry, timeout: Duration) -> Result<(), TransportError> {
        for dir in self.remote_dirs(&entry.path_subject()) {
            if self.created.contains(&dir) {
                continue;
            }
            let argv = self.mkdir.render(&[
                ("{target}", self.target.as_bytes()),
                ("{path}", &dir),
            ]);
            if let Err(error) = run(&argv, timeout) {
                debug!(dir = %String::from_utf8_lossy(&dir), %error, "remote mkdir failed");
            }
            self.created.insert(dir);
        }
        run(&self.copy_command(entry), timeout).map(drop)
    }
}
