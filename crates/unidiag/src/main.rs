//! CLI entry point for the unidiag binary.

use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use unidiag::render::{render_details, render_json, render_summary};
use unidiag::transport::{CommandTransport, FsTransport, Uploader};
use unidiag::walk::{os_bytes, walk, Unreadable, WalkEntry};
use unidiag_core::{
    classify, classify_str, diagnose, Codec, DiagnoseConfig, DiagnosticAggregator, ErrorMode,
    FailureReport, Invalid, Scalar, SubjectDiagnosis, TextDecoder, Transport, TransportError,
    DEFAULT_PREVIEW_LEN, DEFAULT_TIMEOUT,
};

#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: unidiag <command> [options]

Commands:
  scan   <dir> [options]     Diagnose every file name (and optionally contents) under <dir>
  decode <file> [options]    Decode a file through the streaming decoder
  char   <value>             Build a character from a decimal or 0x-hex code point

Scan options:
  -t, --target <target>      Device to fetch from (default: auto)
      --timeout <secs>       Per-fetch deadline in seconds (default: 30)
      --preview <bytes>      Raw bytes kept per report entry (default: 16)
      --content              Also diagnose local file contents
      --upload               Copy each file to the device; pass or fail by exit status
      --remote               Also diagnose contents fetched from the device
                             (after --upload, only files that uploaded)
      --dest <dir>           Device directory holding the files (default: none)
      --fetch-cmd <template> Fetch command; {target} and {path} are substituted
      --copy-cmd <template>  Copy command; {target}, {local} and {path} are substituted
      --mkdir-cmd <template> Device directory command; {target} and {path} are substituted
      --skip-ext <ext>       Leave out files with this extension (repeatable)
      --json                 Print the reports as JSON
  -o, --output <file>        Write per-subject code point listings to <file>

Decode options:
      --chunk <n>            Feed the decoder <n> bytes at a time (default: whole file)
      --codec <name>         Encoding name (default: utf-8)
      --errors <mode>        strict, ignore or replace (default: strict)

Options:
  -v, --verbose              Debug logging on stderr (RUST_LOG overrides)
  -h, --help                 Show this help message

Exit status: 0 clean, 1 error, 2 hazards or fetch failures found.

Examples:
  unidiag scan ./test_files -o results.txt
  unidiag scan ./test_files --remote --target /dev/ttyACM0
  unidiag scan ./test_data --upload --remote --dest /remote_data --skip-ext py --skip-ext md
  unidiag decode input.txt --chunk 1 --errors replace
  unidiag char 0x1F600
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Scan(ScanArgs),
    Decode(DecodeArgs),
    Char(CharArgs),
}

impl Command {
    const fn verbose(&self) -> bool {
        match self {
            Self::Scan(args) => args.verbose,
            Self::Decode(args) => args.verbose,
            Self::Char(_) => false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
struct ScanArgs {
    dir: PathBuf,
    target: String,
    timeout: Duration,
    preview_len: usize,
    fetch_cmd: Option<String>,
    copy_cmd: Option<String>,
    mkdir_cmd: Option<String>,
    dest: Option<String>,
    skip_ext: Vec<String>,
    content: bool,
    upload: bool,
    remote: bool,
    json: bool,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DecodeArgs {
    input: PathBuf,
    chunk: Option<usize>,
    codec: String,
    errors: String,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct CharArgs {
    value: i64,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "scan" => parse_scan_args(args)
            .map(Command::Scan)
            .map(ParseResult::Command),
        "decode" => parse_decode_args(args)
            .map(Command::Decode)
            .map(ParseResult::Command),
        "char" => parse_char_args(args)
            .map(Command::Char)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn take_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| format!("invalid timeout: {value}"))
}

fn parse_count(flag: &str, value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .map_err(|_| format!("invalid value for {flag}: {value}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_scan_args(mut args: impl Iterator<Item = OsString>) -> Result<ScanArgs, String> {
    let mut dir: Option<PathBuf> = None;
    let mut target = "auto".to_string();
    let mut timeout = DEFAULT_TIMEOUT;
    let mut preview_len = DEFAULT_PREVIEW_LEN;
    let mut fetch_cmd: Option<String> = None;
    let mut copy_cmd: Option<String> = None;
    let mut mkdir_cmd: Option<String> = None;
    let mut dest: Option<String> = None;
    let mut skip_ext: Vec<String> = Vec::new();
    let mut content = false;
    let mut upload = false;
    let mut remote = false;
    let mut json = false;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Err(USAGE_TEXT.to_string()),
            "-v" | "--verbose" => verbose = true,
            "--content" => content = true,
            "--upload" => upload = true,
            "--remote" => remote = true,
            "--json" => json = true,
            "-t" | "--target" => target = take_value(&mut args, &flag)?,
            "--timeout" => timeout = parse_seconds(&take_value(&mut args, &flag)?)?,
            "--preview" => preview_len = parse_count(&flag, &take_value(&mut args, &flag)?)?,
            "--fetch-cmd" => fetch_cmd = Some(take_value(&mut args, &flag)?),
            "--copy-cmd" => copy_cmd = Some(take_value(&mut args, &flag)?),
            "--mkdir-cmd" => mkdir_cmd = Some(take_value(&mut args, &flag)?),
            "--dest" => dest = Some(take_value(&mut args, &flag)?),
            "--skip-ext" => {
                let ext = take_value(&mut args, &flag)?;
                skip_ext.push(ext.trim_start_matches('.').to_string());
            }
            "-o" | "--output" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                output = Some(PathBuf::from(value));
            }
            _ if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            _ => {
                if dir.is_some() {
                    return Err("multiple directories provided".to_string());
                }
                dir = Some(PathBuf::from(arg));
            }
        }
    }

    let dir = dir.ok_or_else(|| "missing directory".to_string())?;
    Ok(ScanArgs {
        dir,
        target,
        timeout,
        preview_len,
        fetch_cmd,
        copy_cmd,
        mkdir_cmd,
        dest,
        skip_ext,
        content,
        upload,
        remote,
        json,
        output,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_decode_args(mut args: impl Iterator<Item = OsString>) -> Result<DecodeArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut chunk: Option<usize> = None;
    let mut codec = Codec::Utf8.name().to_string();
    let mut errors = "strict".to_string();
    let mut verbose = false;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Err(USAGE_TEXT.to_string()),
            "-v" | "--verbose" => verbose = true,
            "--chunk" => {
                let n = parse_count(&flag, &take_value(&mut args, &flag)?)?;
                if n == 0 {
                    return Err("--chunk must be at least 1".to_string());
                }
                chunk = Some(n);
            }
            "--codec" => codec = take_value(&mut args, &flag)?,
            "--errors" => errors = take_value(&mut args, &flag)?,
            _ if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            _ => {
                if input.is_some() {
                    return Err("multiple input paths provided".to_string());
                }
                input = Some(PathBuf::from(arg));
            }
        }
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(DecodeArgs {
        input,
        chunk,
        codec,
        errors,
        verbose,
    })
}

/// Parses `123`, `-5`, `0x1F600` or `U+1F600`.
fn parse_code_point(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = text
        .strip_prefix('-')
        .map_or((false, text), |rest| (true, rest));
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .or_else(|| digits.strip_prefix("U+"))
        .or_else(|| digits.strip_prefix("u+"));
    let magnitude = hex.map_or_else(
        || digits.parse::<i64>().ok(),
        |hex| i64::from_str_radix(hex, 16).ok(),
    )?;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_char_args(args: impl Iterator<Item = OsString>) -> Result<CharArgs, String> {
    let mut value: Option<i64> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        let text = arg.to_string_lossy();
        let Some(parsed) = parse_code_point(&text) else {
            if text.starts_with('-') {
                return Err(format!("unknown option: {text}"));
            }
            return Err(format!("invalid code point: {text}"));
        };

        if value.is_some() {
            return Err("multiple code points provided".to_string());
        }
        value = Some(parsed);
    }

    let value = value.ok_or_else(|| "missing code point".to_string())?;
    Ok(CharArgs { value })
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second initialisation (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

struct Section {
    key: &'static str,
    title: &'static str,
    report: FailureReport,
    diagnoses: Vec<SubjectDiagnosis>,
}

impl Section {
    fn has_findings(&self) -> bool {
        self.report.has_hazards()
            || !self.report.transport_timeouts().is_empty()
            || !self.report.transport_failures().is_empty()
    }
}

fn is_skipped(entry: &WalkEntry, skip_ext: &[String]) -> bool {
    entry
        .relative
        .extension()
        .is_some_and(|ext| skip_ext.iter().any(|skip| os_bytes(ext) == skip.as_bytes()))
}

fn name_section(
    config: &DiagnoseConfig,
    entries: &[WalkEntry],
    unreadable: &[Unreadable],
) -> Section {
    let mut aggregator = DiagnosticAggregator::new(config.clone());
    let diagnoses = entries
        .iter()
        .map(|entry| aggregator.diagnose(entry.path_subject(), &entry.name_bytes()))
        .collect();
    for skipped in unreadable {
        aggregator.record_transport_error(
            skipped.subject(),
            TransportError::Io(format!("cannot read: {}", skipped.error)),
        );
    }
    Section {
        key: "names",
        title: "File names",
        report: aggregator.finalize(),
        diagnoses,
    }
}

fn fetch_section<T: Transport>(
    key: &'static str,
    title: &'static str,
    config: &DiagnoseConfig,
    transport: &mut T,
    entries: &[WalkEntry],
) -> Section {
    let mut aggregator = DiagnosticAggregator::new(config.clone());
    let total = entries.len();
    let diagnoses = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            debug!(index = index + 1, total, subject = %entry.path_subject(), "fetching");
            aggregator
                .diagnose_fetched(&mut *transport, entry.path_subject())
                .ok()
        })
        .collect();
    Section {
        key,
        title,
        report: aggregator.finalize(),
        diagnoses,
    }
}

/// Uploads every entry, returning the section and the entries that made it
/// onto the device.
fn upload_section(
    config: &DiagnoseConfig,
    uploader: &mut Uploader,
    entries: &[WalkEntry],
) -> (Section, Vec<WalkEntry>) {
    let mut aggregator = DiagnosticAggregator::new(config.clone());
    let mut uploaded = Vec::new();
    let mut diagnoses = Vec::new();
    let total = entries.len();
    for (index, entry) in entries.iter().enumerate() {
        let subject = entry.path_subject();
        debug!(index = index + 1, total, subject = %subject, "uploading");
        match uploader.upload(entry, config.timeout) {
            Ok(()) => {
                aggregator.record_clean(subject);
                uploaded.push(entry.clone());
            }
            Err(error) => {
                diagnoses.push(diagnose(subject.clone(), &entry.name_bytes()));
                aggregator.record_transport_error(subject, error);
            }
        }
    }
    let section = Section {
        key: "upload",
        title: "Device upload",
        report: aggregator.finalize(),
        diagnoses,
    };
    (section, uploaded)
}

fn print_sections(sections: &[Section], json: bool) -> Result<(), i32> {
    if json {
        let mut doc = serde_json::Map::new();
        for section in sections {
            let value = render_json(&section.report).map_err(|e| {
                eprintln!("error: failed to serialize report: {e}");
                1
            })?;
            doc.insert(section.key.to_string(), value);
        }
        let text = serde_json::to_string_pretty(&serde_json::Value::Object(doc)).map_err(|e| {
            eprintln!("error: failed to serialize report: {e}");
            1
        })?;
        println!("{text}");
        return Ok(());
    }

    if let Err(e) = write_summaries(sections) {
        eprintln!("error: failed to write report: {e}");
        return Err(1);
    }
    Ok(())
}

fn write_summaries(sections: &[Section]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        render_summary(&mut out, section.title, &section.report)?;
    }
    Ok(())
}

fn write_results(path: &Path, sections: &[Section]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for (index, section) in sections.iter().enumerate() {
        if index > 0 {
            writeln!(file)?;
        }
        render_details(&mut file, section.title, &section.diagnoses)?;
    }
    file.flush()
}

fn run_scan(args: &ScanArgs) -> Result<(), i32> {
    let exclude: Vec<PathBuf> = args.output.iter().cloned().collect();
    let found = walk(&args.dir, &exclude).map_err(|e| {
        eprintln!("error: cannot read {}: {e}", args.dir.display());
        1
    })?;
    let entries: Vec<WalkEntry> = found
        .entries
        .into_iter()
        .filter(|entry| !is_skipped(entry, &args.skip_ext))
        .collect();
    info!(root = %args.dir.display(), files = entries.len(), "scanning");

    let config = DiagnoseConfig::default()
        .with_target(args.target.clone())
        .with_timeout(args.timeout)
        .with_preview_len(args.preview_len);

    let mut sections = vec![name_section(&config, &entries, &found.unreadable)];

    if args.content {
        let mut local = FsTransport::new(&args.dir);
        sections.push(fetch_section(
            "contents",
            "File contents",
            &config,
            &mut local,
            &entries,
        ));
    }

    let dest = args.dest.as_deref().unwrap_or("");
    let uploaded = if args.upload {
        let mut uploader = Uploader::for_target(
            args.copy_cmd.as_deref(),
            args.mkdir_cmd.as_deref(),
            &args.target,
        )
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })?
        .with_dest(dest);
        let (section, on_device) = upload_section(&config, &mut uploader, &entries);
        sections.push(section);
        Some(on_device)
    } else {
        None
    };

    if args.remote {
        let mut device = CommandTransport::for_target(args.fetch_cmd.as_deref(), &args.target)
            .map_err(|e| {
                eprintln!("error: {e}");
                1
            })?
            .with_dest(dest);
        sections.push(fetch_section(
            "remote",
            "Device contents",
            &config,
            &mut device,
            uploaded.as_deref().unwrap_or(&entries),
        ));
    }

    print_sections(&sections, args.json)?;

    if let Some(path) = &args.output {
        if let Err(e) = write_results(path, &sections) {
            eprintln!("error: failed to write {}: {e}", path.display());
            return Err(1);
        }
        info!(path = %path.display(), "results written");
    }

    if sections.iter().any(Section::has_findings) {
        Err(2)
    } else {
        Ok(())
    }
}

fn decode_chunks(bytes: &[u8], chunk: usize, mode: ErrorMode) -> Result<String, Invalid> {
    let mut decoder = TextDecoder::new(mode);
    let mut text = String::with_capacity(bytes.len());
    for piece in bytes.chunks(chunk.max(1)) {
        text.push_str(&decoder.push(piece)?);
        debug!(
            len = piece.len(),
            pending = decoder.is_pending(),
            "decoded chunk"
        );
    }
    text.push_str(&decoder.finish()?);
    Ok(text)
}

fn run_decode(args: &DecodeArgs) -> Result<(), i32> {
    let lookup = Codec::from_name(&args.codec)
        .and_then(|codec| ErrorMode::from_name(&args.errors).map(|mode| (codec, mode)));
    let (Codec::Utf8, mode) = lookup.map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let bytes = fs::read(&args.input).map_err(|e| {
        eprintln!("error: cannot read {}: {e}", args.input.display());
        1
    })?;

    let chunk = args.chunk.unwrap_or(bytes.len());
    let text = decode_chunks(&bytes, chunk, mode).map_err(|invalid| {
        eprintln!("error: {}: {invalid}", args.input.display());
        1
    })?;

    print!("{text}");
    let hazards = classify_str(&text);
    if !hazards.is_empty() {
        eprintln!("hazards: {hazards}");
    }
    Ok(())
}

fn run_char(args: &CharArgs) -> Result<(), i32> {
    let scalar = Scalar::from_i64(args.value).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let hazards = classify(scalar);

    println!("{scalar} {:?}", scalar.as_char());
    println!(
        "UTF-8: {} ({} byte(s))",
        scalar.encode_utf8(),
        scalar.utf8_len()
    );
    if hazards.is_empty() {
        println!("Hazards: none");
    } else {
        println!("Hazards: {hazards}");
    }
    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            init_logging(command.verbose());
            let result = match &command {
                Command::Scan(args) => run_scan(args),
                Command::Decode(args) => run_decode(args),
                Command::Char(args) => run_char(args),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_scan_command_with_all_options() {
        let result = parse_scan_args(
            os(&[
                "files",
                "-t",
                "/dev/ttyACM0",
                "--timeout",
                "2.5",
                "--preview",
                "8",
                "--content",
                "--remote",
                "--fetch-cmd",
                "tool {target} {path}",
                "--upload",
                "--copy-cmd",
                "put {local} {path}",
                "--mkdir-cmd",
                "md {path}",
                "--dest",
                "/remote_data",
                "--skip-ext",
                ".py",
                "--skip-ext",
                "md",
                "--json",
                "-o",
                "out.txt",
                "-v",
            ])
            .into_iter(),
        )
        .expect("valid scan args should parse");

        assert_eq!(
            result,
            ScanArgs {
                dir: PathBuf::from("files"),
                target: "/dev/ttyACM0".to_string(),
                timeout: Duration::from_millis(2500),
                preview_len: 8,
                fetch_cmd: Some("tool {target} {path}".to_string()),
                copy_cmd: Some("put {local} {path}".to_string()),
                mkdir_cmd: Some("md {path}".to_string()),
                dest: Some("/remote_data".to_string()),
                skip_ext: vec!["py".to_string(), "md".to_string()],
                content: true,
                upload: true,
                remote: true,
                json: true,
                output: Some(PathBuf::from("out.txt")),
                verbose: true,
            }
        );
    }

    #[test]
    fn scan_defaults() {
        let result = parse_scan_args(os(&["files"]).into_iter()).expect("dir only");
        assert_eq!(result.target, "auto");
        assert_eq!(result.timeout, DEFAULT_TIMEOUT);
        assert_eq!(result.preview_len, DEFAULT_PREVIEW_LEN);
        assert!(!result.content && !result.upload && !result.remote && !result.json);
        assert!(result.skip_ext.is_empty());
        assert_eq!(result.dest, None);
    }

    #[test]
    fn oversized_timeout_parses() {
        let result = parse_scan_args(os(&["d", "--timeout", "1e19"]).into_iter())
            .expect("large but finite timeout");
        assert!(result.timeout > Duration::from_secs(1 << 62));
    }

    #[test]
    fn skipped_extensions_match_exactly() {
        let entry = |relative: &str| WalkEntry {
            path: PathBuf::from("/data").join(relative),
            relative: PathBuf::from(relative),
        };
        let skip = vec!["py".to_string(), "md".to_string()];
        assert!(is_skipped(&entry("run.py"), &skip));
        assert!(is_skipped(&entry("sub/README.md"), &skip));
        assert!(!is_skipped(&entry("notes.mdx"), &skip));
        assert!(!is_skipped(&entry("py"), &skip));
    }

    #[test]
    fn scan_rejects_bad_values() {
        let error = parse_scan_args(os(&["d", "--timeout", "-1"]).into_iter())
            .expect_err("negative timeout");
        assert!(error.contains("invalid timeout"));

        let error = parse_scan_args(os(&["d", "--preview"]).into_iter())
            .expect_err("missing value");
        assert!(error.contains("missing value for --preview"));

        let error = parse_scan_args(std::iter::empty()).expect_err("no dir");
        assert!(error.contains("missing directory"));
    }

    #[test]
    fn parses_decode_command() {
        let result = parse_decode_args(
            os(&["in.txt", "--chunk", "1", "--codec", "UTF8", "--errors", "replace"]).into_iter(),
        )
        .expect("valid decode args should parse");

        assert_eq!(
            result,
            DecodeArgs {
                input: PathBuf::from("in.txt"),
                chunk: Some(1),
                codec: "UTF8".to_string(),
                errors: "replace".to_string(),
                verbose: false,
            }
        );
    }

    #[test]
    fn decode_rejects_zero_chunk() {
        let error = parse_decode_args(os(&["in.txt", "--chunk", "0"]).into_iter())
            .expect_err("zero chunk");
        assert!(error.contains("at least 1"));
    }

    #[test]
    fn parses_code_points() {
        assert_eq!(parse_code_point("169"), Some(169));
        assert_eq!(parse_code_point("0xA9"), Some(0xA9));
        assert_eq!(parse_code_point("U+1F600"), Some(0x1F600));
        assert_eq!(parse_code_point("-1"), Some(-1));
        assert_eq!(parse_code_point("-0x10"), Some(-16));
        assert_eq!(parse_code_point("0x"), None);
        assert_eq!(parse_code_point("abc"), None);
    }

    #[test]
    fn char_accepts_negative_values_but_not_options() {
        let args = parse_char_args(os(&["-5"]).into_iter()).expect("negative value");
        assert_eq!(args, CharArgs { value: -5 });

        let error = parse_char_args(os(&["--verbose"]).into_iter()).expect_err("not a value");
        assert!(error.contains("unknown option"));

        let error = parse_char_args(os(&["1", "2"]).into_iter()).expect_err("two values");
        assert!(error.contains("multiple code points"));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(os(&["--help"]).into_iter())
            .expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(os(&["unknown"]).into_iter())
            .expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn chunked_decoding_is_chunk_size_independent() {
        let bytes = "caf\u{e9} \u{1F600} \u{4F60}\u{597D}".as_bytes();
        let whole = decode_chunks(bytes, bytes.len(), ErrorMode::Strict).expect("valid");
        for chunk in 1..=bytes.len() {
            assert_eq!(
                decode_chunks(bytes, chunk, ErrorMode::Strict),
                Ok(whole.clone()),
                "chunk size {chunk}"
            );
        }
    }

    #[test]
    fn chunked_decoding_reports_truncation() {
        let err = decode_chunks(b"ok\xe2\x82", 1, ErrorMode::Strict).expect_err("truncated");
        assert_eq!(err.offset, 2);
        assert_eq!(
            decode_chunks(b"ok\xe2\x82", 1, ErrorMode::Replace),
            Ok("ok\u{FFFD}".to_string())
        );
    }
}
