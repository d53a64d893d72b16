use std::fmt::Write as _;
use std::path::Path;

use crate::config::CONFIG_FILE_NAME;
use crate::error::Error;

/// ANSI bold, used for headings on stderr.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render a fatal error as markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render a fatal error as a markdown diagnostic: what happened, then how
/// to fix it when there is something the user can do.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => render_config_not_found(path),
        Error::NavCorrupt { path, reason } => render_nav_corrupt(path, reason),
        Error::NoVersionRoots { path } => render_no_version_roots(path),
        Error::OutputRootUnwritable { path, source } => format!(
            "\
# Error: Output Not Writable

Cannot create `{}`: {source}

## Fix

Check permissions, or pick another target with `--staging=DIR`.
",
            path.display()
        ),
        Error::SourceRootNotFound { path } => format!(
            "\
# Error: Source Root Not Found

`{}` does not exist or is not a directory.
",
            path.display()
        ),
        Error::VersionNotFound { label, path } => format!(
            "\
# Error: Version Not Found

Version `{label}` points at `{}`, which is not a directory.

## Fix

Correct the `[[versions]]` entry in `{CONFIG_FILE_NAME}`.
",
            path.display()
        ),
        Error::TomlDe(err) => format!(
            "\
# Error: Invalid Config

{err}

## Fix

Valid keys: `assets_root`, `assets_url`, `check_links`, `exclude`, `include`,
`image_extensions`, `nav_file`, `source_extensions`, `target_extension`,
`[front_matter] rewrite`, `[[versions]]`.
"
        ),
        Error::Io(err) => format!(
            "\
# Error: I/O

{err}
"
        ),
        Error::Json(err) => format!(
            "\
# Error: JSON

{err}
"
        ),
    };
}

/// Explicit `--config` path missing.
fn render_config_not_found(path: &Path) -> String {
    return format!(
        "\
# Error: Config Not Found

`{}` does not exist.

## Fix

Drop `--config` to use `{CONFIG_FILE_NAME}` from the source root, or defaults.
",
        path.display()
    );
}

/// Navigation manifest unreadable as JSON or wrong shape.
fn render_nav_corrupt(path: &Path, reason: &str) -> String {
    return format!(
        "\
# Error: Navigation File Corrupt

`{}`: {reason}

## Fix

The file must be a JSON object whose `navigation` key, if present, is an
array. Fix it by hand or point `nav_file` in `{CONFIG_FILE_NAME}` elsewhere.
",
        path.display()
    );
}

/// Source root without version subdirectories.
fn render_no_version_roots(path: &Path) -> String {
    let mut out = format!(
        "\
# Error: No Versions

`{}` has no version directories.
",
        path.display()
    );
    out.push_str("\n## Fix\n\n");
    let _ = writeln!(out, "Put each version in its own subdirectory (`next/`, `version-1.0/`),");
    let _ = writeln!(out, "or list them in `{CONFIG_FILE_NAME}`:");
    out.push_str("\n    [[versions]]\n    label = \"next\"\n    dir = \"docs\"\n");
    return out;
}
