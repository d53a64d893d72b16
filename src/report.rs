//! Run-wide collection of issues and counters, rendered as a markdown summary.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::types::{Issue, IssueKind, TransformIssue};

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Prepare-phase lookups answered from the cache.
    pub cache_hits: usize,
    /// Source documents read and rendered.
    pub documents: usize,
    /// Documents dispatched to the writer.
    pub documents_written: usize,
    /// Images dispatched to the writer.
    pub images_copied: usize,
    /// Internal links checked against produced pages.
    pub links_checked: usize,
    /// Times the prepare phase actually ran.
    pub transformer_runs: usize,
}

/// Accumulates issues for one run. Scoped to a run, never global.
#[derive(Debug, Default)]
pub struct Report {
    /// Run counters.
    pub counters: Counters,
    /// Every issue, in arrival order.
    issues: Vec<TransformIssue>,
}

impl Report {
    /// An empty report.
    pub fn new() -> Self {
        return Self::default();
    }

    /// Attribute a batch of issues to `file`.
    pub fn record(&mut self, file: &Path, issues: &[Issue]) {
        for issue in issues {
            self.record_one(file, issue.clone());
        }
    }

    /// Attribute one issue to `file`.
    pub fn record_one(&mut self, file: &Path, issue: Issue) {
        match issue.kind {
            IssueKind::Error => log::debug!("{}:{}: error: {}", file.display(), issue.line, issue.message),
            IssueKind::Warning => log::debug!("{}:{}: warning: {}", file.display(), issue.line, issue.message),
        }
        self.issues.push(TransformIssue { file: file.to_path_buf(), issue });
    }

    /// Number of issues of `kind`.
    pub fn count(&self, kind: IssueKind) -> usize {
        return self.issues.iter().filter(|i| return i.issue.kind == kind).count();
    }

    /// Whether any error-kind issue was recorded.
    pub fn has_errors(&self) -> bool {
        return self.count(IssueKind::Error) > 0;
    }

    /// All recorded issues.
    pub fn issues(&self) -> &[TransformIssue] {
        return &self.issues;
    }

    /// `0` without errors, `1` otherwise. Warnings never fail a run.
    pub fn exit_code(&self) -> ExitCode {
        if self.has_errors() {
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    /// Render the summary: issues grouped by kind, then by file, then by
    /// line, followed by the counters. Output is deterministic for a given
    /// set of issues regardless of arrival order.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (kind, heading) in [(IssueKind::Error, "Errors"), (IssueKind::Warning, "Warnings")] {
            let mut by_file: BTreeMap<&PathBuf, Vec<&Issue>> = BTreeMap::new();
            for entry in self.issues.iter().filter(|i| return i.issue.kind == kind) {
                by_file.entry(&entry.file).or_default().push(&entry.issue);
            }
            if by_file.is_empty() {
                continue;
            }

            let _ = writeln!(out, "## {heading}\n");
            for (file, mut issues) in by_file {
                issues.sort_by(|a, b| return (a.line, &a.message).cmp(&(b.line, &b.message)));
                let _ = writeln!(out, "### {}\n", file.display());
                for issue in issues {
                    if issue.line == 0 {
                        let _ = writeln!(out, "- {}", issue.message);
                    } else {
                        let _ = writeln!(out, "- line {}: {}", issue.line, issue.message);
                    }
                    if let Some(suggestion) = &issue.suggestion {
                        let _ = writeln!(out, "  fix: {suggestion}");
                    }
                }
                out.push('\n');
            }
        }

        let c = &self.counters;
        out.push_str("## Summary\n\n");
        let _ = writeln!(out, "- documents processed: {}", c.documents);
        let _ = writeln!(out, "- transformer runs: {} (cache hits: {})", c.transformer_runs, c.cache_hits);
        let _ = writeln!(out, "- documents written: {}", c.documents_written);
        let _ = writeln!(out, "- images copied: {}", c.images_copied);
        let _ = writeln!(out, "- internal links checked: {}", c.links_checked);
        let _ = writeln!(
            out,
            "- {} error(s), {} warning(s)",
            self.count(IssueKind::Error),
            self.count(IssueKind::Warning)
        );
        return out;
    }
}
