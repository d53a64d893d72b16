//! Static check of internal document links against the pages a run produced.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::report::Report;
use crate::types::{Issue, RenderedLink};

/// A rendered link together with the file it was found in.
#[derive(Debug, Clone)]
pub struct CheckedLink {
    /// Report name of the containing file.
    pub file: PathBuf,
    /// The resolved link.
    pub link: RenderedLink,
}

/// Warn about every link into `/<product>/` whose page is not in `produced`.
///
/// `produced` holds page URLs (`/<product>/<version>/<page>`). Fragments and
/// queries are ignored; a link to a directory also matches its `index` page.
/// Links outside the product namespace are not checked.
pub fn check(links: &[CheckedLink], produced: &BTreeSet<String>, product: &str, report: &mut Report) {
    let namespace = format!("/{product}/");

    for entry in links {
        let page = page_of(&entry.link.target);
        if !page.starts_with(&namespace) {
            continue;
        }
        report.counters.links_checked = report.counters.links_checked.saturating_add(1);

        if produced.contains(page) || produced.contains(&format!("{page}/index")) {
            continue;
        }

        let mut issue = Issue::warning(entry.link.line, format!("link target `{page}` is not a migrated page"));
        if let Some(nearest) = nearest_page(page, produced) {
            issue = issue.with_suggestion(format!("did you mean `{nearest}`?"));
        }
        report.record_one(&entry.file, issue);
    }
}

/// Target without fragment, query or trailing slash.
fn page_of(target: &str) -> &str {
    let end = target.find(['#', '?']).unwrap_or(target.len());
    let page = target.get(..end).unwrap_or(target);
    return page.strip_suffix('/').unwrap_or(page);
}

/// A produced page sharing the final segment, preferring one in the same
/// version.
fn nearest_page<'p>(page: &str, produced: &'p BTreeSet<String>) -> Option<&'p str> {
    let (prefix, name) = page.rsplit_once('/')?;
    let version_root: String = prefix.split('/').take(3).collect::<Vec<_>>().join("/");

    let mut same_name = produced
        .iter()
        .filter(|p| return p.rsplit_once('/').is_some_and(|(_, last)| return last == name));
    let first = same_name.next()?;
    if first.starts_with(&version_root) {
        return Some(first.as_str());
    }
    let in_version = same_name.find(|p| return p.starts_with(&version_root));
    return Some(in_version.map_or(first.as_str(), String::as_str));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueKind;

    fn link(target: &str) -> CheckedLink {
        return CheckedLink {
            file: PathBuf::from("next/a.md"),
            link: RenderedLink { line: 2, target: target.to_string() },
        };
    }

    fn produced(pages: &[&str]) -> BTreeSet<String> {
        return pages.iter().map(|p| p.to_string()).collect();
    }

    #[test]
    fn existing_pages_pass_with_fragments_and_queries() {
        let mut report = Report::new();
        let pages = produced(&["/sdk/next/learn/intro", "/sdk/next/guide/index"]);
        let links = [
            link("/sdk/next/learn/intro#setup"),
            link("/sdk/next/learn/intro?tab=1"),
            link("/sdk/next/guide/"),
        ];
        check(&links, &pages, "sdk", &mut report);
        assert!(report.issues().is_empty());
        assert_eq!(report.counters.links_checked, 3);
    }

    #[test]
    fn missing_page_warns_with_suggestion() {
        let mut report = Report::new();
        let pages = produced(&["/sdk/v1/concepts", "/sdk/next/learn/concepts"]);
        check(&[link("/sdk/next/concepts")], &pages, "sdk", &mut report);

        let issues = report.issues();
        assert_eq!(issues.len(), 1);
        let first = issues.first().unwrap();
        assert_eq!(first.issue.kind, IssueKind::Warning);
        assert_eq!(first.issue.suggestion.as_deref(), Some("did you mean `/sdk/next/learn/concepts`?"));
    }

    #[test]
    fn other_namespaces_are_not_checked() {
        let mut report = Report::new();
        check(&[link("/other/next/page"), link("/docs/intro")], &BTreeSet::new(), "sdk", &mut report);
        assert!(report.issues().is_empty());
        assert_eq!(report.counters.links_checked, 0);
    }
}
