use std::path::Path;
use std::process::{Command, Output};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A two-version source tree with one shared document.
fn fixture(root: &Path) {
    let src = root.join("src");
    let guide = "\
:::tip Read first
See the [intro](../00-intro.md#setup) and [`Client`](https://docs.rs/client).
:::

![flow](./flow.png)
";
    write(&src, "next/00-intro.md", "---\ntitle: Intro\n---\n# Intro\n<!-- internal note -->\n");
    write(&src, "next/01-learn/01-guide.md", guide);
    write(&src, "next/01-learn/flow.png", "png");
    write(&src, "version-0.52/00-intro.md", "# Intro\n");
    write(&src, "version-0.52/01-learn/01-guide.md", guide);
    write(&src, "version-0.52/01-learn/flow.png", "png");
}

fn docmigrate(root: &Path, extra: &[&str]) -> Output {
    return Command::new(env!("CARGO_BIN_EXE_docmigrate"))
        .current_dir(root)
        .args(["src", "out/docs", "sdk"])
        .args(extra)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
}

#[test]
fn migrates_documents_and_images() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let run = docmigrate(dir.path(), &[]);
    assert!(run.status.success(), "stderr: {}", String::from_utf8_lossy(&run.stderr));

    let guide = std::fs::read_to_string(dir.path().join("out/docs/v0.52/learn/guide.mdx")).unwrap();
    assert!(guide.contains("<Tip>\n**Read first**\n"), "{guide}");
    assert!(guide.contains("[intro](/sdk/v0.52/intro#setup)"), "{guide}");
    assert!(guide.contains("[Client](https://docs.rs/client)"), "{guide}");
    assert!(guide.contains("![flow](/assets/sdk/images/01-learn/flow.png)"), "{guide}");

    let intro = std::fs::read_to_string(dir.path().join("out/docs/next/intro.mdx")).unwrap();
    assert!(intro.starts_with("---\ntitle: Intro\n---\n"), "{intro}");
    assert!(intro.contains("{/* internal note */}"), "{intro}");

    assert!(dir.path().join("out/assets/sdk/images/01-learn/flow.png").exists());

    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("- documents processed: 4"), "{stdout}");
    assert!(stdout.contains("- transformer runs: 3 (cache hits: 1)"), "{stdout}");
}

#[test]
fn dry_run_writes_nothing_and_reports_the_same() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let dry = docmigrate(dir.path(), &["--dry-run", "--update-nav"]);
    assert!(dry.status.success());
    assert!(!dir.path().join("out").exists());
    assert!(!dir.path().join("docs.json").exists());

    let real = docmigrate(dir.path(), &["--update-nav"]);
    assert!(real.status.success());
    assert_eq!(dry.stdout, real.stdout);
    assert!(dir.path().join("docs.json").exists());
}

#[test]
fn staging_leaves_real_destinations_alone() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let run = docmigrate(dir.path(), &["--staging=stage", "--update-nav"]);
    assert!(run.status.success(), "stderr: {}", String::from_utf8_lossy(&run.stderr));
    assert!(!dir.path().join("out").exists());
    assert!(!dir.path().join("docs.json").exists());
    assert!(dir.path().join("stage/target/next/learn/guide.mdx").exists());
    assert!(dir.path().join("stage/assets/sdk/images/01-learn/flow.png").exists());
    assert!(dir.path().join("stage/nav/docs.json").exists());

    let guide = std::fs::read_to_string(dir.path().join("stage/target/next/learn/guide.mdx")).unwrap();
    assert!(guide.contains("/sdk/next/intro#setup"));
}

#[test]
fn content_error_fails_the_run_but_writes_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(&dir.path().join("src"), "next/broken.md", ":::note\nnever closed\n");

    let run = docmigrate(dir.path(), &[]);
    assert_eq!(run.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("## Errors"), "{stdout}");
    assert!(stdout.contains("admonition is never closed"), "{stdout}");
    assert!(dir.path().join("out/docs/next/broken.mdx").exists());
    assert!(dir.path().join("out/docs/next/intro.mdx").exists());
}

#[test]
fn corrupt_nav_file_is_fatal_before_anything_is_written() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(&dir.path().join("src"), "next/a.md", ":::note\nnever closed\n");
    write(dir.path(), "docs.json", "{not json");

    let run = docmigrate(dir.path(), &["--update-nav"]);
    assert_eq!(run.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&run.stderr);
    assert!(stderr.contains("Navigation File Corrupt"), "{stderr}");
    assert!(!dir.path().join("out").exists());
    assert_eq!(std::fs::read_to_string(dir.path().join("docs.json")).unwrap(), "{not json");
}

#[test]
fn html_anchor_links_are_rewritten_and_checked() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(
        &dir.path().join("src"),
        "next/01-learn/02-links.md",
        "<a href=\"./01-guide.md\">guide</a> <a href=\"./99-gone.md\">gone</a>\n",
    );

    let run = docmigrate(dir.path(), &[]);
    assert!(run.status.success(), "stderr: {}", String::from_utf8_lossy(&run.stderr));
    let links = std::fs::read_to_string(dir.path().join("out/docs/next/learn/links.mdx")).unwrap();
    assert!(links.contains("<a href=\"/sdk/next/learn/guide\">guide</a>"), "{links}");
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("`/sdk/next/learn/gone` is not a migrated page"), "{stdout}");
}

#[test]
fn excluded_images_are_not_copied() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(&dir.path().join("src"), "next/drafts/secret.png", "png");
    write(&dir.path().join("src"), ".docmigrate.toml", "exclude = [\"drafts/\"]\n");

    let run = docmigrate(dir.path(), &[]);
    assert!(run.status.success(), "stderr: {}", String::from_utf8_lossy(&run.stderr));
    assert!(dir.path().join("out/assets/sdk/images/01-learn/flow.png").exists());
    assert!(!dir.path().join("out/assets/sdk/images/drafts/secret.png").exists());
}

#[test]
fn warnings_alone_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(&dir.path().join("src"), "next/odd.md", ":::aside\nhello\n:::\n");

    let run = docmigrate(dir.path(), &["--dry-run"]);
    assert_eq!(run.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&run.stdout);
    assert!(stdout.contains("## Warnings"), "{stdout}");
    assert!(!stdout.contains("## Errors"), "{stdout}");
}

#[test]
fn missing_source_root_is_a_fatal_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let run = docmigrate(dir.path(), &[]);
    assert_eq!(run.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&run.stderr).contains("Source Root Not Found"));
}

#[test]
fn dry_run_and_staging_conflict() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let run = docmigrate(dir.path(), &["--dry-run", "--staging"]);
    assert!(!run.status.success());
}
