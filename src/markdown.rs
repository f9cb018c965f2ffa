//! Markdown preview — render the draft to HTML and hand it to the browser.
//!
//! pulldown-cmark does the conversion; this module only wraps the output in
//! a styled document shell, writes `preview.html` to the work dir, and
//! spawns the platform opener. Rendering is pure and tested; the browser
//! hand-off is fire-and-forget.

use std::path::{Path, PathBuf};
use std::process::Command;

use pulldown_cmark::{html, Options, Parser};
use tracing::info;

use crate::error::AppError;

const PREVIEW_FILENAME: &str = "preview.html";

const DOCUMENT_STYLE: &str = r#"
body {
    font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
    background-color: #f4f4f4;
    color: #333;
    margin: 20px;
}
.markdown-body {
    background-color: #fff;
    padding: 20px;
    border-radius: 8px;
    box-shadow: 0 4px 8px rgba(0, 0, 0, 0.1);
    max-width: 52rem;
    margin: 0 auto;
}
pre {
    background-color: #2d2d2d;
    color: #fff;
    padding: 10px;
    border-radius: 5px;
    overflow-x: auto;
}
code {
    background-color: #f0f0f0;
    padding: 2px 4px;
    border-radius: 3px;
    font-family: 'Courier New', Courier, monospace;
}
pre code {
    background-color: transparent;
    padding: 0;
}
blockquote {
    border-left: 4px solid #ccc;
    margin-left: 0;
    padding-left: 1em;
    color: #666;
}
"#;

/// Convert markdown to an HTML fragment (tables, footnotes, strikethrough,
/// task lists enabled).
pub fn render_fragment(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap a rendered fragment in a complete standalone document.
pub fn render_document(markdown: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <style>{DOCUMENT_STYLE}</style>\n</head>\n\
         <body class=\"markdown-body\">\n{}</body>\n</html>\n",
        render_fragment(markdown)
    )
}

/// Render `markdown` to `preview.html` in `work_dir` and return the path.
pub fn write_preview(work_dir: &Path, markdown: &str) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(work_dir)
        .map_err(|e| AppError::Markdown(format!("cannot create {}: {e}", work_dir.display())))?;
    let path = work_dir.join(PREVIEW_FILENAME);
    std::fs::write(&path, render_document(markdown))
        .map_err(|e| AppError::Markdown(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), "markdown preview written");
    Ok(path)
}

/// Render and open the preview in the default browser.
pub fn open_preview(work_dir: &Path, markdown: &str) -> Result<PathBuf, AppError> {
    let path = write_preview(work_dir, markdown)?;
    open_in_browser(&path);
    Ok(path)
}

fn open_in_browser(path: &Path) {
    #[cfg(target_os = "macos")]
    let result = Command::new("open").arg(path).spawn();
    #[cfg(target_os = "windows")]
    let result = Command::new("cmd").args(["/C", "start", ""]).arg(path).spawn();
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let result = Command::new("xdg-open").arg(path).spawn();

    if let Err(e) = result {
        tracing::warn!(error = %e, "could not open browser for preview");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn renders_basic_elements() {
        let html = render_fragment("# Title\n\nSome *emphasis* and `code`.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn renders_tables_extension() {
        let html = render_fragment("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn renders_strikethrough_extension() {
        let html = render_fragment("~~gone~~");
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn document_is_standalone_html() {
        let doc = render_document("hello");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("markdown-body"));
        assert!(doc.contains("<p>hello</p>"));
        assert!(doc.ends_with("</html>\n"));
    }

    #[test]
    fn write_preview_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = write_preview(dir.path(), "# Draft").unwrap();
        assert!(path.exists());
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("<h1>Draft</h1>"));
    }
}
