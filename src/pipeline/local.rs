use super::{render_and_merge, RunContext};
use crate::output::{RunMode, RunResult, RunSummary};
use crate::render::RenderJob;
use crate::url::flatten_relative;
use crate::SiteBookError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// Renders every HTML file under `dir` and merges the result
///
/// Each file renders with its own directory as the base, so relative
/// stylesheets and images next to it resolve.
///
/// # Errors
///
/// * `NoInputFound` - `dir` is not a directory or holds no HTML files
/// * `NoSuccessfulRenders` / `MergeFailed` - see [`crate::output::Assembler`]
/// * `Interrupted` - Ctrl-C arrived before the merge
pub async fn run_local(
    ctx: &RunContext,
    dir: &Path,
    output: &Path,
) -> Result<RunResult, SiteBookError> {
    let result = render_directory(ctx, dir, output).await;
    ctx.export_debug();
    result
}

async fn render_directory(
    ctx: &RunContext,
    dir: &Path,
    output: &Path,
) -> Result<RunResult, SiteBookError> {
    ctx.record_header("local", &dir.display().to_string(), output);

    if !dir.is_dir() {
        return Err(SiteBookError::NoInputFound {
            reason: format!("{} is not a directory", dir.display()),
        });
    }
    let root = fs::canonicalize(dir)?;

    let files = discover_html(&root)?;
    if files.is_empty() {
        return Err(SiteBookError::NoInputFound {
            reason: format!("no .html or .htm files under {}", dir.display()),
        });
    }
    tracing::info!("Found {} HTML files under {}", files.len(), dir.display());

    let rendered_dir = ctx.workspace().rendered_dir();
    let jobs = files
        .iter()
        .map(|relative| render_job(&root, relative, &rendered_dir))
        .collect();

    let summary = RunSummary {
        pages_crawled: files.len(),
        ..Default::default()
    };

    render_and_merge(ctx, RunMode::Local, summary, jobs, output).await
}

fn render_job(root: &Path, relative: &Path, rendered_dir: &Path) -> RenderJob {
    let html = root.join(relative);
    let base_dir = html.parent().unwrap_or(root).to_path_buf();

    RenderJob {
        html,
        base_dir,
        output: rendered_dir.join(format!("{}.pdf", flatten_relative(relative))),
    }
}

/// Finds HTML files under `root`, returned relative to it and sorted
///
/// Hidden directories are skipped. Symlinked directories are not followed.
pub fn discover_html(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type()?.is_dir() {
                if !is_hidden(&path) {
                    pending.push(path);
                }
            } else if path.is_file() && is_html(&path) {
                if let Ok(relative) = path.strip_prefix(root) {
                    found.push(relative.to_path_buf());
                }
            }
        }
    }

    found.sort();
    Ok(found)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            HTML_EXTENSIONS
                .iter()
                .any(|html| ext.to_string_lossy().eq_ignore_ascii_case(html))
        })
        .unwrap_or(false)
}
