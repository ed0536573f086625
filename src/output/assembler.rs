//! Ordered assembly of rendered pages
//!
//! Rendered artifacts are merged in lexicographic order of their local
//! paths, so the same set of pages always produces the same document.

use crate::command::is_non_empty_file;
use crate::output::merge::Merger;
use crate::workspace::{LogKind, RunLogs};
use crate::SiteBookError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a successful merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Number of documents merged
    pub merged: usize,

    /// Number of pages left out because they failed to render
    pub excluded: usize,

    /// The merged document
    pub output: PathBuf,
}

/// Sorts rendered artifacts into merge order
///
/// # Example
///
/// ```
/// use sitebook::output::merge_order;
/// use std::path::PathBuf;
///
/// let rendered: Vec<PathBuf> = ["b.pdf", "a_b.pdf", "a.pdf"].iter().map(PathBuf::from).collect();
/// let order = merge_order(&rendered);
/// assert_eq!(order[0], PathBuf::from("a.pdf"));
/// assert_eq!(order[2], PathBuf::from("b.pdf"));
/// ```
pub fn merge_order(rendered: &[PathBuf]) -> Vec<PathBuf> {
    let mut order = rendered.to_vec();
    order.sort();
    order.dedup();
    order
}

/// Merges rendered pages through a [`Merger`]
pub struct Assembler {
    merger: Arc<dyn Merger>,
    logs: Arc<RunLogs>,
}

impl Assembler {
    pub fn new(merger: Arc<dyn Merger>, logs: Arc<RunLogs>) -> Self {
        Self { merger, logs }
    }

    /// Merges `rendered` into `output`
    ///
    /// # Steps
    ///
    /// 1. Sort the artifacts by local path
    /// 2. Fail with `NoSuccessfulRenders` when there is nothing to merge
    /// 3. Record the input order in `merge.log` and call the merger
    /// 4. Check that the output exists and is non-empty
    ///
    /// # Errors
    ///
    /// * `NoSuccessfulRenders` - `rendered` is empty
    /// * `MergeFailed` - the merger failed or left no output
    pub async fn assemble(
        &self,
        rendered: &[PathBuf],
        excluded: usize,
        output: &Path,
    ) -> Result<MergeReport, SiteBookError> {
        let order = merge_order(rendered);

        if order.is_empty() {
            return Err(SiteBookError::NoSuccessfulRenders {
                failed: excluded,
                log: self.logs.path(LogKind::Render).to_path_buf(),
            });
        }

        let merge_log = self.logs.get(LogKind::Merge);
        merge_log.record(&format!(
            "merging {} documents into {} ({} excluded)",
            order.len(),
            output.display(),
            excluded
        ));
        for (position, path) in order.iter().enumerate() {
            merge_log.record(&format!("{:>4} {}", position + 1, path.display()));
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let diagnostics = match self.merger.merge(&order, output).await {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                merge_log.record(&format!("merge failed: {}", e));
                return Err(self.merge_failed(e.to_string()));
            }
        };
        if !diagnostics.is_empty() {
            merge_log.record(&diagnostics);
        }

        if !is_non_empty_file(output).await {
            let message = format!("{} is missing or empty", output.display());
            merge_log.record(&format!("merge failed: {}", message));
            return Err(self.merge_failed(message));
        }

        tracing::info!("Merged {} documents into {}", order.len(), output.display());

        Ok(MergeReport {
            merged: order.len(),
            excluded,
            output: output.to_path_buf(),
        })
    }

    fn merge_failed(&self, message: String) -> SiteBookError {
        SiteBookError::MergeFailed {
            message,
            log: self.logs.path(LogKind::Merge).to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::merge::MergeError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes the input names into the output, one per line
    #[derive(Default)]
    struct ListingMerger {
        calls: Mutex<Vec<Vec<PathBuf>>>,
    }

    #[async_trait]
    impl Merger for ListingMerger {
        async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<String, MergeError> {
            self.calls.lock().unwrap().push(inputs.to_vec());
            let listing: Vec<_> = inputs.iter().map(|p| p.display().to_string()).collect();
            tokio::fs::write(output, listing.join("\n")).await.unwrap();
            Ok(String::new())
        }
    }

    struct BrokenMerger;

    #[async_trait]
    impl Merger for BrokenMerger {
        async fn merge(&self, _inputs: &[PathBuf], _output: &Path) -> Result<String, MergeError> {
            Err(MergeError::Failed("corrupt input".to_string()))
        }
    }

    fn logs(dir: &Path) -> Arc<RunLogs> {
        let logs_dir = dir.join("logs");
        std::fs::create_dir_all(&logs_dir).unwrap();
        Arc::new(RunLogs::open(&logs_dir).unwrap())
    }

    #[test]
    fn test_merge_order_is_deterministic() {
        let rendered = vec![
            PathBuf::from("r/guide_b.pdf"),
            PathBuf::from("r/index.pdf"),
            PathBuf::from("r/guide.pdf"),
            PathBuf::from("r/guide_a.pdf"),
        ];
        let mut shuffled = rendered.clone();
        shuffled.reverse();

        assert_eq!(merge_order(&rendered), merge_order(&shuffled));
        assert_eq!(
            merge_order(&rendered),
            vec![
                PathBuf::from("r/guide.pdf"),
                PathBuf::from("r/guide_a.pdf"),
                PathBuf::from("r/guide_b.pdf"),
                PathBuf::from("r/index.pdf"),
            ]
        );
    }

    #[tokio::test]
    async fn test_assemble_twice_gives_identical_order() {
        let dir = tempfile::tempdir().unwrap();
        let merger = Arc::new(ListingMerger::default());
        let assembler = Assembler::new(merger.clone(), logs(dir.path()));
        let rendered = vec![PathBuf::from("b.pdf"), PathBuf::from("a.pdf")];

        let first = assembler
            .assemble(&rendered, 1, &dir.path().join("one.pdf"))
            .await
            .unwrap();
        let reversed: Vec<_> = rendered.iter().rev().cloned().collect();
        assembler
            .assemble(&reversed, 1, &dir.path().join("two.pdf"))
            .await
            .unwrap();

        assert_eq!(first.merged, 2);
        assert_eq!(first.excluded, 1);
        let calls = merger.calls.lock().unwrap();
        assert_eq!(calls[0], calls[1]);
        assert_eq!(
            std::fs::read(dir.path().join("one.pdf")).unwrap(),
            std::fs::read(dir.path().join("two.pdf")).unwrap()
        );
    }

    #[tokio::test]
    async fn test_nothing_to_merge() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(Arc::new(ListingMerger::default()), logs(dir.path()));

        let result = assembler.assemble(&[], 3, &dir.path().join("out.pdf")).await;
        assert!(matches!(
            result,
            Err(SiteBookError::NoSuccessfulRenders { failed: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_merge_failure_is_fatal_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let logs = logs(dir.path());
        let assembler = Assembler::new(Arc::new(BrokenMerger), logs.clone());

        let result = assembler
            .assemble(&[PathBuf::from("a.pdf")], 0, &dir.path().join("out.pdf"))
            .await;

        match result {
            Err(e @ SiteBookError::MergeFailed { .. }) => assert_eq!(e.exit_code(), 6),
            other => panic!("unexpected result: {:?}", other),
        }
        let log = std::fs::read_to_string(logs.path(LogKind::Merge)).unwrap();
        assert!(log.contains("a.pdf"));
        assert!(log.contains("corrupt input"));
    }
}
