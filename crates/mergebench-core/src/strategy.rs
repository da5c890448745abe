use crate::model::{MergeOutput, Scenario};

/// Trait that every candidate merge mechanism must satisfy.
///
/// The harness only ever talks to strategies through this contract, so how a
/// mechanism is located or launched stays an adapter detail.
#[async_trait::async_trait]
pub trait MergeStrategy: Send + Sync + 'static {
    /// Name used in reports and in the result schema (e.g. "diff3")
    fn name(&self) -> &str;

    /// Whether the backing mechanism can be located. Must return after a
    /// bounded discovery check.
    async fn available(&self) -> bool;

    /// Merge the scenario's three artifacts.
    ///
    /// A non-zero exit that is the mechanism's normal way of reporting
    /// conflicts maps to CONFLICTS. Every other abnormal ending maps to FAILED
    /// with the diagnostic in `stderr_text`. Never called when `available()`
    /// returned false.
    async fn run(&self, scenario: &Scenario) -> MergeOutput;
}

/// Conflict marker prefixes left behind by line-based and structural tools.
pub const CONFLICT_MARKERS: [&str; 4] = ["<<<<<<<", "|||||||", "=======", ">>>>>>>"];

/// True if any line of `text` starts with a conflict marker.
pub fn has_conflict_markers(text: &str) -> bool {
    text.lines()
        .any(|line| CONFLICT_MARKERS.iter().any(|m| line.starts_with(m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_markers_only_at_line_start() {
        let merged = "a\n<<<<<<< left\nb\n=======\nc\n>>>>>>> right\n";
        assert!(has_conflict_markers(merged));
        assert!(!has_conflict_markers("let s = \"<<<<<<<\";\n"));
        assert!(!has_conflict_markers(""));
    }
}
