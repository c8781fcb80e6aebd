//! Display targets for rendered widget state.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use gauge_protocol::{VisualState, WidgetId};
use tracing::trace;

use crate::config::widgets_dir;

/// Somewhere rendered widget state is shown.
pub trait DisplaySurface {
    /// Every target currently registered.
    fn targets(&self) -> Vec<WidgetId>;

    fn contains(&self, id: &WidgetId) -> bool;

    fn show(&mut self, id: &WidgetId, state: &VisualState) -> io::Result<()>;
}

/// Writes each target as `<id>.txt` (the glyph line) and `<id>.json`
/// under a directory that status bars can poll.
pub struct FileSurface {
    dir: PathBuf,
    targets: BTreeSet<WidgetId>,
}

impl FileSurface {
    pub fn new(targets: impl IntoIterator<Item = WidgetId>) -> Self {
        Self::at(widgets_dir(), targets)
    }

    pub fn at(dir: impl Into<PathBuf>, targets: impl IntoIterator<Item = WidgetId>) -> Self {
        Self {
            dir: dir.into(),
            targets: targets.into_iter().collect(),
        }
    }

    pub fn text_path(&self, id: &WidgetId) -> PathBuf {
        self.dir.join(format!("{}.txt", file_stem(id)))
    }

    pub fn json_path(&self, id: &WidgetId) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(id)))
    }
}

impl DisplaySurface for FileSurface {
    fn targets(&self) -> Vec<WidgetId> {
        self.targets.iter().cloned().collect()
    }

    fn contains(&self, id: &WidgetId) -> bool {
        self.targets.contains(id)
    }

    fn show(&mut self, id: &WidgetId, state: &VisualState) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.json_path(id), json)?;
        fs::write(self.text_path(id), format!("{}\n", state.to_text()))?;

        trace!(widget = %id, label = %state.label, "Widget updated");
        Ok(())
    }
}

/// Ids are opaque; keep them from escaping the widget directory.
fn file_stem(id: &WidgetId) -> String {
    id.as_str()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::render;

    #[test]
    fn test_show_writes_text_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let id = WidgetId::new("panel");
        let mut surface = FileSurface::at(dir.path(), [id.clone()]);

        let state = render(38, true);
        surface.show(&id, &state).unwrap();

        let text = fs::read_to_string(surface.text_path(&id)).unwrap();
        assert_eq!(text, "[███░░░░░░░] 38% ⚡\n");

        let json = fs::read_to_string(surface.json_path(&id)).unwrap();
        let parsed: VisualState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_targets_are_deduplicated() {
        let surface = FileSurface::at(
            "/unused",
            [WidgetId::new("b"), WidgetId::new("a"), WidgetId::new("b")],
        );
        assert_eq!(surface.targets(), vec![WidgetId::new("a"), WidgetId::new("b")]);
        assert!(surface.contains(&WidgetId::new("a")));
        assert!(!surface.contains(&WidgetId::new("c")));
    }

    #[test]
    fn test_ids_stay_inside_directory() {
        let surface = FileSurface::at("/widgets", []);
        assert_eq!(
            surface.text_path(&WidgetId::new("../etc/passwd")),
            PathBuf::from("/widgets/_etc_passwd.txt")
        );
    }
}
