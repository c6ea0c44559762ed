//! Notebooks shown by the host and the attachment derived from a click
//! target inside one.
//!
//! Notebooks are read from percent-format scripts: every `# %%` line starts
//! a cell, `# %% [markdown]` and `# %% [raw]` pick the cell kind, and text
//! before the first marker becomes a leading code cell.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{ConfigError, ParseTargetKindError};
use crate::model::{Attachment, CellKind, CellRef};
use crate::surface::{DisplaySurface, Marker, NodeId};

/// Node attribute holding a cell node's position in its notebook.
pub const CELL_INDEX_ATTR: &str = "data-cell-index";

const SAMPLE_PATH: &str = "notebooks/sample.py";
const SAMPLE: &str = "\
# %% [markdown]
# # Exploring sales data
# Load the quarterly export and look at regional totals.

# %%
import pandas as pd
df = pd.read_csv(\"sales.csv\")
df.head()

# %%
totals = df.groupby(\"region\")[\"revenue\"].sum()
totals.sort_values(ascending=False)

# %% [markdown]
# Revenue is concentrated in two regions.

# %% [raw]
exported 2024-03-31
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookCell {
    pub id: String,
    pub kind: CellKind,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    path: PathBuf,
    cells: Vec<NotebookCell>,
}

impl Notebook {
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            cells: parse_cells(text),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::NotebookRead {
            path: path.to_path_buf(),
            source,
        })?;
        let notebook = Self::parse(path, &text);
        if notebook.cells.is_empty() {
            return Err(ConfigError::EmptyNotebook {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), cells = notebook.cells.len(), "notebook loaded");
        Ok(notebook)
    }

    /// Built-in notebook used when none is given on the command line.
    pub fn sample() -> Self {
        Self::parse(SAMPLE_PATH, SAMPLE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cells(&self) -> &[NotebookCell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&NotebookCell> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn parse_cells(text: &str) -> Vec<NotebookCell> {
    let mut cells = Vec::new();
    let mut kind = CellKind::Code;
    let mut lines: Vec<&str> = Vec::new();
    let mut started = false;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("# %%") {
            if started || !is_blank(&lines) {
                push_cell(&mut cells, kind, &lines);
            }
            lines.clear();
            kind = marker_kind(rest);
            started = true;
        } else {
            lines.push(line);
        }
    }
    if started || !is_blank(&lines) {
        push_cell(&mut cells, kind, &lines);
    }
    cells
}

fn marker_kind(rest: &str) -> CellKind {
    let rest = rest.trim();
    if rest.starts_with("[markdown]") || rest.starts_with("[md]") {
        CellKind::Markdown
    } else if rest.starts_with("[raw]") {
        CellKind::Raw
    } else {
        CellKind::Code
    }
}

fn is_blank(lines: &[&str]) -> bool {
    lines.iter().all(|l| l.trim().is_empty())
}

fn push_cell(cells: &mut Vec<NotebookCell>, kind: CellKind, lines: &[&str]) {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    let body = match (start, end) {
        (Some(start), Some(end)) => &lines[start..=end],
        _ => &[][..],
    };
    let source = body
        .iter()
        .map(|line| match kind {
            // Markdown cells are stored as comments.
            CellKind::Markdown => line
                .strip_prefix("# ")
                .or_else(|| line.strip_prefix('#'))
                .unwrap_or(line),
            CellKind::Code | CellKind::Raw => line,
        })
        .collect::<Vec<_>>()
        .join("\n");
    cells.push(NotebookCell {
        id: format!("cell-{}", cells.len() + 1),
        kind,
        source,
    });
}

/// Tracks which notebook currently has focus in the host.
#[derive(Debug, Default, Clone)]
pub struct NotebookTracker {
    current: Option<Notebook>,
}

impl NotebookTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(notebook: Notebook) -> Self {
        Self {
            current: Some(notebook),
        }
    }

    pub fn current(&self) -> Option<&Notebook> {
        self.current.as_ref()
    }

    pub fn set_current(&mut self, notebook: Option<Notebook>) {
        self.current = notebook;
    }
}

/// What a context-menu entry was invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Notebook,
    Cell,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Notebook => "Notebook",
            TargetKind::Cell => "Cell",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = ParseTargetKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notebook" => Ok(TargetKind::Notebook),
            "cell" => Ok(TargetKind::Cell),
            _ => Err(ParseTargetKindError(s.to_string())),
        }
    }
}

/// Attachment for a panel opened against `target`.
///
/// `None` means the panel opens without context: there is no current
/// notebook, or the target's cell node carries a malformed or out-of-range
/// index. A cell target outside any cell node, or on one with no index at
/// all, falls back to the whole notebook.
pub fn derive_attachment<S: DisplaySurface + ?Sized>(
    tracker: &NotebookTracker,
    kind: TargetKind,
    target: NodeId,
    surface: &S,
) -> Option<Attachment> {
    let Some(notebook) = tracker.current() else {
        debug!("no current notebook; opening without attachment");
        return None;
    };
    let path = notebook.path().display().to_string();
    let mut cells = Vec::new();

    if kind == TargetKind::Cell
        && let Some(cell_node) = surface.closest(target, Marker::Cell)
    {
        if let Some(raw) = surface.attr(cell_node, CELL_INDEX_ATTR) {
            let cell = raw
                .parse::<usize>()
                .ok()
                .and_then(|index| notebook.cell(index));
            let Some(cell) = cell else {
                warn!(
                    node = cell_node.raw(),
                    index = raw,
                    "cell target does not resolve; attachment skipped"
                );
                return None;
            };
            cells.push(CellRef {
                input_type: cell.kind,
                id: cell.id.clone(),
            });
        } else {
            debug!(
                node = cell_node.raw(),
                "cell node has no index; attaching the whole notebook"
            );
        }
    }

    Some(Attachment::Notebook { path, cells })
}
