use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use tracing::Level;

use crate::error::ConfigError;
use crate::geometry::CornerInset;
use crate::notebook::Notebook;
use crate::panel::PanelConfig;

/// Narrowest panel that still fits the toolbar and the close control.
pub const MIN_PANEL_WIDTH: u16 = 16;
/// Header, one editor row, the toolbar and the bottom border.
pub const MIN_PANEL_HEIGHT: u16 = 4;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "floating-chat",
    version = env!("CARGO_PKG_VERSION"),
    about = "Notebook viewer with a draggable floating chat panel"
)]
pub struct Cli {
    /// Percent-format notebook script (`# %%` cell markers). A built-in
    /// sample is shown when omitted.
    #[arg(long, value_name = "PATH")]
    pub notebook: Option<PathBuf>,

    /// Panel width in columns.
    #[arg(long, value_name = "COLS", default_value_t = 48)]
    pub panel_width: u16,

    /// Smallest panel height in rows; the panel grows with its content.
    #[arg(long, value_name = "ROWS", default_value_t = 6)]
    pub panel_min_height: u16,

    /// Gap to the right edge when the panel is anchored to the corner.
    #[arg(long, value_name = "COLS", default_value_t = 2)]
    pub inset_right: u16,

    /// Gap to the bottom edge when the panel is anchored to the corner.
    #[arg(long, value_name = "ROWS", default_value_t = 1)]
    pub inset_bottom: u16,

    /// Append log lines to this file instead of the status bar.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Start without a chat model; toggling the panel then does nothing.
    #[arg(long)]
    pub no_model: bool,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub notebook: Notebook,
    pub panel: PanelConfig,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
    pub with_model: bool,
}

impl TryFrom<&Cli> for ChatConfig {
    type Error = ConfigError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        if cli.panel_width < MIN_PANEL_WIDTH {
            return Err(ConfigError::TooSmall {
                name: "panel width",
                min: MIN_PANEL_WIDTH,
            });
        }
        if cli.panel_min_height < MIN_PANEL_HEIGHT {
            return Err(ConfigError::TooSmall {
                name: "panel minimum height",
                min: MIN_PANEL_HEIGHT,
            });
        }
        let log_level = Level::from_str(cli.log_level.trim())
            .map_err(|_| ConfigError::LogLevel(cli.log_level.clone()))?;
        let notebook = match &cli.notebook {
            Some(path) => Notebook::load(path)?,
            None => Notebook::sample(),
        };
        let panel = PanelConfig {
            width: cli.panel_width,
            min_height: cli.panel_min_height,
            inset: CornerInset::new(cli.inset_right, cli.inset_bottom),
            ..PanelConfig::default()
        };
        Ok(Self {
            notebook,
            panel,
            log_file: cli.log_file.clone(),
            log_level,
            with_model: !cli.no_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("floating-chat").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_panel_defaults() {
        let config = ChatConfig::try_from(&parse(&[])).unwrap();
        assert_eq!(config.panel, PanelConfig::default());
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.with_model);
        assert_eq!(config.notebook, Notebook::sample());
    }

    #[test]
    fn values_flow_into_panel_config() {
        let cli = parse(&[
            "--panel-width",
            "60",
            "--panel-min-height",
            "8",
            "--inset-right",
            "0",
            "--inset-bottom",
            "3",
            "--log-level",
            "DEBUG",
            "--no-model",
        ]);
        let config = ChatConfig::try_from(&cli).unwrap();
        assert_eq!(config.panel.width, 60);
        assert_eq!(config.panel.min_height, 8);
        assert_eq!(config.panel.inset, CornerInset::new(0, 3));
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(!config.with_model);
    }

    #[test]
    fn rejects_tiny_panels_and_bad_levels() {
        let narrow = ChatConfig::try_from(&parse(&["--panel-width", "4"])).unwrap_err();
        assert!(matches!(narrow, ConfigError::TooSmall { min: MIN_PANEL_WIDTH, .. }));
        let short = ChatConfig::try_from(&parse(&["--panel-min-height", "2"])).unwrap_err();
        assert!(matches!(short, ConfigError::TooSmall { min: MIN_PANEL_HEIGHT, .. }));
        let level = ChatConfig::try_from(&parse(&["--log-level", "loud"])).unwrap_err();
        assert_eq!(level.to_string(), "unknown log level 'loud'");
    }

    #[test]
    fn notebook_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# %% [markdown]\n# Notes\n# %%\nprint(1)").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = ChatConfig::try_from(&parse(&["--notebook", &path])).unwrap();
        assert_eq!(config.notebook.len(), 2);
        assert_eq!(config.notebook.path(), file.path());
    }

    #[test]
    fn missing_notebook_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.py");
        let err = ChatConfig::try_from(&parse(&["--notebook", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(err, ConfigError::NotebookRead { .. }));
    }
}
