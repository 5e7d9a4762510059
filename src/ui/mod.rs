//! Terminal UI module using ratatui
//!
//! Provides a simple API for displaying pipeline state:
//! - Current stage (Loading, Cleaning, Building, Materializing, Exporting)
//! - Progress of the table being written
//! - Row counts of committed tables
//! - Activity log (scrollable history)

mod components;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::Duration;

use components::{LogPanel, ProgressPanel, StatusPanel, TablesPanel};

/// Pipeline stages shown in the status panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Loading,
    Cleaning,
    Building,
    Materializing,
    Exporting,
    Complete,
}

impl Phase {
    /// Number of working stages
    pub const STEPS: usize = 5;

    /// 1-based position among the working stages
    pub fn step(&self) -> Option<usize> {
        match self {
            Phase::Loading => Some(1),
            Phase::Cleaning => Some(2),
            Phase::Building => Some(3),
            Phase::Materializing => Some(4),
            Phase::Exporting => Some(5),
            Phase::Complete => None,
        }
    }

    fn indicator(&self) -> &'static str {
        match self {
            Phase::Loading => "↓",
            Phase::Cleaning => "◐",
            Phase::Building => "⚙",
            Phase::Materializing => "⋈",
            Phase::Exporting => "⤷",
            Phase::Complete => "✓",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Loading => write!(f, "Loading source files"),
            Phase::Cleaning => write!(f, "Cleaning source relations"),
            Phase::Building => write!(f, "Building dimensional tables"),
            Phase::Materializing => write!(f, "Materializing analysis table"),
            Phase::Exporting => write!(f, "Exporting files"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress information for the current operation
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub label: String,
}

impl Progress {
    pub fn new(current: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            label: label.into(),
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Trait for UI implementations - allows both real TUI and silent/test modes
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);

    /// A table was committed with `rows` rows
    fn table_written(&mut self, name: &str, rows: u64) {
        self.log(format!("{}: {} records", name, rows));
    }

    /// Polled between pipeline stages; `true` stops the run
    fn should_abort(&mut self) -> bool {
        false
    }
}

/// Main UI application state - full TUI implementation
pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    status: StatusPanel,
    progress: ProgressPanel,
    tables: TablesPanel,
    log: LogPanel,
    should_quit: bool,
}

impl UiApp {
    /// Create a new UI application and enter the alternate screen
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            status: StatusPanel::new(),
            progress: ProgressPanel::new(),
            tables: TablesPanel::new(),
            log: LogPanel::new(),
            should_quit: false,
        })
    }

    /// Check for quit signal ('q' or 'c')
    pub fn check_quit(&mut self) -> bool {
        if event::poll(Duration::from_millis(0)).unwrap_or(false) {
            if let Ok(CrosstermEvent::Key(KeyEvent { code, .. })) = event::read() {
                if code == KeyCode::Char('q') || code == KeyCode::Char('c') {
                    self.should_quit = true;
                }
            }
        }
        self.should_quit
    }

    /// Draw the UI
    fn draw(&mut self) -> Result<()> {
        let status = &self.status;
        let progress = &self.progress;
        let tables = &self.tables;
        let log = &self.log;

        self.terminal.draw(|frame| {
            let area = frame.area();
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(5), // Status panel
                    Constraint::Length(3), // Progress bar
                    Constraint::Min(5),    // Tables + log
                ])
                .split(area);
            let bottom = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(40), Constraint::Min(20)])
                .split(rows[2]);

            status.render(frame, rows[0]);
            progress.render(frame, rows[1]);
            tables.render(frame, bottom[0]);
            log.render(frame, bottom[1]);
        })?;

        Ok(())
    }

    /// Finish the UI and restore the terminal
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.set_phase(Phase::Complete);
        self.clear_progress();
        self.log(summary);
        self.log("Press any key to exit...");
        self.draw()?;

        loop {
            if event::poll(Duration::from_millis(100))? {
                if let CrosstermEvent::Key(_) = event::read()? {
                    break;
                }
            }
        }

        self.restore()
    }

    /// Restore terminal without waiting
    pub fn restore(mut self) -> Result<()> {
        terminal::disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Ui for UiApp {
    fn set_phase(&mut self, phase: Phase) {
        self.status.set_phase(phase);
        self.draw().ok();
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.status.set_info(info);
        self.draw().ok();
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        self.progress
            .set_progress(Progress::new(current, total, label));
        self.draw().ok();
    }

    fn clear_progress(&mut self) {
        self.progress.clear();
        self.draw().ok();
    }

    fn log(&mut self, message: impl Into<String>) {
        self.log.add(message);
        self.draw().ok();
    }

    fn table_written(&mut self, name: &str, rows: u64) {
        self.tables.record(name, rows);
        self.log.add(format!("{}: {} records", name, rows));
        self.draw().ok();
    }

    fn should_abort(&mut self) -> bool {
        self.check_quit()
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        // Best effort cleanup
        terminal::disable_raw_mode().ok();
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .ok();
        self.terminal.show_cursor().ok();
    }
}

/// Line-oriented UI for pipes and CI logs
#[derive(Default)]
pub struct ConsoleUi {
    last_label: String,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ui for ConsoleUi {
    fn set_phase(&mut self, phase: Phase) {
        match phase.step() {
            Some(n) => println!("==> [{}/{}] {}", n, Phase::STEPS, phase),
            None => println!("==> {}", phase),
        }
    }

    fn set_info(&mut self, info: impl Into<String>) {
        println!("    {}", info.into());
    }

    fn set_progress(&mut self, _current: u64, total: u64, label: impl Into<String>) {
        // One line per table rather than one per batch
        let label = label.into();
        if label != self.last_label {
            println!("    writing {} ({} rows)", label, total);
            self.last_label = label;
        }
    }

    fn clear_progress(&mut self) {
        self.last_label.clear();
    }

    fn log(&mut self, message: impl Into<String>) {
        println!("    {}", message.into());
    }
}

/// Silent UI implementation for testing
#[derive(Default)]
pub struct SilentUi {
    /// Tables reported as written, in order
    pub tables: Vec<(String, u64)>,
}

impl SilentUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}

    fn table_written(&mut self, name: &str, rows: u64) {
        self.tables.push((name.to_string(), rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_steps() {
        assert_eq!(Phase::Loading.step(), Some(1));
        assert_eq!(Phase::Exporting.step(), Some(Phase::STEPS));
        assert_eq!(Phase::Complete.step(), None);
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(Progress::new(0, 0, "x").ratio(), 0.0);
        assert_eq!(Progress::new(50, 200, "x").ratio(), 0.25);
    }
}
