//! Terminal output: colored log lines and a progress bar.
//!
//! ```ignore
//! log!("catalog"; "found {} documents", count);
//!
//! let progress = Progress::new("render", assets.len());
//! progress.inc();
//! progress.finish();
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use parking_lot::Mutex;
use std::{
    io::{IsTerminal, Write, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Cached terminal width.
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Whether a progress bar currently owns the last terminal line.
static BAR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Serializes writes from worker threads.
static OUTPUT: Mutex<()> = Mutex::new(());

/// Columns assumed when the terminal size is unknown.
const FALLBACK_WIDTH: u16 = 120;

const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map_or(FALLBACK_WIDTH, |(w, _)| w)) as usize
}

/// `"[module] "` takes the module name plus brackets and a space.
const fn prefix_len(module: &str) -> usize {
    module.len() + 3
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Print `[module] message`, truncated to the terminal width.
///
/// Multi-line messages are printed whole. An active progress bar is redrawn
/// below the message.
pub fn log(module: &str, message: &str) {
    let _guard = OUTPUT.lock();
    let mut out = stdout().lock();

    if BAR_ACTIVE.load(Ordering::Relaxed) {
        execute!(out, Clear(ClearType::CurrentLine)).ok();
        write!(out, "\r").ok();
    }

    let message = if message.contains('\n') {
        message
    } else {
        truncate_str(message, terminal_width().saturating_sub(prefix_len(module)))
    };
    writeln!(out, "{} {message}", colorize_prefix(module)).ok();
    out.flush().ok();
}

/// Color a module prefix by severity.
fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "done" => prefix.bright_green().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Longest prefix of `s` within `max_len` bytes ending on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress Bar
// ============================================================================

/// Single in-place progress bar on the last terminal line.
///
/// `inc` may be called from any thread. Nothing is drawn when stdout is not
/// a terminal.
pub struct Progress {
    prefix: ColoredString,
    prefix_len: usize,
    total: usize,
    current: AtomicUsize,
    visible: bool,
}

impl Progress {
    pub fn new(module: &'static str, total: usize) -> Self {
        let visible = total > 1 && stdout().is_terminal();
        BAR_ACTIVE.store(visible, Ordering::Relaxed);

        Self {
            prefix: colorize_prefix(module),
            prefix_len: prefix_len(module),
            total,
            current: AtomicUsize::new(0),
            visible,
        }
    }

    /// Count one finished item and redraw.
    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        if self.visible {
            self.draw(current);
        }
    }

    /// Items counted so far.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    fn draw(&self, current: usize) {
        let _guard = OUTPUT.lock();
        let line = render_bar(current, self.total, terminal_width(), self.prefix_len);

        let mut out = stdout().lock();
        execute!(out, Clear(ClearType::CurrentLine)).ok();
        write!(out, "\r{} {line}", self.prefix).ok();
        out.flush().ok();
    }

    /// Erase the bar.
    pub fn finish(&self) {
        if !self.visible || !BAR_ACTIVE.swap(false, Ordering::Relaxed) {
            return;
        }
        let _guard = OUTPUT.lock();
        let mut out = stdout().lock();
        execute!(out, Clear(ClearType::CurrentLine), cursor::MoveToColumn(0)).ok();
        out.flush().ok();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

/// `[████░░░░] 3/8`, sized to fit beside a prefix of `prefix_len` columns.
fn render_bar(current: usize, total: usize, width: usize, prefix_len: usize) -> String {
    let count = format!("{current}/{total}");
    // " [" + "] " around the bar
    let available = width.saturating_sub(prefix_len + count.len() + 4);
    let bar_width = available.clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);

    let filled = (current.min(total) * bar_width).checked_div(total).unwrap_or(0);
    format!(
        "[{}{}] {count}",
        "█".repeat(filled),
        "░".repeat(bar_width - filled)
    )
}
