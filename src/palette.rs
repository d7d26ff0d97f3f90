//! Per-run pipe coloring.
//!
//! Both ends of a pipe share an inode, so giving each inode its own color
//! lets a reader match a writer in one process with the reader in another.

use std::collections::HashMap;

use owo_colors::{AnsiColors, OwoColorize};

/// Colors handed out to pipes, in allocation order.
pub const PIPE_PALETTE: [AnsiColors; 6] = [
    AnsiColors::BrightRed,
    AnsiColors::BrightGreen,
    AnsiColors::BrightYellow,
    AnsiColors::BrightBlue,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightCyan,
];

/// A slot in [`PIPE_PALETTE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipeColor(usize);

impl PipeColor {
    /// Position of this color in [`PIPE_PALETTE`].
    pub fn index(self) -> usize {
        self.0
    }

    /// The terminal color for this slot.
    pub fn ansi(self) -> AnsiColors {
        PIPE_PALETTE[self.0]
    }
}

/// Assigns colors to pipe inodes round-robin, remembering every assignment.
///
/// After [`PIPE_PALETTE`] is exhausted colors wrap around, so two pipes may
/// share a color in busy processes.
///
/// # Examples
///
/// ```
/// use inspect_fds::palette::PipeColorAllocator;
///
/// let mut colors = PipeColorAllocator::new();
/// let first = colors.color_for(1001);
/// let second = colors.color_for(1002);
/// assert_ne!(first, second);
/// assert_eq!(colors.color_for(1001), first);
/// ```
#[derive(Debug, Default)]
pub struct PipeColorAllocator {
    assigned: HashMap<u64, PipeColor>,
    next: usize,
}

impl PipeColorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the color for `inode`, assigning the next one on first sight.
    pub fn color_for(&mut self, inode: u64) -> PipeColor {
        if let Some(color) = self.assigned.get(&inode) {
            return *color;
        }

        let color = PipeColor(self.next % PIPE_PALETTE.len());
        self.next += 1;
        self.assigned.insert(inode, color);
        color
    }

    /// Number of distinct pipes seen so far.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Renders `<pipe #inode>` painted in `color`, followed by a color reset.
///
/// This always emits escapes; callers decide whether color is wanted.
pub fn pipe_label(inode: u64, color: PipeColor) -> String {
    format!("<pipe #{inode}>").color(color.ansi()).to_string()
}
