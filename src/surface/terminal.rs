//! Terminal painter for [`MemorySurface`] trees.
//!
//! Writes one line per named control, indented by depth:
//!
//! ```text
//! name: Main
//! editStart
//!   pos: 4
//! ```
//!
//! Hidden subtrees are skipped, disabled controls are dimmed and controls
//! holding a value show it after the name.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use super::{ControlFlags, ControlId, MemorySurface};

/// Paint the subtree under `from` (exclusive) to `out`.
pub fn paint<W: Write>(surface: &MemorySurface, from: ControlId, out: &mut W) -> io::Result<()> {
    let mut stack: Vec<(ControlId, usize)> = surface
        .children(from)
        .into_iter()
        .rev()
        .map(|c| (c, 0))
        .collect();

    while let Some((control, depth)) = stack.pop() {
        let Some(flags) = surface.flags(control) else {
            continue;
        };
        if !flags.contains(ControlFlags::VISIBLE) {
            continue;
        }

        // Unnamed controls are template containers; their children indent
        let child_depth = match surface.name(control) {
            Some(name) => {
                paint_line(out, depth, &name, surface, control, flags)?;
                depth + 1
            }
            None => depth,
        };

        for child in surface.children(control).into_iter().rev() {
            stack.push((child, child_depth));
        }
    }

    out.flush()
}

fn paint_line<W: Write>(
    out: &mut W,
    depth: usize,
    name: &str,
    surface: &MemorySurface,
    control: ControlId,
    flags: ControlFlags,
) -> io::Result<()> {
    let disabled = !flags.contains(ControlFlags::ENABLED);

    queue!(out, Print("  ".repeat(depth)))?;
    if disabled {
        queue!(out, SetAttribute(Attribute::Dim))?;
    }
    queue!(out, SetForegroundColor(Color::Cyan), Print(name), ResetColor)?;

    if let Some(value) = surface.value(control).filter(|v| !v.is_null()) {
        queue!(out, Print(": "), Print(value))?;
    }
    if disabled {
        queue!(out, SetAttribute(Attribute::Reset))?;
    }
    queue!(out, Print("\n"))
}
