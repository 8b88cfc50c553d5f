//! Splits an error's detailed rendering into `err_stack` lines and a cause line.
//!
//! The rendering is the error's `{:?}` form, which for `anyhow`/`eyre` style
//! errors carries the cause chain and any captured backtrace. The cause line is
//! whatever sits at [`CAUSE_LINE_INDEX`] of that rendering. This positional
//! heuristic depends on the rendering format; log consumers already key on the
//! resulting `err_line` field, so the index stays fixed.

use std::fmt;

/// Prepended to the first rendered line.
pub const REASON_MARKER: &str = "ERR_REASON ：";

/// `err_line` value when the rendering is too short to hold a cause line.
pub const NO_STACK: &str = "can't get error stack";

pub const CAUSE_LINE_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDecomposition {
    /// Rendered lines; never empty, element 0 starts with [`REASON_MARKER`].
    pub lines: Vec<String>,
    pub cause_line: String,
}

/// Decompose `err`. Never fails.
pub fn decompose<E>(err: &E) -> ErrorDecomposition
where
    E: fmt::Debug + ?Sized,
{
    decompose_rendered(&format!("{err:?}"))
}

pub(crate) fn decompose_rendered(rendered: &str) -> ErrorDecomposition {
    let mut lines: Vec<String> = rendered
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
        .collect();

    if let Some(first) = lines.first_mut() {
        first.insert_str(0, REASON_MARKER);
    }

    let cause_line = lines
        .get(CAUSE_LINE_INDEX)
        .cloned()
        .unwrap_or_else(|| NO_STACK.to_owned());

    ErrorDecomposition { lines, cause_line }
}
