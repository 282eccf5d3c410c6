//
// format.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use crate::stack::Frame;

/// Capacity of the dump buffer in bytes. The bound counts a terminator
/// byte, so rendered text tops out at one byte less.
pub const DUMP_BUFFER_MAX: usize = 4096;

const DELIMITER: &str = "-----------------------------------\n";
const UP_MARKER: &str = "  ^\n";

/// A rendered dump, and whether rendering was cut short by the buffer
/// bound.
pub(crate) struct Rendered {
    pub text: String,
    pub truncated: bool,
}

/// Render a stack snapshot into the dump layout: a delimiter line, a
/// header naming the program, another delimiter, an up marker, then one
/// line per frame from the most recent call down to the oldest. The
/// depth counter on each line counts down from the frame total to 1.
///
/// Rendering is deterministic: the same frames and program name produce
/// byte-identical text. An empty stack renders as an empty string.
pub(crate) fn render(frames: &[Frame], program: &str) -> Rendered {
    render_bounded(frames, program, DUMP_BUFFER_MAX)
}

/// Render with an explicit buffer bound. The first line that would not
/// fit stops rendering; whatever was appended before it is kept.
fn render_bounded(frames: &[Frame], program: &str, bound: usize) -> Rendered {
    let mut text = String::new();

    if frames.is_empty() {
        return Rendered {
            text,
            truncated: false,
        };
    }

    let header = format!("=== Stack trace of '{program}' ===\n");

    for line in [DELIMITER, header.as_str(), DELIMITER, UP_MARKER] {
        if !append(&mut text, bound, line) {
            return Rendered {
                text,
                truncated: true,
            };
        }
    }

    let mut depth = frames.len();
    for frame in frames.iter().rev() {
        let line = format!(
            "  | {:<10} *** {}(), {}: L{}\n",
            depth,
            frame.function(),
            frame.source_file(),
            frame.line(),
        );

        if !append(&mut text, bound, &line) {
            return Rendered {
                text,
                truncated: true,
            };
        }

        depth -= 1;
    }

    Rendered {
        text,
        truncated: false,
    }
}

/// Append `line` to `text` if the result stays within `bound`, counting
/// the terminator byte.
fn append(text: &mut String, bound: usize, line: &str) -> bool {
    if text.len() + line.len() >= bound {
        return false;
    }

    text.push_str(line);
    true
}
