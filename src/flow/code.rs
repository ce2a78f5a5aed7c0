//! Six-box one-time-code entry.
//!
//! Pure functions only: they take the current boxes and return the new boxes plus
//! the index the view should focus next. Moving real keyboard focus is the view's
//! job.

use regex::Regex;

pub const CODE_LENGTH: usize = 6;
const LAST_INDEX: usize = CODE_LENGTH - 1;

/// One entry per box; `None` is an empty box.
pub type CodeDigits = [Option<char>; CODE_LENGTH];

pub const EMPTY_CODE: CodeDigits = [None; CODE_LENGTH];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeEntry {
    pub digits: CodeDigits,
    pub focus: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Handles typing into box `index`.
///
/// A single ASCII digit is written and focus advances (stopping at the last box).
/// An empty string clears the box and keeps focus. Anything else leaves the boxes
/// untouched.
#[must_use]
pub fn on_digit_entered(digits: CodeDigits, index: usize, raw: &str) -> CodeEntry {
    let index = index.min(LAST_INDEX);
    let mut next = digits;
    let mut chars = raw.chars();

    match (chars.next(), chars.next()) {
        (None, _) => {
            next[index] = None;
            CodeEntry {
                digits: next,
                focus: index,
            }
        }
        (Some(digit), None) if digit.is_ascii_digit() => {
            next[index] = Some(digit);
            CodeEntry {
                digits: next,
                focus: (index + 1).min(LAST_INDEX),
            }
        }
        _ => CodeEntry {
            digits,
            focus: index,
        },
    }
}

/// Backspace on an already empty box moves focus one box back.
#[must_use]
pub fn on_backspace_navigate(digits: &CodeDigits, index: usize) -> usize {
    let index = index.min(LAST_INDEX);
    if digits[index].is_none() && index > 0 {
        index - 1
    } else {
        index
    }
}

#[must_use]
pub fn on_arrow_navigate(index: usize, direction: Direction) -> usize {
    match direction {
        Direction::Left => index.saturating_sub(1),
        Direction::Right => index.saturating_add(1),
    }
    .min(LAST_INDEX)
}

/// Spreads pasted text across the boxes from the first one.
///
/// Whitespace is stripped and the rest truncated to six characters. Returns `None`
/// (leave everything as it is) unless what remains is one or more ASCII digits.
#[must_use]
pub fn distribute_paste(pasted: &str) -> Option<CodeEntry> {
    let cleaned: String = pasted
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(CODE_LENGTH)
        .collect();

    if !valid_digits(&cleaned) {
        return None;
    }

    let mut digits = EMPTY_CODE;
    for (slot, digit) in digits.iter_mut().zip(cleaned.chars()) {
        *slot = Some(digit);
    }

    Some(CodeEntry {
        digits,
        focus: cleaned.chars().count().min(LAST_INDEX),
    })
}

/// Concatenates the filled boxes. No validation happens here.
#[must_use]
pub fn assemble(digits: &CodeDigits) -> String {
    digits.iter().flatten().collect()
}

/// Shape check applied before any code reaches the network.
#[must_use]
pub fn is_complete_code(code: &str) -> bool {
    Regex::new(r"^[0-9]{6}$").map_or(false, |re| re.is_match(code))
}

fn valid_digits(text: &str) -> bool {
    Regex::new(r"^[0-9]+$").map_or(false, |re| re.is_match(text))
}
