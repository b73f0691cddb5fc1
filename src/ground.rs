//! Snapshot arena and index grounding.
//!
//! A [`Snapshot`] is rebuilt from the live page every time it is needed;
//! an index is a slot in exactly one snapshot and is never carried over.

use crate::error::GroundingError;
use crate::types::{ELEMENT_NAME_MAX_CHARS, Element, MAX_SNAPSHOT_ELEMENTS};

pub const UNNAMED: &str = "(unnamed)";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    elements: Vec<Element>,
}

impl Snapshot {
    /// Build a snapshot from extractor output.
    ///
    /// Caps the element count, renumbers indices to match positions and
    /// normalises names, so the invariants hold whatever the page returned.
    pub fn new(raw: Vec<Element>) -> Self {
        let elements = raw
            .into_iter()
            .take(MAX_SNAPSHOT_ELEMENTS)
            .enumerate()
            .map(|(index, mut el)| {
                el.index = index;
                el.name = sanitize_name(&el.name);
                el
            })
            .collect();
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    /// Resolve a decision's target index to the element at that slot.
    pub fn ground(&self, index: i64) -> Result<&Element, GroundingError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.elements.get(i))
            .ok_or(GroundingError::IndexOutOfRange {
                index,
                len: self.elements.len(),
            })
    }
}

/// Collapse line breaks to spaces and cut to the name length limit.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_break = false;
    for ch in raw.chars() {
        if ch == '\n' || ch == '\r' {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        return UNNAMED.to_string();
    }
    trimmed.chars().take(ELEMENT_NAME_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(index: usize, selector: &str, name: &str) -> Element {
        Element {
            index,
            selector: selector.to_string(),
            role: "button".to_string(),
            name: name.to_string(),
            disabled: false,
            visible: true,
            in_viewport: true,
        }
    }

    #[test]
    fn indices_are_contiguous_positions() {
        let snap = Snapshot::new(vec![el(7, "#a", "A"), el(7, "#b", "B"), el(42, "#c", "C")]);
        let indices: Vec<usize> = snap.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn caps_element_count() {
        let raw = (0..MAX_SNAPSHOT_ELEMENTS + 20)
            .map(|i| el(i, &format!("#e{i}"), "x"))
            .collect();
        let snap = Snapshot::new(raw);
        assert_eq!(snap.len(), MAX_SNAPSHOT_ELEMENTS);
        assert_eq!(snap.elements().last().unwrap().index, MAX_SNAPSHOT_ELEMENTS - 1);
    }

    #[test]
    fn names_have_no_newlines_and_fit_limit() {
        let long = format!("Line one\r\nline two\n{}", "z".repeat(300));
        let snap = Snapshot::new(vec![el(0, "#a", &long), el(1, "#b", " \n ")]);
        let first = &snap.elements()[0].name;
        assert!(!first.contains('\n') && !first.contains('\r'));
        assert!(first.starts_with("Line one line two "));
        assert_eq!(first.chars().count(), ELEMENT_NAME_MAX_CHARS);
        assert_eq!(snap.elements()[1].name, UNNAMED);
    }

    #[test]
    fn grounding_in_range_returns_element_unchanged() {
        let snap = Snapshot::new(vec![el(0, "#a", "A"), el(1, "div.card > a", "B")]);
        for (i, expected) in snap.elements().iter().enumerate() {
            let got = snap.ground(i as i64).unwrap();
            assert_eq!(got, expected);
            assert_eq!(got.selector, snap.elements()[i].selector);
        }
    }

    #[test]
    fn grounding_out_of_range_fails() {
        let snap = Snapshot::new(vec![el(0, "#a", "A"), el(1, "#b", "B")]);
        assert_eq!(
            snap.ground(5),
            Err(GroundingError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            snap.ground(-1),
            Err(GroundingError::IndexOutOfRange { index: -1, len: 2 })
        );
        assert!(Snapshot::default().ground(0).is_err());
    }
}
