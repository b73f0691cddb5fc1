use serde_json::Value;
use std::time::Instant;
use tracing::debug;

use crate::config::{Timings, settle};
use crate::error::PerceptionError;
use crate::ground::Snapshot;
use crate::page::Page;
use crate::types::Element;

/// True once the document has a body with at least one child.
pub const READY_JS: &str = "!!(document.body && document.body.children.length > 0)";

/// True once the document has been parsed (DOMContentLoaded or later).
pub const DOM_LOADED_JS: &str = "document.readyState !== 'loading'";

/// JavaScript injected into the page to list actionable elements.
/// NON-DESTRUCTIVE: reads the DOM and computed styles, never writes.
///
/// The script:
///   1. Walks `document.body` in document order, stopping at 130 matches.
///   2. Keeps interactive tags, interactive ARIA roles, focusable
///      (`tabindex >= 0`) elements and click targets (onclick, or a pointer
///      cursor not inherited from the parent).
///   3. Drops elements that are display:none, visibility:hidden, opacity 0,
///      or not larger than 4px in either dimension.
///   4. If nothing matched, retries over a broad selector list with only
///      the zero-size check.
///   5. Returns a JSON string (objects do not survive `Runtime.evaluate`
///      without return-by-value).
pub const EXTRACT_ELEMENTS_JS: &str = r#"
(() => {
  const MAX = 130;
  const TAGS = new Set(['A','BUTTON','INPUT','SELECT','TEXTAREA','LABEL','SUMMARY','DETAILS']);
  const ROLES = new Set(['button','link','checkbox','radio','textbox','searchbox',
                         'combobox','listbox','menuitem','tab','switch']);
  const FALLBACK = 'a, button, input, select, textarea, [role=button], [role=link], [tabindex]';
  const SAFE_ID = /^[A-Za-z][A-Za-z0-9_-]*$/;

  if (!document.body) return '[]';

  const esc = (v) => (window.CSS && CSS.escape) ? CSS.escape(v) : String(v).replace(/[^A-Za-z0-9_-]/g, '\\$&');

  function shown(el, minSize) {
    const s = getComputedStyle(el);
    if (s.display === 'none' || s.visibility === 'hidden' || s.opacity === '0') return false;
    const r = el.getBoundingClientRect();
    return r.width > minSize && r.height > minSize;
  }

  function candidate(el) {
    const role = (el.getAttribute('role') || '').toLowerCase();
    if (TAGS.has(el.tagName) || ROLES.has(role)) return true;
    if (el.hasAttribute('tabindex') && el.tabIndex >= 0) return true;
    if (el.hasAttribute('onclick') || typeof el.onclick === 'function') return true;
    if (getComputedStyle(el).cursor !== 'pointer') return false;
    const parent = el.parentElement;
    return !parent || getComputedStyle(parent).cursor !== 'pointer';
  }

  function inViewport(el) {
    const r = el.getBoundingClientRect();
    return r.bottom > 0 && r.right > 0 && r.top < window.innerHeight && r.left < window.innerWidth;
  }

  function nameOf(el) {
    let labelled = '';
    const ids = el.getAttribute('aria-labelledby');
    if (ids) {
      labelled = ids.split(/\s+/)
        .map(id => { const t = document.getElementById(id); return t ? t.textContent : ''; })
        .join(' ').trim();
    }
    const text = (el.textContent || '').trim().replace(/\s+/g, ' ');
    const value = typeof el.value === 'string' ? el.value : '';
    const name = (el.getAttribute('aria-label') || '').trim() || labelled ||
      el.getAttribute('placeholder') || el.getAttribute('alt') || el.getAttribute('title') ||
      text || value || '(unnamed)';
    return name.replace(/[\r\n]+/g, ' ').slice(0, 100);
  }

  function selectorOf(el) {
    if (el.id && SAFE_ID.test(el.id)) return '#' + el.id;
    const parts = [];
    let cur = el;
    let depth = 0;
    while (cur && cur.nodeType === 1 && cur !== document.body && depth < 7) {
      let part = cur.tagName.toLowerCase();
      if (cur.id) {
        parts.unshift(part + '#' + esc(cur.id));
        break;
      }
      const cls = typeof cur.className === 'string'
        ? cur.className.trim().split(/\s+/).filter(Boolean).slice(0, 2)
        : [];
      if (cls.length) {
        part += cls.map(c => '.' + esc(c)).join('');
      } else if (cur.parentElement) {
        part += ':nth-child(' + (Array.prototype.indexOf.call(cur.parentElement.children, cur) + 1) + ')';
      }
      parts.unshift(part);
      cur = cur.parentElement;
      depth++;
    }
    return parts.join(' > ') || el.tagName.toLowerCase();
  }

  function describe(el, index) {
    return {
      index,
      selector: selectorOf(el),
      role: (el.getAttribute('role') || el.tagName.toLowerCase()),
      name: nameOf(el),
      disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
      visible: true,
      inViewport: inViewport(el)
    };
  }

  const out = [];
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT);
  while (out.length < MAX && walker.nextNode()) {
    const el = walker.currentNode;
    if (candidate(el) && shown(el, 4)) out.push(describe(el, out.length));
  }

  if (out.length === 0) {
    for (const el of document.querySelectorAll(FALLBACK)) {
      if (out.length >= MAX) break;
      if (el.tabIndex < 0 && el.hasAttribute('tabindex')) continue;
      if (shown(el, 0)) out.push(describe(el, out.length));
    }
  }

  return JSON.stringify(out);
})()
"#;

/// Capture a fresh snapshot of the actionable elements on the page.
///
/// Never cached: every call re-reads the live document.
pub fn capture_snapshot<P: Page + ?Sized>(
    page: &P,
    timings: &Timings,
) -> Result<Snapshot, PerceptionError> {
    wait_until_ready(page, timings)?;

    let value = page
        .evaluate(EXTRACT_ELEMENTS_JS)
        .map_err(|e| PerceptionError::Evaluate(format!("{e:#}")))?;
    let elements = decode_elements(value)?;
    let snapshot = Snapshot::new(elements);

    debug!(elements = snapshot.len(), "snapshot captured");
    Ok(snapshot)
}

/// Poll until the document body exists, bounded by `timings.page_ready`.
pub fn wait_until_ready<P: Page + ?Sized>(
    page: &P,
    timings: &Timings,
) -> Result<(), PerceptionError> {
    let deadline = Instant::now() + timings.page_ready;
    loop {
        match page.evaluate(READY_JS) {
            Ok(Value::Bool(true)) => return Ok(()),
            Ok(_) => {}
            Err(e) => debug!("readiness probe failed: {:#}", e),
        }
        if Instant::now() >= deadline {
            return Err(PerceptionError::PageNotReady(timings.page_ready));
        }
        settle(timings.poll);
    }
}

/// Poll until the document has been parsed, bounded by `timings.load_state`.
///
/// Returns `false` on timeout; callers observe the page anyway.
pub fn wait_for_dom_loaded<P: Page + ?Sized>(page: &P, timings: &Timings) -> bool {
    let deadline = Instant::now() + timings.load_state;
    loop {
        if let Ok(Value::Bool(true)) = page.evaluate(DOM_LOADED_JS) {
            return true;
        }
        if Instant::now() >= deadline {
            debug!(timeout = ?timings.load_state, "document still loading");
            return false;
        }
        settle(timings.poll);
    }
}

fn decode_elements(value: Value) -> Result<Vec<Element>, PerceptionError> {
    let decoded = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(raw) => serde_json::from_str(&raw),
        array @ Value::Array(_) => serde_json::from_value(array),
        other => {
            return Err(PerceptionError::Decode(format!(
                "expected a JSON array, got {other}"
            )));
        }
    };
    decoded.map_err(|e| PerceptionError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, element};
    use serde_json::json;

    #[test]
    fn captures_and_normalises_elements() {
        let mut raw = vec![
            element(3, "#q", "searchbox", "Search"),
            element(9, "a.nav", "a", "Home\nPage"),
        ];
        raw[1].in_viewport = false;
        let page = FakePage::new("https://example.com", "Example").with_elements(raw);

        let snap = capture_snapshot(&page, &Timings::immediate()).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.elements()[0].index, 0);
        assert_eq!(snap.elements()[1].index, 1);
        assert_eq!(snap.elements()[1].name, "Home Page");
        assert!(!snap.elements()[1].in_viewport);
        assert!(page.interactions().is_empty());
    }

    #[test]
    fn empty_page_yields_empty_snapshot() {
        let page = FakePage::new("about:blank", "");
        let snap = capture_snapshot(&page, &Timings::immediate()).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn missing_body_is_page_not_ready() {
        let page = FakePage::new("about:blank", "");
        page.not_ready.set(true);
        let err = capture_snapshot(&page, &Timings::immediate()).unwrap_err();
        assert!(matches!(err, PerceptionError::PageNotReady(_)));
        assert_eq!(page.snapshots.get(), 0);
    }

    #[test]
    fn decodes_array_and_rejects_garbage() {
        let arr = json!([{"index": 0, "selector": "#a", "role": "a", "name": "x"}]);
        let els = decode_elements(arr).unwrap();
        assert_eq!(els.len(), 1);
        assert!(els[0].visible);
        assert!(!els[0].disabled);

        assert!(matches!(
            decode_elements(json!(42)),
            Err(PerceptionError::Decode(_))
        ));
        assert!(matches!(
            decode_elements(Value::String("not json".into())),
            Err(PerceptionError::Decode(_))
        ));
    }
}
