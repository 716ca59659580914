//! Page-side scripts evaluated in a frame's execution context.
//!
//! Every script is wrapped by [`call`], which prepends shared helpers and
//! binds the JSON-encoded arguments to `args`.

use crate::Result;
use serde::Serialize;

const PRELUDE: &str = r#"
const innerText = (el) => (el.innerText ?? el.textContent ?? '');
const visible = (el) => {
  if (!el || !el.isConnected) return false;
  const style = getComputedStyle(el);
  if (style.visibility === 'hidden' || style.display === 'none') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
};
const enabled = (el) => !!el && !el.disabled && el.getAttribute('aria-disabled') !== 'true';
const allOf = (t) => {
  switch (t.kind) {
    case 'css': return [...document.querySelectorAll(t.selector)];
    case 'role': return [...document.querySelectorAll('[role="' + t.role + '"]')];
    case 'rowControl': {
      const row = document.querySelector(t.row + '[data-item-index="' + t.index + '"]');
      return row ? [...row.querySelectorAll(t.control)] : [];
    }
  }
  return [];
};
const pick = (t) => {
  const els = allOf(t);
  const nth = t.nth ?? 0;
  return (nth < 0 ? els[els.length + nth] : els[nth]) ?? null;
};
const accessibleName = (el) => {
  const label = el.getAttribute('aria-label');
  if (label) return label;
  const by = el.getAttribute('aria-labelledby');
  if (by) {
    const text = by.split(/\s+/).map((id) => document.getElementById(id)).filter(Boolean).map(innerText).join(' ');
    if (text.trim()) return text;
  }
  return innerText(el);
};
"#;

/// State of a target and its siblings
pub const PROBE: &str = r#"
const els = allOf(args.target);
const el = pick(args.target);
return { count: els.length, found: !!el, visible: visible(el), enabled: enabled(el), anyVisible: els.some(visible) };
"#;

pub const ATTRIBUTE: &str = r#"
const el = pick(args.target);
return el ? el.getAttribute(args.name) : null;
"#;

pub const NAMES: &str = r#"
return allOf(args.target).map((el) => accessibleName(el).trim());
"#;

pub const TEXTS: &str = r#"
return allOf(args.target).map((el) => innerText(el).trim());
"#;

/// Scroll the target into view and report where a pointer click would land
pub const CLICK_POINT: &str = r#"
const el = pick(args.target);
if (!el) return null;
el.scrollIntoView({ block: 'center', inline: 'center' });
const rect = el.getBoundingClientRect();
const x = rect.left + rect.width / 2;
const y = rect.top + rect.height / 2;
const hit = document.elementFromPoint(x, y);
return { x, y, visible: visible(el), enabled: enabled(el), receives: !!hit && (hit === el || el.contains(hit)) };
"#;

pub const DOM_CLICK: &str = r#"
const el = pick(args.target);
if (!el) return false;
el.scrollIntoView({ block: 'center', inline: 'center' });
el.click();
return true;
"#;

pub const READY_STATE: &str = r#"
return document.readyState;
"#;

pub const LIST_ROWS: &str = r#"
return [...document.querySelectorAll(args.row)].map((row) => {
  const container = row.querySelector(args.fields);
  const cells = container ? [...container.querySelectorAll(args.cell)] : [];
  return {
    itemIndex: row.getAttribute('data-item-index'),
    elementId: row.getAttribute('id'),
    cells: cells.map((cell) => ({ key: cell.getAttribute('data-automation-key'), text: innerText(cell) })),
  };
});
"#;

/// Scroll the list container (`top`, `by` or `metrics`) and report its offsets
pub const SCROLL: &str = r#"
const container = document.querySelector(args.selector) ||
  document.querySelector('.ms-DetailsList') ||
  document.querySelector('.ms-List') ||
  document.scrollingElement ||
  document.documentElement;
const max = () => Math.max(0, container.scrollHeight - container.clientHeight);
if (args.op === 'top') {
  container.scrollTop = 0;
  window.scrollTo(0, 0);
} else if (args.op === 'by') {
  container.scrollTop = Math.min(container.scrollTop + args.step, max());
  window.scrollTo(0, container.scrollTop);
}
return { top: container.scrollTop, max: max() };
"#;

pub const HEADINGS: &str = r#"
return [...document.querySelectorAll('h3')].map((h) => innerText(h));
"#;

/// Content relative to the nth `h3`: a descendant of its parent or a following sibling
pub const SECTION: &str = r#"
const heading = document.querySelectorAll('h3')[args.heading];
if (!heading) return null;
let el = null;
if (args.relation === 'following') {
  el = heading.nextElementSibling;
  while (el && el.tagName.toLowerCase() !== args.tag) el = el.nextElementSibling;
} else if (heading.parentElement) {
  el = heading.parentElement.querySelector(args.tag);
}
if (!el) return null;
return args.attr ? el.getAttribute(args.attr) : innerText(el);
"#;

/// Wrap a script body into a self-invoking expression bound to `args`
pub fn call<A: Serialize + ?Sized>(body: &str, args: &A) -> Result<String> {
    let args = serde_json::to_string(args)?;
    Ok(format!(
        "(() => {{\n{}\nconst args = {};\n{}\n}})()",
        PRELUDE, args, body
    ))
}
