//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Case-insensitive substring match of `query` against the space-joined fields.
/// An empty (or blank) query matches everything.
pub fn matches_query(query: &str, fields: &[&str]) -> bool {
  let q = query.trim().to_lowercase();
  if q.is_empty() {
    return true;
  }
  fields.join(" ").to_lowercase().contains(&q)
}

/// Class ids end up in file paths and URLs, so only `[A-Za-z0-9_-]` is allowed.
pub fn is_valid_class_id(id: &str) -> bool {
  !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge remote error payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
