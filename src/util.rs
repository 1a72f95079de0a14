//! Small utility helpers used across modules.

/// Log-safe truncation for large strings.
/// Keeps query texts and upstream error bodies from flooding the logs.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
