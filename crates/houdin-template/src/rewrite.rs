//! Source-level rewrites applied to a placeholder before minijinja compiles it.
//!
//! Two dialect differences are bridged:
//!
//! - Liquid filter arguments: `value | append: "b", "c"` becomes
//!   `value | append("b", "c")`.
//! - Paths that are not valid identifiers: `http-1.data.items.0` becomes
//!   `nodes["http-1"].data.items[0]`, and `env.api-key` becomes `env["api-key"]`.

/// Rewrite an expression into plain minijinja syntax.
pub fn rewrite_expression(expr: &str) -> String {
  let segments = split_pipes(expr);
  let mut out = String::with_capacity(expr.len() + 16);

  for (i, segment) in segments.iter().enumerate() {
    if i > 0 {
      out.push_str(" | ");
      out.push_str(&rewrite_filter(segment.trim()));
    } else {
      out.push_str(segment.trim());
    }
  }

  rewrite_paths(&out)
}

/// Split on `|` outside of string literals and brackets.
fn split_pipes(expr: &str) -> Vec<&str> {
  let mut segments = Vec::new();
  let mut depth = 0usize;
  let mut quote: Option<char> = None;
  let mut escaped = false;
  let mut start = 0;

  for (i, c) in expr.char_indices() {
    if let Some(q) = quote {
      if escaped {
        escaped = false;
      } else if c == '\\' {
        escaped = true;
      } else if c == q {
        quote = None;
      }
      continue;
    }
    match c {
      '"' | '\'' => quote = Some(c),
      '(' | '[' | '{' => depth += 1,
      ')' | ']' | '}' => depth = depth.saturating_sub(1),
      '|' if depth == 0 => {
        segments.push(&expr[start..i]);
        start = i + 1;
      }
      _ => {}
    }
  }
  segments.push(&expr[start..]);
  segments
}

/// `name: a, b` to `name(a, b)`. Anything else is returned unchanged.
fn rewrite_filter(segment: &str) -> String {
  let name_len = segment
    .char_indices()
    .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
    .count();
  if name_len == 0 {
    return segment.to_string();
  }

  let (name, rest) = segment.split_at(name_len);
  let rest = rest.trim_start();
  match rest.strip_prefix(':') {
    Some(args) => format!("{}({})", name, args.trim()),
    None => segment.to_string(),
  }
}

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if is_ident_start(c))
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Read a path segment starting at `start`: alphanumerics, underscores, and
/// hyphens that sit directly between two word characters.
fn read_segment(chars: &[char], start: usize) -> usize {
  let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
  let mut end = start;
  while end < chars.len() {
    let c = chars[end];
    if word(c) {
      end += 1;
    } else if c == '-'
      && end > start
      && word(chars[end - 1])
      && chars.get(end + 1).is_some_and(|n| word(*n))
    {
      end += 1;
    } else {
      break;
    }
  }
  end
}

fn quoted(s: &str) -> String {
  format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn rewrite_paths(expr: &str) -> String {
  let chars: Vec<char> = expr.chars().collect();
  let mut out = String::with_capacity(expr.len() + 16);
  let mut quote: Option<char> = None;
  let mut escaped = false;
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];

    if let Some(q) = quote {
      out.push(c);
      if escaped {
        escaped = false;
      } else if c == '\\' {
        escaped = true;
      } else if c == q {
        quote = None;
      }
      i += 1;
      continue;
    }

    if c == '"' || c == '\'' {
      quote = Some(c);
      out.push(c);
      i += 1;
      continue;
    }

    // Attribute access: `.seg`
    if c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_') {
      let end = read_segment(&chars, i + 1);
      let segment: String = chars[i + 1..end].iter().collect();
      if is_ident(&segment) {
        out.push('.');
        out.push_str(&segment);
      } else if segment.chars().all(|d| d.is_ascii_digit()) {
        out.push('[');
        out.push_str(&segment);
        out.push(']');
      } else {
        out.push('[');
        out.push_str(&quoted(&segment));
        out.push(']');
      }
      i = end;
      continue;
    }

    let starts_token = i == 0 || !(chars[i - 1].is_ascii_alphanumeric() || chars[i - 1] == '_');
    if starts_token && (is_ident_start(c) || c.is_ascii_digit()) {
      let end = read_segment(&chars, i);
      let head: String = chars[i..end].iter().collect();

      if is_ident(&head) {
        out.push_str(&head);
      } else if c.is_ascii_digit() && !head.chars().any(|h| h.is_ascii_alphabetic() || h == '_') {
        // Numeric literal, possibly with a fraction or a subtraction like `5-3`.
        out.push_str(&head);
        if chars.get(end) == Some(&'.') && chars.get(end + 1).is_some_and(|d| d.is_ascii_digit()) {
          let mut frac = end + 1;
          while frac < chars.len() && chars[frac].is_ascii_digit() {
            frac += 1;
          }
          out.extend(&chars[end..frac]);
          i = frac;
          continue;
        }
      } else {
        out.push_str("nodes[");
        out.push_str(&quoted(&head));
        out.push(']');
      }
      i = end;
      continue;
    }

    out.push(c);
    i += 1;
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_plain_expression_unchanged() {
    assert_eq!(rewrite_expression("a.b"), "a.b");
    assert_eq!(rewrite_expression("x | upper"), "x | upper");
    assert_eq!(rewrite_expression("1 + 2.5"), "1 + 2.5");
    assert_eq!(rewrite_expression("a - b"), "a - b");
  }

  #[test]
  fn test_liquid_filter_arguments() {
    assert_eq!(rewrite_expression("\"a\" | append: \"b\""), "\"a\" | append(\"b\")");
    assert_eq!(
      rewrite_expression("items | map: \"price\" | sum"),
      "items | map(\"price\") | sum"
    );
    assert_eq!(
      rewrite_expression("s | replace: \"a\", \"b\""),
      "s | replace(\"a\", \"b\")"
    );
  }

  #[test]
  fn test_pipe_inside_string_is_literal() {
    assert_eq!(
      rewrite_expression("x | join: \" | \""),
      "x | join(\" | \")"
    );
  }

  #[test]
  fn test_hyphenated_node_id() {
    assert_eq!(
      rewrite_expression("http-request-1.data.ip"),
      "nodes[\"http-request-1\"].data.ip"
    );
  }

  #[test]
  fn test_uuid_like_node_id() {
    assert_eq!(
      rewrite_expression("3f2a-b9.value"),
      "nodes[\"3f2a-b9\"].value"
    );
  }

  #[test]
  fn test_numeric_and_hyphenated_segments() {
    assert_eq!(rewrite_expression("a.items.0.name"), "a.items[0].name");
    assert_eq!(rewrite_expression("env.api-key"), "env[\"api-key\"]");
  }

  #[test]
  fn test_string_contents_untouched() {
    assert_eq!(
      rewrite_expression("\"my-node.0\" | append: x-y"),
      "\"my-node.0\" | append(nodes[\"x-y\"])"
    );
  }
}
