//! Small text utilities shared by the patch strategies.

use std::fs;
use std::io;
use std::path::Path;

const BOM: char = '\u{FEFF}';

/// Drop a leading byte-order mark. Electron's module loader rejects
/// BOM-prefixed scripts.
pub fn strip_bom(src: &str) -> &str {
    src.strip_prefix(BOM).unwrap_or(src)
}

/// Write via a sibling temp file and rename, so a reader never sees half a
/// file.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".pathmod-tmp");
    let tmp = std::path::PathBuf::from(tmp);
    fs::write(&tmp, content.as_bytes())?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Leading whitespace of `line`.
pub fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Js,
    Css,
}

impl Syntax {
    /// Syntax for a target path, or `None` when no structural check applies.
    pub fn for_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".js") || lower.ends_with(".mjs") || lower.ends_with(".cjs") {
            Some(Syntax::Js)
        } else if lower.ends_with(".css") {
            Some(Syntax::Css)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imbalance {
    pub line: usize,
    pub detail: String,
}

impl std::fmt::Display for Imbalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.detail)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    Template,
    Regex { in_class: bool },
}

const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%<>~^";
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "in", "of", "delete", "void", "throw", "new", "else",
];

/// Check that `{}`, `[]` and `()` nest correctly outside strings, comments,
/// template text and regex literals.
pub fn check_balance(src: &str, syntax: Syntax) -> Result<(), Imbalance> {
    let chars: Vec<char> = src.chars().collect();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut mode = Mode::Code;
    let mut line = 1usize;
    let mut mode_line = 1usize;
    let mut last_sig: Option<char> = None;
    let mut word = String::new();
    let mut last_word = String::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c == '\n' {
            line += 1;
        }

        match mode {
            Mode::LineComment => {
                if c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    mode = Mode::Code;
                    i += 1;
                }
            }
            Mode::Str(q) => {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    mode = Mode::Code;
                    last_sig = Some(q);
                }
            }
            Mode::Template => {
                if c == '\\' {
                    i += 1;
                } else if c == '`' {
                    mode = Mode::Code;
                    last_sig = Some('`');
                } else if c == '$' && next == Some('{') {
                    stack.push(('$', line));
                    mode = Mode::Code;
                    last_sig = Some('{');
                    i += 1;
                }
            }
            Mode::Regex { in_class } => {
                if c == '\\' {
                    i += 1;
                } else if c == '\n' {
                    return Err(Imbalance {
                        line: mode_line,
                        detail: "unterminated regex literal".into(),
                    });
                } else if in_class && c == ']' {
                    mode = Mode::Regex { in_class: false };
                } else if !in_class && c == '[' {
                    mode = Mode::Regex { in_class: true };
                } else if !in_class && c == '/' {
                    mode = Mode::Code;
                    last_sig = Some(')');
                }
            }
            Mode::Code => {
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    word.push(c);
                } else if !word.is_empty() {
                    last_word = std::mem::take(&mut word);
                }

                match c {
                    '/' if syntax == Syntax::Css => {
                        if next == Some('*') {
                            mode = Mode::BlockComment;
                            mode_line = line;
                            i += 1;
                        }
                    }
                    '/' if next == Some('/') => {
                        mode = Mode::LineComment;
                        i += 1;
                    }
                    '/' if next == Some('*') => {
                        mode = Mode::BlockComment;
                        mode_line = line;
                        i += 1;
                    }
                    '/' => {
                        let regex_start = match last_sig {
                            None => true,
                            Some(p) if REGEX_PRECEDERS.contains(p) => true,
                            Some(p) if p.is_alphanumeric() || p == '_' || p == '$' => {
                                REGEX_KEYWORDS.contains(&last_word.as_str())
                            }
                            _ => false,
                        };
                        if regex_start {
                            mode = Mode::Regex { in_class: false };
                            mode_line = line;
                        }
                    }
                    '\'' | '"' => {
                        mode = Mode::Str(c);
                        mode_line = line;
                    }
                    '`' if syntax == Syntax::Js => {
                        mode = Mode::Template;
                        mode_line = line;
                    }
                    '{' | '[' | '(' => stack.push((c, line)),
                    '}' | ']' | ')' => {
                        let want = match c {
                            '}' => '{',
                            ']' => '[',
                            _ => '(',
                        };
                        match stack.pop() {
                            Some(('$', _)) if c == '}' => {
                                mode = Mode::Template;
                            }
                            Some((open, _)) if open == want => {}
                            Some((open, at)) => {
                                return Err(Imbalance {
                                    line,
                                    detail: format!(
                                        "'{c}' closes '{}' opened on line {at}",
                                        if open == '$' { '{' } else { open }
                                    ),
                                });
                            }
                            None => {
                                return Err(Imbalance {
                                    line,
                                    detail: format!("unmatched '{c}'"),
                                });
                            }
                        }
                    }
                    _ => {}
                }

                if !c.is_whitespace() && mode == Mode::Code && c != '/' {
                    last_sig = Some(c);
                }
            }
        }
        i += 1;
    }

    match mode {
        Mode::Code | Mode::LineComment => {}
        Mode::BlockComment => {
            return Err(Imbalance {
                line: mode_line,
                detail: "unterminated block comment".into(),
            })
        }
        Mode::Str(_) | Mode::Template | Mode::Regex { .. } => {
            return Err(Imbalance {
                line: mode_line,
                detail: "unterminated string literal".into(),
            })
        }
    }

    if let Some((open, at)) = stack.pop() {
        return Err(Imbalance {
            line: at,
            detail: format!("'{}' is never closed", if open == '$' { '{' } else { open }),
        });
    }
    Ok(())
}
