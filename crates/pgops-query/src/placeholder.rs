//! `%s` marker handling.
//!
//! Fragments are assembled with positional `%s` markers, the calling
//! convention users write in where clauses. Before a statement reaches the
//! server the markers are rewritten into PostgreSQL's numbered `$n` form.
//!
//! Rules:
//! - `%s` outside quoted text and comments becomes `$n`, counting from
//!   `offset + 1`.
//! - `%%` becomes a literal `%` anywhere, so `like 'wat%%'` reaches the
//!   server as `like 'wat%'`.
//! - Text is otherwise copied verbatim inside single-quoted literals
//!   (including `E'...'` strings with backslash escapes), double-quoted
//!   identifiers, `$tag$...$tag$` dollar quotes, `--` line comments and
//!   nested `/* ... */` block comments.

#[derive(Clone, PartialEq, Eq)]
enum Scan {
    Normal,
    Literal { backslash_escapes: bool },
    Identifier,
    LineComment,
    BlockComment { depth: usize },
    DollarQuoted { tag: String },
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// The opening `$tag$` at the start of `rest`, if any.
fn dollar_tag(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix('$')?;
    let end = body.find('$')?;
    let tag = &body[..end];
    let mut chars = tag.chars();
    let valid = match chars.next() {
        None => true,
        Some(first) => {
            (first.is_alphabetic() || first == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        }
    };
    valid.then_some(&rest[..end + 2])
}

/// Whether a quote at the end of `before` opens an `E'...'` string.
fn opens_escape_string(before: &str) -> bool {
    let mut rev = before.chars().rev();
    matches!(rev.next(), Some('E' | 'e')) && !rev.next().is_some_and(is_ident_char)
}

fn rewrite(sql: &str, offset: usize, mut on_marker: impl FnMut(&mut String, usize)) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut state = Scan::Normal;
    let mut index = offset;
    let mut pos = 0;

    while let Some(c) = sql[pos..].chars().next() {
        let rest = &sql[pos..];
        if rest.starts_with("%%") {
            out.push('%');
            pos += 2;
            continue;
        }

        match &mut state {
            Scan::Normal => {
                if rest.starts_with("%s") {
                    index += 1;
                    on_marker(&mut out, index);
                    pos += 2;
                    continue;
                }
                let before = &sql[..pos];
                match c {
                    '\'' => {
                        state = Scan::Literal {
                            backslash_escapes: opens_escape_string(before),
                        };
                    }
                    '"' => state = Scan::Identifier,
                    '-' if rest.starts_with("--") => {
                        state = Scan::LineComment;
                        out.push_str("--");
                        pos += 2;
                        continue;
                    }
                    '/' if rest.starts_with("/*") => {
                        state = Scan::BlockComment { depth: 1 };
                        out.push_str("/*");
                        pos += 2;
                        continue;
                    }
                    '$' if !before.chars().next_back().is_some_and(is_ident_char) => {
                        if let Some(tag) = dollar_tag(rest) {
                            out.push_str(tag);
                            pos += tag.len();
                            state = Scan::DollarQuoted {
                                tag: tag.to_string(),
                            };
                            continue;
                        }
                    }
                    _ => {}
                }
            }
            Scan::Literal { backslash_escapes } => {
                if *backslash_escapes && c == '\\' {
                    if let Some(next) = rest[1..].chars().next() {
                        out.push(c);
                        out.push(next);
                        pos += 1 + next.len_utf8();
                        continue;
                    }
                } else if c == '\'' {
                    // A doubled quote closes and immediately reopens, which
                    // leaves the state unchanged over the pair.
                    state = Scan::Normal;
                }
            }
            Scan::Identifier => {
                if c == '"' {
                    state = Scan::Normal;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    state = Scan::Normal;
                }
            }
            Scan::BlockComment { depth } => {
                if rest.starts_with("*/") {
                    *depth -= 1;
                    if *depth == 0 {
                        state = Scan::Normal;
                    }
                    out.push_str("*/");
                    pos += 2;
                    continue;
                }
                if rest.starts_with("/*") {
                    *depth += 1;
                    out.push_str("/*");
                    pos += 2;
                    continue;
                }
            }
            Scan::DollarQuoted { tag } => {
                if rest.starts_with(tag.as_str()) {
                    let len = tag.len();
                    out.push_str(&rest[..len]);
                    pos += len;
                    state = Scan::Normal;
                    continue;
                }
            }
        }

        out.push(c);
        pos += c.len_utf8();
    }

    out
}

/// Rewrite `%s` markers into `$n` placeholders starting at `offset + 1`.
///
/// ```
/// use pgops_query::number_placeholders;
///
/// assert_eq!(
///     number_placeholders("depth > %s and description = %s", 2),
///     "depth > $3 and description = $4"
/// );
/// assert_eq!(number_placeholders("name like 'a%%'", 0), "name like 'a%'");
/// ```
pub fn number_placeholders(sql: &str, offset: usize) -> String {
    rewrite(sql, offset, |out, n| {
        out.push('$');
        out.push_str(&n.to_string());
    })
}

/// Count the `%s` markers that [`number_placeholders`] would rewrite.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    rewrite(sql, 0, |_, _| count += 1);
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_markers_in_order() {
        assert_eq!(
            number_placeholders("insert into t (a,b) values (%s,%s)", 0),
            "insert into t (a,b) values ($1,$2)"
        );
    }

    #[test]
    fn offset_continues_numbering() {
        assert_eq!(number_placeholders("gid = %s", 3), "gid = $4");
    }

    #[test]
    fn geometry_expression_keeps_its_literals() {
        assert_eq!(
            number_placeholders("%s,st_transform(st_geometryfromtext(%s,25830),25831)", 0),
            "$1,st_transform(st_geometryfromtext($2,25830),25831)"
        );
    }

    #[test]
    fn markers_inside_quotes_are_left_alone() {
        assert_eq!(
            number_placeholders("note = '%s' and \"odd%scol\" = %s", 0),
            "note = '%s' and \"odd%scol\" = $1"
        );
        assert_eq!(count_placeholders("note = '%s' and a = %s"), 1);
    }

    #[test]
    fn doubled_quotes_inside_literals() {
        assert_eq!(
            number_placeholders("owner = 'O''Brien' and gid = %s", 0),
            "owner = 'O''Brien' and gid = $1"
        );
    }

    #[test]
    fn escaped_percent() {
        assert_eq!(
            number_placeholders("description like %s || '%%'", 0),
            "description like $1 || '%'"
        );
        assert_eq!(count_placeholders("a like 'x%%' and b = %s"), 1);
        assert_eq!(number_placeholders("100%%s", 0), "100%s");
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_eq!(
            number_placeholders("gid = %s -- not %s\nand depth = %s", 0),
            "gid = $1 -- not %s\nand depth = $2"
        );
    }

    #[test]
    fn block_comments_are_skipped() {
        assert_eq!(
            number_placeholders("gid = %s /* not %s /* nested %s */ still */ and a = %s", 0),
            "gid = $1 /* not %s /* nested %s */ still */ and a = $2"
        );
        assert_eq!(count_placeholders("a / b = %s"), 1);
    }

    #[test]
    fn escape_strings_keep_backslash_quotes() {
        assert_eq!(
            number_placeholders(r"note = E'it\'s %s' and gid = %s", 0),
            r"note = E'it\'s %s' and gid = $1"
        );
        // Outside an E string a backslash is an ordinary character.
        assert_eq!(count_placeholders(r"path = 'c:\' and gid = %s"), 1);
        assert_eq!(count_placeholders(r"typname='a\' and gid = %s"), 1);
    }

    #[test]
    fn dollar_quotes_are_skipped() {
        assert_eq!(
            number_placeholders("body = $$100 %s$$ and gid = %s", 0),
            "body = $$100 %s$$ and gid = $1"
        );
        assert_eq!(
            number_placeholders("body = $fn$ a $$ %s $fn$ and gid = %s", 0),
            "body = $fn$ a $$ %s $fn$ and gid = $1"
        );
        assert_eq!(count_placeholders("col$1 = %s and x = $1"), 1);
    }

    #[test]
    fn lone_percent_is_kept() {
        assert_eq!(number_placeholders("gid %% 2 = 0 and a % b", 0), "gid % 2 = 0 and a % b");
        assert_eq!(count_placeholders("no markers here"), 0);
    }
}
