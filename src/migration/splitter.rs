//! SQL statement splitter.
//!
//! Splits a script on top-level semicolons while preserving single-quoted
//! strings (with `''` escapes), dollar-quoted bodies whose opening and
//! closing tags must match, `--` line comments, and `/* ... */` block
//! comments. Whitespace-only statements are dropped.

/// Split `sql` into individual statements.
pub fn split_statements(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut buf = String::new();

    let mut in_single = false;
    let mut in_dollar = false;
    let mut dollar_tag = String::new();
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;

        // Comment endings.
        if in_line_comment {
            buf.push(c);
            if c == '\n' {
                in_line_comment = false;
            }
            i += 1;
            continue;
        }
        if in_block_comment {
            if c == '*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                buf.push_str("*/");
                i += 2;
                in_block_comment = false;
                continue;
            }
            buf.push(c);
            i += 1;
            continue;
        }

        // Comment starts, only outside strings and dollar bodies.
        if !in_single && !in_dollar {
            if c == '-' && i + 1 < bytes.len() && bytes[i + 1] == b'-' {
                buf.push_str("--");
                i += 2;
                in_line_comment = true;
                continue;
            }
            if c == '/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
                buf.push_str("/*");
                i += 2;
                in_block_comment = true;
                continue;
            }
        }

        // Single-quoted string with '' escape.
        if !in_dollar && c == '\'' {
            buf.push(c);
            i += 1;
            in_single = true;
            while i < bytes.len() {
                let sc = bytes[i] as char;
                buf.push(sc);
                if sc == '\'' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        buf.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    in_single = false;
                    break;
                }
                i += 1;
            }
            continue;
        }

        // Dollar-quote open/close; the tag may be empty ($$) or
        // alphanumeric/underscore.
        if !in_single && c == '$' {
            let mut j = i + 1;
            while j < bytes.len() {
                let ch = bytes[j] as char;
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    j += 1;
                } else {
                    break;
                }
            }
            if j < bytes.len() && bytes[j] == b'$' {
                let tag = &sql[i..=j];
                buf.push_str(tag);
                i = j + 1;
                if !in_dollar {
                    in_dollar = true;
                    dollar_tag = tag.to_string();
                } else if tag == dollar_tag {
                    in_dollar = false;
                    dollar_tag.clear();
                }
                continue;
            }
        }

        // Statement boundary.
        if !in_single && !in_dollar && c == ';' {
            let statement = buf.trim();
            if !statement.is_empty() {
                out.push(statement.to_string());
            }
            buf.clear();
            i += 1;
            continue;
        }

        buf.push(c);
        i += 1;
    }

    let tail = buf.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Number of statements a script would execute.
pub fn count_statements(sql: &str) -> usize {
    split_statements(sql).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_split() {
        let stmts = split_statements("CREATE TABLE a(id INT); CREATE TABLE b(id INT);");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "CREATE TABLE a(id INT)");
        assert_eq!(stmts[1], "CREATE TABLE b(id INT)");
    }

    #[test]
    fn test_empty_statements_dropped() {
        let stmts = split_statements(";;  ;\n;SELECT 1;");
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn test_semicolon_inside_single_quotes() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1;");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 2;");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("it''s; fine"));
    }

    #[test]
    fn test_dollar_quoted_body_kept_whole() {
        let sql = "CREATE FUNCTION f() RETURNS trigger AS $fn$\n\
                   BEGIN\n  NEW.x := 1; RETURN NEW;\nEND;\n$fn$ LANGUAGE plpgsql;\n\
                   SELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("RETURN NEW;"));
        assert!(stmts[0].ends_with("LANGUAGE plpgsql"));
    }

    #[test]
    fn test_dollar_tags_must_match() {
        let sql = "SELECT $a$ body with $b$ inner $b$ still body; $a$; SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("still body;"));
    }

    #[test]
    fn test_anonymous_dollar_quotes() {
        let sql = "DO $$ BEGIN PERFORM 1; END $$; SELECT 3;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("PERFORM 1;"));
    }

    #[test]
    fn test_line_comment_hides_semicolon() {
        let sql = "SELECT 1 -- trailing; not a boundary\n, 2; SELECT 3;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("not a boundary"));
    }

    #[test]
    fn test_block_comment_hides_semicolon() {
        let sql = "SELECT 1 /* ; ; ; */; SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("/* ; ; ; */"));
    }

    #[test]
    fn test_join_split_is_lossless_for_well_formed_input() {
        let sql = "CREATE TABLE x(id INT);\nINSERT INTO x VALUES (1);\nSELECT * FROM x;";
        let stmts = split_statements(sql);
        let rejoined = format!("{};", stmts.join(";\n"));
        // Re-splitting the rejoined script yields the same statements.
        assert_eq!(split_statements(&rejoined), stmts);
    }

    #[test]
    fn test_no_trailing_semicolon() {
        let stmts = split_statements("SELECT 1");
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn test_count_statements() {
        assert_eq!(count_statements(""), 0);
        assert_eq!(count_statements("SELECT 1; SELECT 2; SELECT 3;"), 3);
    }
}
