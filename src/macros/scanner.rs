//! Macro token scanning
//!
//! The scanner finds `$name(args)` occurrences and resolves the one
//! contextual name in the macro language: `$__timeGroup(...)` directly
//! followed by a comma is read as `$__timeGroupAlias(...)`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static MACRO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([_a-zA-Z0-9]+)\(([^)]*)\)").unwrap());

const TIME_GROUP: &str = "__timeGroup";
const TIME_GROUP_ALIAS: &str = "__timeGroupAlias";

/// One macro occurrence in a query template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroToken {
    /// Macro name without the leading `$`, after alias resolution
    pub name: String,
    /// Comma-split arguments, each trimmed of spaces
    pub args: Vec<String>,
    /// Byte range of the whole match in the scanned text
    pub span: Range<usize>,
}

/// Finds macro tokens in query text
pub trait MacroScanner: Send + Sync {
    /// Non-overlapping tokens in left-to-right order
    fn scan(&self, text: &str) -> Vec<MacroToken>;
}

/// Regex-driven scanner with one character of lookahead
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexScanner;

impl MacroScanner for RegexScanner {
    fn scan(&self, text: &str) -> Vec<MacroToken> {
        MACRO_PATTERN
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let name = caps.get(1)?.as_str();
                let args = caps.get(2)?.as_str();

                let followed_by_comma = text[whole.end()..].starts_with(',');
                let name = if name == TIME_GROUP && followed_by_comma {
                    TIME_GROUP_ALIAS
                } else {
                    name
                };

                Some(MacroToken {
                    name: name.to_string(),
                    args: split_args(args),
                    span: whole.range(),
                })
            })
            .collect()
    }
}

fn split_args(args: &str) -> Vec<String> {
    args.split(',').map(|a| a.trim_matches(' ').to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tokens() {
        let sql = "SELECT $__time(t), v FROM m WHERE $__timeFilter( t )";
        let tokens = RegexScanner.scan(sql);

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "__time");
        assert_eq!(tokens[0].args, vec!["t"]);
        assert_eq!(&sql[tokens[0].span.clone()], "$__time(t)");
        assert_eq!(tokens[1].name, "__timeFilter");
        assert_eq!(tokens[1].args, vec!["t"]);
    }

    #[test]
    fn test_split_args_trims_spaces() {
        let tokens = RegexScanner.scan("$__timeGroup(time, '5m', previous)");
        assert_eq!(tokens[0].args, vec!["time", "'5m'", "previous"]);
    }

    #[test]
    fn test_empty_args_yield_one_empty_arg() {
        let tokens = RegexScanner.scan("$__timeFrom()");
        assert_eq!(tokens[0].args, vec![""]);
    }

    #[test]
    fn test_time_group_lookahead() {
        let tokens = RegexScanner.scan("SELECT $__timeGroup(t,'5m'), v ORDER BY $__timeGroup(t,'5m')");
        assert_eq!(tokens[0].name, "__timeGroupAlias");
        assert_eq!(tokens[1].name, "__timeGroup");

        let tokens = RegexScanner.scan("$__timeGroup(t,'5m') ,v");
        assert_eq!(tokens[0].name, "__timeGroup");
    }

    #[test]
    fn test_time_group_before_closing_paren() {
        let sql = "SELECT max(v) FROM (SELECT $__timeGroup(t,'5m')) AS s";
        let tokens = RegexScanner.scan(sql);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].name, "__timeGroup");
        assert_eq!(tokens[0].args, vec!["t", "'5m'"]);
        assert_eq!(&sql[tokens[0].span.clone()], "$__timeGroup(t,'5m')");
    }

    #[test]
    fn test_unix_epoch_group_has_no_lookahead() {
        let tokens = RegexScanner.scan("$__unixEpochGroup(t,'5m'), v");
        assert_eq!(tokens[0].name, "__unixEpochGroup");
    }
}
