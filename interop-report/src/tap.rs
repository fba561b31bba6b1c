#![forbid(unsafe_code)]

//! Test report parser.
//!
//! Two dialects are understood:
//!
//! * TAP (`TAP version 13/14`): plan line `1..N`, one `ok`/`not ok` line per test point, optional
//!   `# SKIP` / `# TODO` directives, two-space indented YAML diagnostics between `---` and `...`,
//!   four-space indented subtests and `Bail out!`.
//! * Legacy: one `✓ name` or `✗ name` line per test.
//!
//! TAP wins whenever a version line appears anywhere in the text. Each line may carry a
//! supervisor prefix (`client-1  | ` or `[client] `), which is removed before classification.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{eof, map, map_res, opt, rest, value},
    sequence::{delimited, preceded, terminated},
    IResult,
};
use thiserror::Error;
use tracing::trace;

use crate::verdict::{Dialect, Directive, DirectiveKind, RunVerdict, TestCase};

/// Legacy pass marker.
pub const PASS_GLYPH: char = '✓';
/// Legacy fail marker.
pub const FAIL_GLYPH: char = '✗';

/// Output that carries no verdict at all. Distinct from a verdict of zero tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("no output")]
    Empty,
    #[error("output contained no recognizable test results")]
    NoVerdictContent,
}

/// Decode raw process output into a [`RunVerdict`].
pub fn parse(output: &str) -> Result<RunVerdict, ParseFailure> {
    let lines: Vec<&str> = output.lines().map(strip_line_prefix).collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Err(ParseFailure::Empty);
    }

    match lines.iter().find_map(|l| version_line(l.trim()).ok().map(|(_, v)| v)) {
        Some(version) => parse_tap(&lines, version),
        None => parse_legacy(&lines),
    }
}

// ---------------------------------------------------------------------------
// Line prefixes
// ---------------------------------------------------------------------------

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// `name   | `
fn compose_prefix(input: &str) -> IResult<&str, &str> {
    terminated(take_while1(is_name_char), terminated(preceded(space0, char('|')), opt(char(' '))))(input)
}

/// `[name] `
fn bracket_prefix(input: &str) -> IResult<&str, &str> {
    terminated(delimited(char('['), take_while1(is_name_char), char(']')), opt(char(' ')))(input)
}

/// Remove a recognised supervisor prefix, keeping the indentation that follows it.
pub fn strip_line_prefix(line: &str) -> &str {
    match alt((compose_prefix, bracket_prefix))(line) {
        Ok((remaining, _)) => remaining,
        Err(_) => line,
    }
}

// ---------------------------------------------------------------------------
// TAP grammar
// ---------------------------------------------------------------------------

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn version_line(input: &str) -> IResult<&str, u32> {
    let (input, _) = tag("TAP version")(input)?;
    let (input, _) = space1(input)?;
    let (input, version) = number(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = eof(input)?;
    Ok((input, version))
}

/// `1..N` with an optional trailing comment.
fn plan_line(input: &str) -> IResult<&str, u32> {
    let (input, _) = tag("1..")(input)?;
    let (input, count) = number(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = alt((eof, preceded(char('#'), rest)))(input)?;
    Ok((input, count))
}

fn bail_out_line(input: &str) -> IResult<&str, &str> {
    preceded(tag("Bail out!"), rest)(input)
}

#[derive(Debug, PartialEq, Eq)]
struct VerdictLine<'a> {
    ok: bool,
    number: Option<u32>,
    description: &'a str,
    directive: Option<Directive>,
}

fn verdict_line(input: &str) -> IResult<&str, VerdictLine<'_>> {
    let (input, negated) = opt(tag("not "))(input)?;
    let (input, _) = tag("ok")(input)?;
    let (input, _) = alt((space1, eof))(input)?;
    let (input, number) = opt(terminated(number, space0))(input)?;
    let (input, _) = opt(terminated(char('-'), space0))(input)?;
    let (description, directive) = split_directive(input);
    Ok(("", VerdictLine { ok: negated.is_none(), number, description, directive }))
}

/// Split a description at its first unescaped `#`.
fn split_directive(s: &str) -> (&str, Option<Directive>) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'#' => return (s[..i].trim_end(), directive(s[i + 1..].trim()).ok().map(|(_, d)| d)),
            _ => i += 1,
        }
    }
    (s.trim_end(), None)
}

/// `SKIP reason`, `skipped: reason`, `TODO reason` (case insensitive).
fn directive(input: &str) -> IResult<&str, Directive> {
    let (input, kind) = alt((
        value(DirectiveKind::Skip, tag_no_case("skip")),
        value(DirectiveKind::Todo, tag_no_case("todo")),
    ))(input)?;
    let (input, _) = take_while(char::is_alphabetic)(input)?;
    let (input, _) = opt(char(':'))(input)?;
    let (input, reason) = map(rest, str::trim)(input)?;
    Ok((input, Directive { kind, reason: reason.to_string() }))
}

/// `key: value` inside a YAML diagnostic block. Nested structures are ignored.
fn yaml_pair(body: &str) -> Option<(String, String)> {
    let (key, val) = body.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.starts_with('-') || key.contains(char::is_whitespace) {
        return None;
    }
    let val = val.trim();
    let val = match val.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => val.to_string(),
    };
    Some((key.to_string(), val))
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn parse_tap(lines: &[&str], version: u32) -> Result<RunVerdict, ParseFailure> {
    let mut planned = None;
    let mut bail_out = None;
    let mut cases: Vec<TestCase> = Vec::new();
    let mut saw_plan = false;

    // Indent of the open YAML block and whether it belongs to the last top-level case.
    let mut yaml: Option<(usize, bool)> = None;
    let mut after_top_level_verdict = false;

    for raw in lines {
        let indent = indentation(raw);
        let body = raw[indent..].trim_end();

        if let Some((yaml_indent, attach)) = yaml {
            if body.is_empty() {
                continue;
            }
            // A dedent past the block closes it even without `...`.
            if indent < yaml_indent {
                trace!(line = body, "diagnostic block closed without terminator");
                yaml = None;
            } else {
                if body == "..." && indent == yaml_indent {
                    yaml = None;
                } else if attach && indent == yaml_indent {
                    if let (Some((k, v)), Some(case)) = (yaml_pair(body), cases.last_mut()) {
                        case.diagnostics.insert(k, v);
                    }
                }
                continue;
            }
        }

        if body == "---" && indent > 0 {
            yaml = Some((indent, after_top_level_verdict));
            continue;
        }
        after_top_level_verdict = false;

        if body.is_empty() {
            continue;
        }
        if let Ok((_, reason)) = bail_out_line(body) {
            bail_out = Some(reason.trim().to_string());
            break;
        }
        if indent > 0 {
            trace!(line = body, "nested line ignored for counting");
            continue;
        }

        if let Ok((_, count)) = plan_line(body) {
            if !saw_plan {
                planned = Some(count);
                saw_plan = true;
            }
        } else if let Ok((_, v)) = verdict_line(body) {
            let name = v.description.replace("\\#", "#");
            cases.push(TestCase::new(v.number, name, v.ok, v.directive));
            after_top_level_verdict = true;
        }
    }

    if !saw_plan && cases.is_empty() && bail_out.is_none() {
        return Err(ParseFailure::NoVerdictContent);
    }
    Ok(RunVerdict { dialect: Dialect::Tap { version }, planned, bail_out, cases })
}

fn parse_legacy(lines: &[&str]) -> Result<RunVerdict, ParseFailure> {
    let mut cases = Vec::new();
    for line in lines {
        let body = line.trim();
        let (ok, name) = if let Some(name) = body.strip_prefix(PASS_GLYPH) {
            (true, name)
        } else if let Some(name) = body.strip_prefix(FAIL_GLYPH) {
            (false, name)
        } else {
            continue;
        };
        cases.push(TestCase::new(None, name.trim(), ok, None));
    }
    if cases.is_empty() {
        return Err(ParseFailure::NoVerdictContent);
    }
    Ok(RunVerdict { dialect: Dialect::Legacy, planned: None, bail_out: None, cases })
}
