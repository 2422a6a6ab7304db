//! Canonical serialization and parsing of assertion graphs.
//!
//! The wire format is sorted N-Quads: one statement per line, lines sorted
//! bytewise, duplicates collapsed, trailing newline. Because every term is
//! a concrete IRI or literal (no blank nodes), two logically identical
//! graphs render to byte-identical output no matter what order their
//! statements were constructed in. Consumers (the reindex job) parse the
//! lines back with [`parse`].

use super::term::{unescape, Iri, Literal, Statement, Term};
use std::collections::BTreeSet;
use thiserror::Error;

/// Serialize statements into the canonical sorted N-Quads form.
pub fn serialize<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> String {
    let lines: BTreeSet<String> = statements
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Errors from parsing a serialized assertion.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Parse canonical N-Quads back into statements.
///
/// Accepts exactly what [`serialize`] emits — IRIs and literals only. A
/// blank-node label anywhere is a parse error, since no assertion this
/// system ever produced contains one.
pub fn parse(input: &str) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        statements.push(parse_line(line).map_err(|message| ParseError {
            line: idx + 1,
            message,
        })?);
    }
    Ok(statements)
}

fn parse_line(line: &str) -> Result<Statement, String> {
    let mut rest = line;

    let subject = take_iri(&mut rest)?;
    let predicate = take_iri(&mut rest)?;
    let object = take_term(&mut rest)?;

    let graph = if rest.trim_start().starts_with('<') {
        Some(take_iri(&mut rest)?)
    } else {
        None
    };

    if rest.trim() != "." {
        return Err(format!("expected terminating '.', found {:?}", rest.trim()));
    }

    Ok(Statement {
        subject,
        predicate,
        object,
        graph,
    })
}

fn take_iri<'a>(rest: &mut &'a str) -> Result<Iri, String> {
    let s: &'a str = (*rest).trim_start();
    if !s.starts_with('<') {
        if s.starts_with("_:") {
            return Err("blank node labels are not allowed".to_string());
        }
        return Err(format!("expected IRI, found {:?}", head(s)));
    }
    let end = s.find('>').ok_or("unterminated IRI")?;
    let iri = Iri::new(&s[1..end]);
    *rest = &s[end + 1..];
    Ok(iri)
}

fn take_term<'a>(rest: &mut &'a str) -> Result<Term, String> {
    let s: &'a str = (*rest).trim_start();
    if s.starts_with('<') || s.starts_with("_:") {
        return take_iri(rest).map(Term::Iri);
    }
    if !s.starts_with('"') {
        return Err(format!("expected literal or IRI, found {:?}", head(s)));
    }

    // find the closing quote, skipping escaped characters
    let bytes = s.as_bytes();
    let mut end = None;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => {
                end = Some(i);
                break;
            }
            _ => i += 1,
        }
    }
    let end = end.ok_or("unterminated literal")?;
    let lexical = unescape(&s[1..end]).ok_or("invalid escape sequence in literal")?;

    let mut after: &'a str = &s[end + 1..];
    let datatype = if let Some(stripped) = after.strip_prefix("^^") {
        after = stripped;
        Some(take_iri(&mut after)?)
    } else {
        None
    };
    *rest = after;

    Ok(Term::Literal(Literal { lexical, datatype }))
}

fn head(s: &str) -> &str {
    &s[..s.len().min(16)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::vocab;

    fn sample() -> Vec<Statement> {
        vec![
            Statement::new(
                Iri::new("http://example.org/doc/1"),
                Iri::new(vocab::SCHEMA_NAME),
                Term::text("A \"quoted\"\ntitle"),
            ),
            Statement::new(
                Iri::new("http://example.org/doc/1"),
                Iri::new(vocab::RDF_TYPE),
                Term::iri(vocab::SCHEMA_DIGITAL_DOCUMENT),
            ),
            Statement::new(
                Iri::new("cas:b3:aa"),
                Iri::new("http://purl.org/dc/elements/1.1/creator"),
                Term::text("Jane"),
            )
            .in_graph(Iri::new("cas:b3:bb#foreign")),
        ]
    }

    #[test]
    fn serialization_is_order_independent() {
        let mut forward = sample();
        let a = serialize(&forward);
        forward.reverse();
        let b = serialize(&forward);
        assert_eq!(a, b);
    }

    #[test]
    fn lines_are_sorted_and_deduplicated() {
        let mut stmts = sample();
        stmts.extend(sample()); // duplicates
        let out = serialize(&stmts);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn parse_round_trips_serialize() {
        let stmts = sample();
        let out = serialize(&stmts);
        let parsed = parse(&out).unwrap();
        assert_eq!(serialize(&parsed), out);
        // all original statements survive
        for s in &stmts {
            assert!(parsed.contains(s));
        }
    }

    #[test]
    fn parse_rejects_blank_nodes() {
        let err = parse("_:b0 <http://schema.org/name> \"x\" .\n").unwrap_err();
        assert!(err.message.contains("blank node"));
    }

    #[test]
    fn parse_rejects_unterminated_literal() {
        assert!(parse("<a:s> <a:p> \"oops .\n").is_err());
    }

    #[test]
    fn typed_literals_round_trip() {
        let stmt = Statement::new(
            Iri::new("http://example.org/doc/1"),
            Iri::new(vocab::SCHEMA_DATE_PUBLISHED),
            Term::typed("2020-01-01T00:00:00Z", vocab::xsd_date_time()),
        );
        let out = serialize(std::iter::once(&stmt));
        let parsed = parse(&out).unwrap();
        assert_eq!(parsed, vec![stmt]);
    }
}
