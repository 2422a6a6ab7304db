//! RDF-style terms and statements
//!
//! Every node in an assertion graph carries a concrete IRI — there are no
//! blank nodes anywhere in this model. That single restriction is what lets
//! canonicalization be a plain sort instead of a graph-isomorphism
//! algorithm (see `canon`).

use serde::{Deserialize, Serialize};

/// An absolute IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a fragment identifier off this IRI (`<base>#<fragment>`).
    pub fn with_fragment(&self, fragment: &str) -> Self {
        Self(format!("{}#{}", self.0, fragment))
    }
}

impl std::fmt::Display for Iri {
    /// N-Quads form: `<iri>`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl From<&str> for Iri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A literal value, optionally tagged with a datatype IRI.
///
/// Untagged literals are plain strings (`xsd:string` by RDF convention,
/// never written out explicitly).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<Iri>,
}

impl Literal {
    pub fn plain(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Some(datatype),
        }
    }
}

/// Escape a literal's lexical form for N-Quads output.
fn escape(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// Undo [`escape`]. Returns `None` on a dangling backslash or unknown code.
pub(crate) fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            _ => return None,
        }
    }
    Some(out)
}

impl std::fmt::Display for Literal {
    /// N-Quads form: `"lexical"` or `"lexical"^^<datatype>`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut escaped = String::with_capacity(self.lexical.len());
        escape(&self.lexical, &mut escaped);
        match &self.datatype {
            Some(dt) => write!(f, "\"{}\"^^{}", escaped, dt),
            None => write!(f, "\"{}\"", escaped),
        }
    }
}

/// Object position of a statement: an IRI reference or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(Iri::new(iri))
    }

    pub fn text(lexical: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(lexical))
    }

    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        Self::Literal(Literal::typed(lexical, datatype))
    }

    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Iri(_) => None,
            Self::Literal(lit) => Some(lit),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::Literal(lit) => lit.fmt(f),
        }
    }
}

/// A single statement: subject, predicate, object, optional named graph.
///
/// `Ord` is derived so a set of statements has one canonical order; the
/// serialized form additionally sorts by the rendered line (see `canon`),
/// which is the order consumers observe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Iri,
    pub predicate: Iri,
    pub object: Term,
    pub graph: Option<Iri>,
}

impl Statement {
    pub fn new(subject: Iri, predicate: Iri, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: None,
        }
    }

    pub fn in_graph(mut self, graph: Iri) -> Self {
        self.graph = Some(graph);
        self
    }
}

impl std::fmt::Display for Statement {
    /// One N-Quads line, without the trailing newline.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.graph {
            Some(g) => write!(f, "{} {} {} {} .", self.subject, self.predicate, self.object, g),
            None => write!(f, "{} {} {} .", self.subject, self.predicate, self.object),
        }
    }
}
