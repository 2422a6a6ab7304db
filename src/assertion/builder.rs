//! Assertion assembly
//!
//! Builds the provenance graph for one ingestion and hands it to `canon`
//! for serialization. The graph relates four main entities:
//!
//! - the Document (a `schema:DigitalDocument` under its archive URI)
//! - the File (the uploaded bytes, under its `cas:` URI)
//! - the Transcript (extracted text)
//! - the Metadata (extracted record)
//!
//! File, Transcript, and Metadata link back to the Document via
//! `schema:encodesCreativeWork`, and the Document forward via
//! `schema:associatedMedia`. Transcript and Metadata additionally carry
//! attribution, generation time, and a qualified generation activity whose
//! role distinguishes text extraction from metadata extraction.
//!
//! `build` is a pure function of its input: timestamps come in as fields,
//! node identifiers are derived from content ids, and serialization is
//! canonical — identical input yields byte-identical output.

use super::canon;
use super::term::{Iri, Statement, Term};
use super::vocab;
use crate::cas::ContentId;
use crate::extract::ExtractionAgent;
use crate::metadata::{NamespaceTable, NormalizedMetadata};
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// A required assertion input was missing or empty.
///
/// This is a contract violation by the caller, not an environmental
/// failure — it is never retried.
#[derive(Debug, Error)]
#[error("incomplete assertion input: missing {0}")]
pub struct IncompleteAssertionInput(pub &'static str);

/// Everything the builder needs to assemble one assertion.
#[derive(Debug, Clone)]
pub struct AssertionInput {
    pub document_id: String,
    pub organization_id: String,
    /// When the upload event occurred (`schema:uploadDate` on the file).
    pub event_time: DateTime<Utc>,
    /// When extraction ran (`prov:generatedAtTime` on transcript/metadata).
    pub generated_at: DateTime<Utc>,
    pub content_type: String,
    pub content_length: u64,
    pub file_name: String,
    /// URL of the file in the upload store.
    pub file_url: String,
    pub file_cid: Option<ContentId>,
    pub transcript_cid: Option<ContentId>,
    pub transcript_size: u64,
    pub metadata_cid: Option<ContentId>,
    pub metadata_size: u64,
    pub metadata: NormalizedMetadata,
    /// Identity of the extraction service and its two roles.
    pub agent: ExtractionAgent,
}

/// URI and URL derivation policy.
///
/// Document URIs are identifiers in the archive's namespace — plain http,
/// no www (see `vocab`). The gateway URL base resolves `cas:` content for
/// humans and the reindex job.
#[derive(Debug, Clone)]
pub struct UriPolicy {
    pub document_uri_base: String,
    pub document_url_base: String,
    pub gateway_url_base: String,
}

impl Default for UriPolicy {
    fn default() -> Self {
        Self {
            document_uri_base: "http://annal.archive/doc".to_string(),
            document_url_base: "https://www.annal.archive/doc".to_string(),
            gateway_url_base: "https://gateway.annal.archive/cas".to_string(),
        }
    }
}

impl UriPolicy {
    pub fn document_uri(&self, document_id: &str) -> Iri {
        Iri::new(format!("{}/{}", self.document_uri_base, document_id))
    }

    pub fn document_url(&self, document_id: &str) -> String {
        format!("{}/{}", self.document_url_base, document_id)
    }

    pub fn gateway_url(&self, cid: &ContentId) -> String {
        format!("{}/{}", self.gateway_url_base, cid)
    }
}

/// Assembles canonical serialized assertions.
pub struct AssertionBuilder {
    uris: UriPolicy,
    namespaces: NamespaceTable,
}

impl AssertionBuilder {
    pub fn new(uris: UriPolicy, namespaces: NamespaceTable) -> Self {
        Self { uris, namespaces }
    }

    pub fn uris(&self) -> &UriPolicy {
        &self.uris
    }

    /// Build and canonically serialize the assertion graph.
    pub fn build(&self, input: &AssertionInput) -> Result<String, IncompleteAssertionInput> {
        let statements = self.statements(input)?;
        Ok(canon::serialize(&statements))
    }

    /// Assemble the statement set without serializing (used by tests).
    pub fn statements(
        &self,
        input: &AssertionInput,
    ) -> Result<Vec<Statement>, IncompleteAssertionInput> {
        let required = |value: &str, name: &'static str| {
            if value.trim().is_empty() {
                Err(IncompleteAssertionInput(name))
            } else {
                Ok(())
            }
        };
        required(&input.document_id, "document id")?;
        required(&input.organization_id, "organization id")?;
        required(&input.file_name, "file name")?;
        required(&input.content_type, "content type")?;
        required(&input.file_url, "file url")?;

        let cid = |cid: &Option<ContentId>, name: &'static str| {
            cid.clone().ok_or(IncompleteAssertionInput(name))
        };
        let file_cid = cid(&input.file_cid, "file content id")?;
        let transcript_cid = cid(&input.transcript_cid, "transcript content id")?;
        let metadata_cid = cid(&input.metadata_cid, "metadata content id")?;

        let doc = self.uris.document_uri(&input.document_id);
        let file = Iri::new(file_cid.uri());
        let transcript = Iri::new(transcript_cid.uri());
        let metadata = Iri::new(metadata_cid.uri());
        let agent = input.agent.agent.clone();

        let mut g = Graph::default();

        // --- Document node ---
        g.push(&doc, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::SCHEMA_DIGITAL_DOCUMENT)));
        g.push(&doc, vocab::SCHEMA_MAIN_ENTITY, Term::Iri(file.clone()));
        g.push(&doc, vocab::SCHEMA_TRANSCRIPT, Term::Iri(transcript.clone()));
        g.push(&doc, vocab::SCHEMA_URL, Term::text(self.uris.document_url(&input.document_id)));
        for media in [&file, &metadata, &transcript] {
            g.push(&doc, vocab::SCHEMA_ASSOCIATED_MEDIA, Term::Iri((*media).clone()));
        }
        self.known_properties(&mut g, &doc, &input.metadata);

        // --- File node ---
        g.push(&file, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::PROV_ENTITY)));
        g.push(&file, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::SCHEMA_MEDIA_OBJECT)));
        g.push(&file, vocab::SCHEMA_ENCODES_CREATIVE_WORK, Term::Iri(doc.clone()));
        g.push(&file, vocab::SCHEMA_CONTENT_URL, Term::text(self.uris.gateway_url(&file_cid)));
        g.push(&file, vocab::SCHEMA_CONTENT_URL, Term::text(input.file_url.clone()));
        g.push(&file, vocab::SCHEMA_CONTENT_SIZE, Term::text(size_text(input.content_length)));
        g.push(&file, vocab::SCHEMA_ENCODING_FORMAT, Term::text(input.content_type.clone()));
        g.push(&file, vocab::SCHEMA_NAME, Term::text(input.file_name.clone()));
        g.push(&file, vocab::SCHEMA_MAIN_ENTITY_OF_PAGE, Term::Iri(doc.clone()));
        g.push(&file, vocab::SCHEMA_UPLOAD_DATE, date_term(input.event_time));

        // --- Transcript and Metadata nodes, with generation provenance ---
        self.media_with_provenance(
            &mut g,
            MediaProvenance {
                node: &transcript,
                doc: &doc,
                file: &file,
                cid: &transcript_cid,
                size: input.transcript_size,
                format: &input.agent.transcript_format,
                role: &input.agent.text_role,
                agent: &agent,
                generated_at: input.generated_at,
            },
        );
        self.media_with_provenance(
            &mut g,
            MediaProvenance {
                node: &metadata,
                doc: &doc,
                file: &file,
                cid: &metadata_cid,
                size: input.metadata_size,
                format: &input.agent.metadata_format,
                role: &input.agent.metadata_role,
                agent: &agent,
                generated_at: input.generated_at,
            },
        );

        // --- Foreign-properties container (omitted entirely when empty) ---
        if input.metadata.has_foreign() {
            let label = metadata.with_fragment("foreign");
            g.push(&label, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::PROV_ENTITY)));
            g.push(&label, vocab::PROV_WAS_ATTRIBUTED_TO, Term::Iri(agent.clone()));
            g.push(&label, vocab::PROV_WAS_DERIVED_FROM, Term::Iri(metadata.clone()));
            for (key, value) in &input.metadata.foreign {
                // the normalizer only admits registered prefixes, so
                // expansion cannot fail for keys that reach this point
                if let Some(predicate) = self.namespaces.expand(key) {
                    g.statements.push(
                        Statement::new(file.clone(), predicate, value.to_term())
                            .in_graph(label.clone()),
                    );
                }
            }
        }

        Ok(g.statements)
    }

    /// Known-field statements about the Document node.
    fn known_properties(&self, g: &mut Graph, doc: &Iri, metadata: &NormalizedMetadata) {
        let known = &metadata.known;
        if let Some(title) = &known.title {
            g.push(doc, vocab::SCHEMA_NAME, title.to_term());
        }
        if let Some(language) = &known.language {
            g.push(doc, vocab::SCHEMA_IN_LANGUAGE, language.to_term());
        }
        if let Some(date) = known.date {
            g.push(doc, vocab::SCHEMA_DATE_PUBLISHED, date_term(date));
        }
        if let Some(created) = known.created {
            g.push(doc, vocab::SCHEMA_DATE_CREATED, date_term(created));
        }
        if let Some(modified) = known.modified {
            g.push(doc, vocab::SCHEMA_DATE_MODIFIED, date_term(modified));
        }
    }

    /// Statements for an extracted media node: type, content location,
    /// back-link, attribution, and the qualified generation activity.
    ///
    /// The activity and association nodes get fragment URIs derived from
    /// the media node's content id — every node stays concretely named.
    fn media_with_provenance(&self, g: &mut Graph, m: MediaProvenance<'_>) {
        g.push(m.node, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::PROV_ENTITY)));
        g.push(m.node, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::SCHEMA_MEDIA_OBJECT)));
        g.push(m.node, vocab::SCHEMA_ENCODES_CREATIVE_WORK, Term::Iri(m.doc.clone()));
        g.push(m.node, vocab::SCHEMA_CONTENT_URL, Term::text(self.uris.gateway_url(m.cid)));
        g.push(m.node, vocab::SCHEMA_CONTENT_SIZE, Term::text(size_text(m.size)));
        g.push(m.node, vocab::SCHEMA_ENCODING_FORMAT, Term::text(m.format.to_string()));
        g.push(m.node, vocab::PROV_WAS_ATTRIBUTED_TO, Term::Iri(m.agent.clone()));
        g.push(m.node, vocab::PROV_GENERATED_AT_TIME, date_term(m.generated_at));

        let activity = m.node.with_fragment("activity");
        let association = m.node.with_fragment("association");

        g.push(m.node, vocab::PROV_WAS_GENERATED_BY, Term::Iri(activity.clone()));
        g.push(&activity, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::PROV_ACTIVITY)));
        g.push(&activity, vocab::PROV_GENERATED, Term::Iri(m.node.clone()));
        g.push(&activity, vocab::PROV_USED, Term::Iri(m.file.clone()));
        g.push(&activity, vocab::PROV_WAS_ASSOCIATED_WITH, Term::Iri(m.agent.clone()));
        g.push(&activity, vocab::PROV_QUALIFIED_ASSOCIATION, Term::Iri(association.clone()));
        g.push(&association, vocab::RDF_TYPE, Term::Iri(Iri::new(vocab::PROV_ASSOCIATION)));
        g.push(&association, vocab::PROV_AGENT, Term::Iri(m.agent.clone()));
        g.push(&association, vocab::PROV_HAD_ROLE, Term::Iri(m.role.clone()));
    }
}

struct MediaProvenance<'a> {
    node: &'a Iri,
    doc: &'a Iri,
    file: &'a Iri,
    cid: &'a ContentId,
    size: u64,
    format: &'a str,
    role: &'a Iri,
    agent: &'a Iri,
    generated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Graph {
    statements: Vec<Statement>,
}

impl Graph {
    fn push(&mut self, subject: &Iri, predicate: &str, object: Term) {
        self.statements
            .push(Statement::new(subject.clone(), Iri::new(predicate), object));
    }
}

fn size_text(bytes: u64) -> String {
    format!("{}B", bytes)
}

fn date_term(t: DateTime<Utc>) -> Term {
    Term::typed(
        t.to_rfc3339_opts(SecondsFormat::Millis, true),
        vocab::xsd_date_time(),
    )
}

impl AssertionBuilder {
    /// Extract known document fields back out of a parsed assertion.
    ///
    /// Used by the reindex job: given the statements of a stored
    /// assertion, recover the document URI, its title/language/publication
    /// date, and the transcript content id.
    pub fn read_back(statements: &[Statement]) -> ReadBack {
        let mut out = ReadBack::default();

        let doc = statements.iter().find_map(|s| {
            (s.predicate.as_str() == vocab::RDF_TYPE
                && s.object.as_iri().map(Iri::as_str) == Some(vocab::SCHEMA_DIGITAL_DOCUMENT))
            .then(|| s.subject.clone())
        });
        let Some(doc) = doc else {
            return out;
        };

        for s in statements.iter().filter(|s| s.subject == doc && s.graph.is_none()) {
            let lexical = s.object.as_literal().map(|l| l.lexical.clone());
            match s.predicate.as_str() {
                vocab::SCHEMA_NAME => out.title = lexical,
                vocab::SCHEMA_IN_LANGUAGE => out.language = lexical,
                vocab::SCHEMA_DATE_PUBLISHED => {
                    out.publication_date = lexical
                        .as_deref()
                        .and_then(|l| DateTime::parse_from_rfc3339(l).ok())
                        .map(|t| t.with_timezone(&Utc));
                }
                vocab::SCHEMA_TRANSCRIPT => {
                    out.transcript_cid = s
                        .object
                        .as_iri()
                        .and_then(|iri| iri.as_str().strip_prefix("cas:"))
                        .and_then(|cid| ContentId::parse(cid).ok());
                }
                _ => {}
            }
        }
        out.document_uri = Some(doc);
        out
    }
}

/// Fields recovered from a stored assertion by [`AssertionBuilder::read_back`].
#[derive(Debug, Default)]
pub struct ReadBack {
    pub document_uri: Option<Iri>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub transcript_cid: Option<ContentId>,
}
