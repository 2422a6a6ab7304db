//! Vocabulary constants used in assertion graphs.
//!
//! Document URIs deliberately use plain `http` and no `www` subdomain:
//! they are identifiers in a namespace, not URLs. The resolvable URL is
//! asserted as a `schema:url` property of the URI in every assertion.

use super::term::Iri;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

// schema.org
pub const SCHEMA_DIGITAL_DOCUMENT: &str = "http://schema.org/DigitalDocument";
pub const SCHEMA_MEDIA_OBJECT: &str = "http://schema.org/MediaObject";
pub const SCHEMA_NAME: &str = "http://schema.org/name";
pub const SCHEMA_URL: &str = "http://schema.org/url";
pub const SCHEMA_IN_LANGUAGE: &str = "http://schema.org/inLanguage";
pub const SCHEMA_DATE_PUBLISHED: &str = "http://schema.org/datePublished";
pub const SCHEMA_DATE_CREATED: &str = "http://schema.org/dateCreated";
pub const SCHEMA_DATE_MODIFIED: &str = "http://schema.org/dateModified";
pub const SCHEMA_MAIN_ENTITY: &str = "http://schema.org/mainEntity";
pub const SCHEMA_MAIN_ENTITY_OF_PAGE: &str = "http://schema.org/mainEntityOfPage";
pub const SCHEMA_TRANSCRIPT: &str = "http://schema.org/transcript";
pub const SCHEMA_ASSOCIATED_MEDIA: &str = "http://schema.org/associatedMedia";
pub const SCHEMA_ENCODES_CREATIVE_WORK: &str = "http://schema.org/encodesCreativeWork";
pub const SCHEMA_CONTENT_URL: &str = "http://schema.org/contentUrl";
pub const SCHEMA_CONTENT_SIZE: &str = "http://schema.org/contentSize";
pub const SCHEMA_ENCODING_FORMAT: &str = "http://schema.org/encodingFormat";
pub const SCHEMA_UPLOAD_DATE: &str = "http://schema.org/uploadDate";

// W3C PROV
pub const PROV_ENTITY: &str = "http://www.w3.org/ns/prov#Entity";
pub const PROV_ACTIVITY: &str = "http://www.w3.org/ns/prov#Activity";
pub const PROV_ASSOCIATION: &str = "http://www.w3.org/ns/prov#Association";
pub const PROV_WAS_ATTRIBUTED_TO: &str = "http://www.w3.org/ns/prov#wasAttributedTo";
pub const PROV_WAS_DERIVED_FROM: &str = "http://www.w3.org/ns/prov#wasDerivedFrom";
pub const PROV_GENERATED_AT_TIME: &str = "http://www.w3.org/ns/prov#generatedAtTime";
pub const PROV_WAS_GENERATED_BY: &str = "http://www.w3.org/ns/prov#wasGeneratedBy";
pub const PROV_GENERATED: &str = "http://www.w3.org/ns/prov#generated";
pub const PROV_USED: &str = "http://www.w3.org/ns/prov#used";
pub const PROV_WAS_ASSOCIATED_WITH: &str = "http://www.w3.org/ns/prov#wasAssociatedWith";
pub const PROV_QUALIFIED_ASSOCIATION: &str = "http://www.w3.org/ns/prov#qualifiedAssociation";
pub const PROV_AGENT: &str = "http://www.w3.org/ns/prov#agent";
pub const PROV_HAD_ROLE: &str = "http://www.w3.org/ns/prov#hadRole";

// XSD datatypes
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

pub fn xsd_date_time() -> Iri {
    Iri::new(XSD_DATE_TIME)
}
