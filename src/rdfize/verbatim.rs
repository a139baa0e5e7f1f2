//! RDFizers that parse a concrete RDF syntax verbatim.

use std::io::{BufReader, Read};

use oxiri::Iri;
use rio_api::model as rio;
use rio_api::parser::{QuadsParser, TriplesParser};
use rio_turtle::{NQuadsParser, NTriplesParser, TriGParser, TurtleParser};
use rio_xml::RdfXmlParser;

use crate::cache::entry::Status;
use crate::config::DatatypeHandling;
use crate::model::{BlankNode, GraphName, Literal, NamedNode, Statement, Subject, Term};
use crate::pipeline::StatementHandler;
use crate::rdfize::{RdfFormat, Rdfizer};
use crate::{vocab, CacheError};

/// Parses one concrete RDF syntax and forwards its statements unchanged.
///
/// Context information in the source document is discarded downstream; the
/// pipeline pins every statement to the target graph. Datatyped literals
/// pass through the configured datatype handling.
pub struct VerbatimRdfizer {
    format: RdfFormat,
    datatype_handling: DatatypeHandling,
    name: String,
}

impl VerbatimRdfizer {
    pub fn new(format: RdfFormat, datatype_handling: DatatypeHandling) -> Self {
        VerbatimRdfizer {
            format,
            datatype_handling,
            name: format!("verbatim:{format}"),
        }
    }

    pub fn format(&self) -> RdfFormat {
        self.format
    }
}

impl Rdfizer for VerbatimRdfizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn rdfize(
        &self,
        input: &mut dyn Read,
        handler: &mut dyn StatementHandler,
        base_iri: &str,
    ) -> Status {
        let reader = BufReader::new(input);
        let base = Iri::parse(base_iri.to_owned()).ok();
        let converter = TermConverter {
            datatype_handling: self.datatype_handling,
        };

        if let Err(e) = handler.start() {
            tracing::info!("{}: statement handler failed to start: {e}", self.name);
            return Status::Failure;
        }
        let result = match self.format {
            RdfFormat::Turtle => {
                drive_triples(TurtleParser::new(reader, base), handler, &converter)
            }
            RdfFormat::NTriples => {
                drive_triples(NTriplesParser::new(reader), handler, &converter)
            }
            RdfFormat::RdfXml => {
                drive_triples(RdfXmlParser::new(reader, base), handler, &converter)
            }
            RdfFormat::TriG => drive_quads(TriGParser::new(reader, base), handler, &converter),
            RdfFormat::NQuads => drive_quads(NQuadsParser::new(reader), handler, &converter),
        };

        match result.and_then(|()| handler.end().map_err(DriveError::Handler)) {
            Ok(()) => Status::Success,
            Err(DriveError::Parse(message)) => {
                tracing::info!("{}: parse error: {message}", self.name);
                Status::ParseError
            }
            Err(DriveError::Handler(e)) => {
                tracing::info!("{}: statement handler failed: {e}", self.name);
                Status::Failure
            }
        }
    }
}

enum DriveError {
    Parse(String),
    Handler(CacheError),
}

impl From<rio_turtle::TurtleError> for DriveError {
    fn from(e: rio_turtle::TurtleError) -> Self {
        DriveError::Parse(e.to_string())
    }
}

impl From<rio_xml::RdfXmlError> for DriveError {
    fn from(e: rio_xml::RdfXmlError) -> Self {
        DriveError::Parse(e.to_string())
    }
}

fn drive_triples<P: TriplesParser>(
    mut parser: P,
    handler: &mut dyn StatementHandler,
    converter: &TermConverter,
) -> Result<(), DriveError>
where
    DriveError: From<P::Error>,
{
    parser.parse_all(&mut |t| {
        let statement = converter.triple(&t)?;
        handler.statement(statement).map_err(DriveError::Handler)
    })
}

fn drive_quads<P: QuadsParser>(
    mut parser: P,
    handler: &mut dyn StatementHandler,
    converter: &TermConverter,
) -> Result<(), DriveError>
where
    DriveError: From<P::Error>,
{
    parser.parse_all(&mut |q| {
        let statement = converter.quad(&q)?;
        handler.statement(statement).map_err(DriveError::Handler)
    })
}

struct TermConverter {
    datatype_handling: DatatypeHandling,
}

impl TermConverter {
    fn triple(&self, t: &rio::Triple<'_>) -> Result<Statement, DriveError> {
        self.statement(t.subject, t.predicate, t.object)
    }

    fn quad(&self, q: &rio::Quad<'_>) -> Result<Statement, DriveError> {
        self.statement(q.subject, q.predicate, q.object)
    }

    fn statement(
        &self,
        subject: rio::Subject<'_>,
        predicate: rio::NamedNode<'_>,
        object: rio::Term<'_>,
    ) -> Result<Statement, DriveError> {
        Ok(Statement::new(
            self.subject(subject)?,
            NamedNode::new_unchecked(predicate.iri),
            self.term(object)?,
            GraphName::DefaultGraph,
        ))
    }

    fn subject(&self, subject: rio::Subject<'_>) -> Result<Subject, DriveError> {
        match subject {
            rio::Subject::NamedNode(n) => Ok(Subject::NamedNode(NamedNode::new_unchecked(n.iri))),
            rio::Subject::BlankNode(b) => Ok(Subject::BlankNode(BlankNode::new(b.id))),
            rio::Subject::Triple(_) => {
                Err(DriveError::Parse("RDF-star subjects are not supported".into()))
            }
        }
    }

    fn term(&self, term: rio::Term<'_>) -> Result<Term, DriveError> {
        match term {
            rio::Term::NamedNode(n) => Ok(Term::NamedNode(NamedNode::new_unchecked(n.iri))),
            rio::Term::BlankNode(b) => Ok(Term::BlankNode(BlankNode::new(b.id))),
            rio::Term::Literal(l) => Ok(Term::Literal(self.literal(l)?)),
            rio::Term::Triple(_) => {
                Err(DriveError::Parse("RDF-star objects are not supported".into()))
            }
        }
    }

    fn literal(&self, literal: rio::Literal<'_>) -> Result<Literal, DriveError> {
        match literal {
            rio::Literal::Simple { value } => Ok(Literal::new(value)),
            rio::Literal::LanguageTaggedString { value, language } => {
                Ok(Literal::new_language_tagged(value, language))
            }
            rio::Literal::Typed { value, datatype } => {
                let datatype = NamedNode::new_unchecked(datatype.iri);
                let value = self.checked_lexical(value, &datatype)?;
                Ok(Literal::new_typed(value, datatype))
            }
        }
    }

    fn checked_lexical(&self, value: &str, datatype: &NamedNode) -> Result<String, DriveError> {
        match self.datatype_handling {
            DatatypeHandling::Ignore => Ok(value.to_owned()),
            DatatypeHandling::Verify => {
                if is_valid_lexical(value, datatype) {
                    Ok(value.to_owned())
                } else {
                    Err(DriveError::Parse(format!(
                        "invalid lexical form \"{value}\" for {datatype}"
                    )))
                }
            }
            DatatypeHandling::Normalize => {
                normalize_lexical(value, datatype).ok_or_else(|| {
                    DriveError::Parse(format!("invalid lexical form \"{value}\" for {datatype}"))
                })
            }
        }
    }
}

/// Lexical validation for the core XSD datatypes; anything else passes.
fn is_valid_lexical(value: &str, datatype: &NamedNode) -> bool {
    if *datatype == *vocab::xsd::BOOLEAN {
        matches!(value, "true" | "false" | "1" | "0")
    } else if *datatype == *vocab::xsd::INTEGER {
        is_integer(value)
    } else if *datatype == *vocab::xsd::DECIMAL {
        is_decimal(value)
    } else if *datatype == *vocab::xsd::DOUBLE {
        matches!(value, "INF" | "-INF" | "NaN") || value.parse::<f64>().is_ok()
    } else {
        true
    }
}

/// Canonical forms for booleans and integers; other valid values pass
/// through unchanged.
fn normalize_lexical(value: &str, datatype: &NamedNode) -> Option<String> {
    if !is_valid_lexical(value, datatype) {
        return None;
    }
    if *datatype == *vocab::xsd::BOOLEAN {
        Some(if matches!(value, "true" | "1") { "true" } else { "false" }.to_owned())
    } else if *datatype == *vocab::xsd::INTEGER {
        let negative = value.starts_with('-');
        let digits = value
            .strip_prefix(['+', '-'])
            .unwrap_or(value)
            .trim_start_matches('0');
        let digits = if digits.is_empty() { "0" } else { digits };
        Some(if negative && digits != "0" {
            format!("-{digits}")
        } else {
            digits.to_owned()
        })
    } else {
        Some(value.to_owned())
    }
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(value: &str) -> bool {
    let rest = value.strip_prefix(['+', '-']).unwrap_or(value);
    let mut digits = 0usize;
    let mut dots = 0usize;
    for b in rest.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
