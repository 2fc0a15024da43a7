//! Patent document XML extraction.
//!
//! Pulls bibliographic fields and full-text sections out of the document
//! XML carried inside each publication archive. Paragraph text keeps the
//! content of nested inline markup in document order, including text that
//! follows a nested element, and drops the whitespace between paragraphs.

use std::collections::BTreeMap;
use std::mem;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use crate::classes::{ClassPair, parse_classification};
use crate::errors::HarvestError;
use crate::types::{DocumentId, Year};

/// Everything harvested from one document XML.
///
/// Field order matches the sorted key order of the serialized form, so
/// `patent_info.json` files always list their keys alphabetically.
#[derive(Clone, Debug, Serialize)]
pub struct PatentInfo {
    /// Abstract text per language code.
    #[serde(rename = "abstract")]
    pub abstracts: BTreeMap<String, String>,
    /// Applicant names in document order.
    pub applicants: Vec<String>,
    /// Claims text per language code.
    pub claims: BTreeMap<String, String>,
    /// Description text per language code.
    pub description: BTreeMap<String, String>,
    /// `{country}{number}.{kind}` built from the root element attributes.
    pub document_number: DocumentId,
    /// IPC assignments in document order.
    pub ipc_classes: Vec<ClassPair>,
    /// Publication language from the single B260 element.
    pub language: String,
    /// Publication date as `YYYYMMDD`.
    pub publication_date: String,
}

impl PatentInfo {
    /// Year taken from the leading four digits of the publication date.
    pub fn publication_year(&self) -> Result<Year, HarvestError> {
        self.publication_date
            .get(0..4)
            .and_then(|year| year.parse().ok())
            .ok_or_else(|| HarvestError::MalformedDocument {
                document: self.document_number.clone(),
                details: format!(
                    "publication date '{}' has no leading year",
                    self.publication_date
                ),
            })
    }
}

/// Bibliographic leaf elements whose text is collected verbatim.
enum LeafKind {
    Classification,
    Applicant,
    Language,
}

fn leaf_kind(stack: &[String], name: &str) -> Option<LeafKind> {
    let under_sdobi = stack.iter().any(|n| n == "SDOBI");
    match name {
        "text" if under_sdobi && matches!(stack, [.., parent] if parent == "classification-ipcr") => {
            Some(LeafKind::Classification)
        }
        "snm" if under_sdobi && matches!(stack, [.., parent] if parent == "B711") => {
            Some(LeafKind::Applicant)
        }
        "B260" if matches!(stack, [.., a, b] if a == "SDOBI" && b == "B200") => {
            Some(LeafKind::Language)
        }
        _ => None,
    }
}

fn malformed(document: &DocumentId, details: String) -> HarvestError {
    HarvestError::MalformedDocument {
        document: document.clone(),
        details,
    }
}

fn attr_value(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key.as_bytes())
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn require_attr(
    e: &BytesStart<'_>,
    key: &str,
    document: &DocumentId,
) -> Result<String, HarvestError> {
    attr_value(e, key).ok_or_else(|| {
        malformed(
            document,
            format!(
                "element '{}' lacks a {key} attribute",
                String::from_utf8_lossy(e.name().as_ref())
            ),
        )
    })
}

fn root_identity(
    e: &BytesStart<'_>,
    document: &DocumentId,
) -> Result<(String, DocumentId), HarvestError> {
    let date_publ = require_attr(e, "date-publ", document)?;
    let country = require_attr(e, "country", document)?;
    let number = require_attr(e, "doc-number", document)?;
    let kind = require_attr(e, "kind", document)?;
    Ok((date_publ, format!("{country}{number}.{kind}")))
}

fn paragraph_prefix(e: &BytesStart<'_>) -> String {
    match attr_value(e, "num") {
        Some(num) => format!("[{num}] "),
        None => String::new(),
    }
}

/// Walks one document XML and assembles its [`PatentInfo`].
///
/// `label` names the document in errors raised before the root identity is
/// known. Sections (`abstract`, `claims`, `description`) must sit directly
/// under the root and carry a `lang` attribute; exactly one B260 element
/// must name the publication language.
pub fn parse_document_xml(label: &DocumentId, xml: &str) -> Result<PatentInfo, HarvestError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut publication_date: Option<String> = None;
    let mut document_number: Option<DocumentId> = None;
    let mut ipc_texts: Vec<String> = Vec::new();
    let mut applicants: Vec<String> = Vec::new();
    let mut languages: Vec<String> = Vec::new();
    let mut abstracts = BTreeMap::new();
    let mut claims = BTreeMap::new();
    let mut description = BTreeMap::new();

    // (section name, lang) while inside a top-level text section.
    let mut section: Option<(String, String)> = None;
    let mut paragraphs: Vec<String> = Vec::new();
    // Open while inside a direct child of the section; every text event at
    // that depth or deeper belongs to the paragraph.
    let mut paragraph: Option<String> = None;
    let mut leaf: Option<(LeafKind, usize, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if stack.is_empty() {
                    let (date, number) = root_identity(&e, label)?;
                    publication_date = Some(date);
                    document_number = Some(number);
                } else if stack.len() == 1
                    && matches!(name.as_str(), "abstract" | "claims" | "description")
                {
                    let lang = require_attr(&e, "lang", label)?;
                    section = Some((name.clone(), lang));
                } else if section.is_some() && stack.len() == 2 {
                    paragraph = Some(paragraph_prefix(&e));
                } else if let Some(kind) = leaf_kind(&stack, &name) {
                    leaf = Some((kind, stack.len() + 1, String::new()));
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if stack.is_empty() {
                    let (date, number) = root_identity(&e, label)?;
                    publication_date = Some(date);
                    document_number = Some(number);
                } else if stack.len() == 1
                    && matches!(name.as_str(), "abstract" | "claims" | "description")
                {
                    let lang = require_attr(&e, "lang", label)?;
                    let target = match name.as_str() {
                        "abstract" => &mut abstracts,
                        "claims" => &mut claims,
                        _ => &mut description,
                    };
                    target.insert(lang, String::new());
                } else if section.is_some() && stack.len() == 2 {
                    paragraphs.push(paragraph_prefix(&e));
                } else if let Some(kind) = leaf_kind(&stack, &name) {
                    match kind {
                        LeafKind::Classification => ipc_texts.push(String::new()),
                        LeafKind::Applicant => applicants.push(String::new()),
                        LeafKind::Language => languages.push(String::new()),
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| malformed(label, format!("bad character data: {err}")))?;
                if let Some((_, _, acc)) = leaf.as_mut() {
                    acc.push_str(&text);
                } else if let Some(par) = paragraph.as_mut() {
                    par.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                if let Some((_, _, acc)) = leaf.as_mut() {
                    acc.push_str(&text);
                } else if let Some(par) = paragraph.as_mut() {
                    par.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                let depth = stack.len();
                if let Some((kind, _, text)) = leaf.take_if(|(_, d, _)| *d == depth) {
                    match kind {
                        LeafKind::Classification => ipc_texts.push(text),
                        LeafKind::Applicant => applicants.push(text),
                        LeafKind::Language => languages.push(text),
                    }
                } else if section.is_some()
                    && depth == 3
                    && let Some(text) = paragraph.take()
                {
                    paragraphs.push(text);
                } else if depth == 2 && let Some((kind, lang)) = section.take() {
                    let joined = mem::take(&mut paragraphs).join("\n");
                    let target = match kind.as_str() {
                        "abstract" => &mut abstracts,
                        "claims" => &mut claims,
                        _ => &mut description,
                    };
                    target.insert(lang, joined);
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(malformed(
                    label,
                    format!("xml error at byte {}: {err}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
    }

    let (Some(publication_date), Some(document_number)) = (publication_date, document_number)
    else {
        return Err(malformed(label, "document has no root element".to_string()));
    };
    let mut ipc_classes = Vec::with_capacity(ipc_texts.len());
    for text in &ipc_texts {
        ipc_classes.push(parse_classification(&document_number, text)?);
    }
    let language = match languages.len() {
        1 => languages.remove(0),
        n => {
            return Err(malformed(
                &document_number,
                format!("expected exactly one B260 language element, found {n}"),
            ));
        }
    };

    Ok(PatentInfo {
        abstracts,
        applicants,
        claims,
        description,
        document_number,
        ipc_classes,
        language,
        publication_date,
    })
}
