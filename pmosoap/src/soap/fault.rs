//! SOAP Faults

use xmltree::{Element, XMLNode};

use super::SoapVersion;

/// Erreur SOAP (Fault) extraite d'une réponse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapFault {
    /// Code d'erreur (ex: "SOAP-ENV:Client", "env:Sender")
    pub fault_code: String,

    /// Description de l'erreur
    pub fault_string: String,

    /// Texte du détail, s'il existe
    pub detail: Option<String>,
}

fn child<'a>(parent: &'a Element, local: &str) -> Option<&'a Element> {
    parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|e| e.name == local)
}

/// Texte de tous les descendants, dans l'ordre du document
fn descendant_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            XMLNode::Text(text) | XMLNode::CData(text) => out.push_str(text),
            XMLNode::Element(child) => descendant_text(child, out),
            _ => {}
        }
    }
}

fn detail_of(element: &Element) -> String {
    let mut out = String::new();
    descendant_text(element, &mut out);
    out.trim().to_string()
}

fn text_of(element: Option<&Element>) -> String {
    element
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

impl SoapFault {
    /// Lit un élément `Fault` selon la version de l'enveloppe
    ///
    /// SOAP 1.1 : `faultcode`, `faultstring`, `detail`.
    /// SOAP 1.2 : `Code/Value`, `Reason/Text`, `Detail`.
    pub fn from_element(version: SoapVersion, fault: &Element) -> Self {
        match version {
            SoapVersion::Soap11 => Self {
                fault_code: text_of(child(fault, "faultcode")),
                fault_string: text_of(child(fault, "faultstring")),
                detail: child(fault, "detail").map(detail_of),
            },
            SoapVersion::Soap12 => Self {
                fault_code: text_of(child(fault, "Code").and_then(|c| child(c, "Value"))),
                fault_string: text_of(child(fault, "Reason").and_then(|r| child(r, "Text"))),
                detail: child(fault, "Detail").map(detail_of),
            },
        }
    }
}
