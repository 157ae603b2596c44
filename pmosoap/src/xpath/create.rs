//! Node creation along creation paths.

use std::collections::BTreeMap;

use tracing::trace;
use xmltree::{Element, XMLNode};

use super::{Axis, NodeTest, PathExpr, Predicate, QName, Step};
use crate::errors::{Result, SoapError};
use crate::soap::builder::{declare_namespace, qualified_element};

type Bindings = BTreeMap<String, String>;

/// Bindings visible inside `element`
fn bindings_of(element: &Element, outer: &Bindings) -> Bindings {
    let mut bindings = outer.clone();
    if let Some(ns) = &element.namespaces {
        bindings.extend(ns.0.iter().map(|(p, u)| (p.clone(), u.clone())));
    }
    bindings
}

fn same_uri(element: &Element, uri: Option<&str>) -> bool {
    let actual = element.namespace.as_deref().filter(|u| !u.is_empty());
    actual == uri
}

fn matches_test(element: &Element, test: &NodeTest) -> bool {
    match test {
        NodeTest::Element(name) => element.name == name.local && same_uri(element, name.uri.as_deref()),
        NodeTest::Wildcard { uri: None, .. } => true,
        NodeTest::Wildcard { uri, .. } => same_uri(element, uri.as_deref()),
        _ => false,
    }
}

/// Attribute value matched by namespace URI, whatever prefix the element uses
fn attribute<'a>(element: &'a Element, name: &QName, outer: &Bindings) -> Option<&'a str> {
    let bindings = bindings_of(element, outer);
    element
        .attributes
        .iter()
        .find(|(key, _)| match (key.split_once(':'), name.uri.as_deref()) {
            (None, None) => key.as_str() == name.local,
            (Some((prefix, local)), Some(uri)) => {
                local == name.local && bindings.get(prefix).map(String::as_str) == Some(uri)
            }
            _ => false,
        })
        .map(|(_, value)| value.as_str())
}

fn matches_predicates(element: &Element, predicates: &[Predicate], outer: &Bindings) -> bool {
    predicates.iter().all(|predicate| match predicate {
        Predicate::AttributeEquals { name, value } => attribute(element, name, outer) == Some(value.as_str()),
        Predicate::Position(_) => true,
    })
}

/// Indices (into `parent.children`) of the children selected by an element step
fn select_children(parent: &Element, step: &Step, outer: &Bindings) -> Vec<usize> {
    let bindings = bindings_of(parent, outer);
    let mut selected: Vec<usize> = parent
        .children
        .iter()
        .enumerate()
        .filter_map(|(index, node)| node.as_element().map(|e| (index, e)))
        .filter(|(_, element)| matches_test(element, &step.test))
        .map(|(index, _)| index)
        .collect();

    for predicate in &step.predicates {
        selected = match predicate {
            Predicate::Position(position) => selected.get(position - 1).copied().into_iter().collect(),
            _ => selected
                .into_iter()
                .filter(|index| {
                    parent.children[*index].as_element().is_some_and(|e| {
                        matches_predicates(e, std::slice::from_ref(predicate), &bindings)
                    })
                })
                .collect(),
        };
    }
    selected
}

/// Path (child indices) to the first element matched by a `//` step, document order
fn first_descendant_match(parent: &Element, step: &Step, outer: &Bindings) -> Option<Vec<usize>> {
    let matches = select_children(parent, step, outer);
    let bindings = bindings_of(parent, outer);
    for (index, node) in parent.children.iter().enumerate() {
        let Some(child) = node.as_element() else {
            continue;
        };
        if matches.contains(&index) {
            return Some(vec![index]);
        }
        if let Some(mut path) = first_descendant_match(child, step, &bindings) {
            path.insert(0, index);
            return Some(path);
        }
    }
    None
}

fn declare_if_needed(element: &mut Element, prefix: Option<&str>, uri: Option<&str>, scope: &Bindings) {
    if let (Some(prefix), Some(uri)) = (prefix, uri) {
        if scope.get(prefix).map(String::as_str) != Some(uri) {
            declare_namespace(element, prefix, uri);
        }
    }
}

/// Index of the child addressed by `step`, appending it when missing
fn locate_or_create(parent: &mut Element, step: &Step, path: &PathExpr, outer: &Bindings) -> Result<usize> {
    if let Some(index) = select_children(parent, step, outer).first() {
        return Ok(*index);
    }

    let NodeTest::Element(name) = &step.test else {
        return Err(SoapError::malformed_path(
            path.source(),
            "cannot create a node for a wildcard step",
        ));
    };

    let (required, position) = match step.predicates.split_last() {
        Some((Predicate::Position(position), rest)) => (rest, *position),
        _ => (step.predicates.as_slice(), 1),
    };
    if required.iter().any(|p| matches!(p, Predicate::Position(_))) {
        return Err(SoapError::malformed_path(
            path.source(),
            "only a trailing position predicate can be created",
        ));
    }

    let bindings = bindings_of(parent, outer);
    let existing = parent
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|e| matches_test(e, &step.test) && matches_predicates(e, required, &bindings))
        .count();
    if position != existing + 1 {
        return Err(SoapError::malformed_path(
            path.source(),
            &format!(
                "position {} cannot be created: {} matching element(s) exist",
                position, existing
            ),
        ));
    }

    let mut element = qualified_element(name.prefix.as_deref(), name.uri.as_deref(), &name.local);
    declare_if_needed(&mut element, name.prefix.as_deref(), name.uri.as_deref(), &bindings);
    for predicate in required {
        if let Predicate::AttributeEquals { name, value } = predicate {
            let in_scope = bindings_of(&element, &bindings);
            declare_if_needed(&mut element, name.prefix.as_deref(), name.uri.as_deref(), &in_scope);
            element.attributes.insert(name.attribute_key(), value.clone());
        }
    }
    parent.children.push(XMLNode::Element(element));

    trace!(path = path.source(), element = %name.local, "Created element");
    Ok(parent.children.len() - 1)
}

fn set_text(element: &mut Element, value: &str) {
    element.children.clear();
    if !value.is_empty() {
        element.children.push(XMLNode::Text(value.to_string()));
    }
}

/// Sets the text value of the node addressed by `expr`, creating it if needed
///
/// `scope` holds the namespace bindings visible at `section`; elements
/// created with a prefix outside the bindings in effect declare it
/// themselves.
pub fn write(section: &mut Element, expr: &PathExpr, value: &str, scope: &Bindings) -> Result<()> {
    let mut current = section;
    let mut outer = scope.clone();

    for step in expr.steps() {
        match &step.test {
            NodeTest::SelfNode => continue,
            NodeTest::Text => break,
            NodeTest::Attribute(name) => {
                let in_scope = bindings_of(current, &outer);
                let existing = current
                    .attributes
                    .keys()
                    .find(|key| match key.split_once(':') {
                        Some((prefix, local)) => {
                            local == name.local
                                && name.uri.is_some()
                                && in_scope.get(prefix) == name.uri.as_ref()
                        }
                        None => name.uri.is_none() && key.as_str() == name.local,
                    })
                    .cloned();
                let key = match existing {
                    Some(key) => key,
                    None => {
                        declare_if_needed(current, name.prefix.as_deref(), name.uri.as_deref(), &in_scope);
                        name.attribute_key()
                    }
                };
                current.attributes.insert(key, value.to_string());
                return Ok(());
            }
            NodeTest::Element(_) | NodeTest::Wildcard { .. } => {}
        }

        let indices = match step.axis {
            Axis::Child => vec![locate_or_create(current, step, expr, &outer)?],
            Axis::DescendantOrSelf => first_descendant_match(current, step, &outer).ok_or_else(|| {
                SoapError::malformed_path(expr.source(), "no existing node matches the '//' step")
            })?,
        };

        for index in indices {
            outer = bindings_of(current, &outer);
            current = current
                .children
                .get_mut(index)
                .and_then(XMLNode::as_mut_element)
                .ok_or_else(|| SoapError::malformed_path(expr.source(), "addressed node is not an element"))?;
        }
    }

    set_text(current, value);
    Ok(())
}
