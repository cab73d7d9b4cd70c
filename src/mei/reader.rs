//! MEI → Document
//!
//! Uses roxmltree. Only atomic sections (sections with no nested sections)
//! contribute voices: every `layer` in one becomes a voice tagged with its
//! staff number. Within a layer, notes, rests, dots, mensuration and
//! proportion signs and bar lines are read in document order, including
//! those nested in ligatures.

use std::collections::HashMap;
use std::str::FromStr;

use roxmltree::{Document as XmlDocument, Node, NodeId, ParsingOptions};

use super::MeiError;
use crate::models::minims::parse_beats;
use crate::models::{
    BarLine, BarLineForm, Division, Document, Dot, DotForm, Element, GivenDuration, Level,
    Mensuration, NotatedQuality, Note, Proportion, Rest, Section, Voice, VoiceBuilder,
};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse an MEI document
pub fn read_document(source: &str) -> Result<Document, MeiError> {
    let options = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let xml = XmlDocument::parse_with_options(source, options)?;
    let ordinals: HashMap<NodeId, usize> = xml
        .descendants()
        .filter(|n| n.is_element())
        .enumerate()
        .map(|(i, n)| (n.id(), i))
        .collect();

    let mut document = Document::new();
    read_staff_defs(&xml, &mut document)?;

    let top: Vec<Node> = xml
        .descendants()
        .filter(|n| is(n, "section") && enclosing_section(*n).is_none())
        .collect();
    if top.is_empty() {
        return Err(MeiError::MissingElement("section".to_string()));
    }
    for node in top {
        let section = read_section(node, &ordinals, &mut document)?;
        document.sections.push(section);
    }

    log::debug!(
        "Read {} voices ({} events) from MEI",
        document.voices().len(),
        document.event_count()
    );
    Ok(document)
}

fn is(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn xml_id(node: Node) -> Option<String> {
    node.attribute((XML_NS, "id")).map(str::to_string)
}

fn enclosing_section<'a, 'input>(node: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    node.ancestors().skip(1).find(|a| is(a, "section"))
}

fn read_section(
    node: Node,
    ordinals: &HashMap<NodeId, usize>,
    document: &mut Document,
) -> Result<Section, MeiError> {
    let mut section = Section::new(xml_id(node));
    let nested: Vec<Node> = node
        .descendants()
        .filter(|d| is(d, "section") && enclosing_section(*d) == Some(node))
        .collect();

    if nested.is_empty() {
        for layer in node.descendants().filter(|d| is(d, "layer")) {
            section.voices.push(read_layer(layer, ordinals, document)?);
        }
    } else {
        for child in nested {
            section.sections.push(read_section(child, ordinals, document)?);
        }
    }
    Ok(section)
}

fn read_layer(
    layer: Node,
    ordinals: &HashMap<NodeId, usize>,
    document: &mut Document,
) -> Result<Voice, MeiError> {
    let part = match layer.ancestors().find(|a| is(a, "staff")) {
        Some(staff) => parse_attr::<u32>(staff, "n")?.unwrap_or(1),
        None => 1,
    };
    let layer_n = parse_attr::<u32>(layer, "n")?.unwrap_or(1);

    let mut builder = VoiceBuilder::new(part).layer(layer_n);
    for node in layer.descendants().filter(|d| d.is_element()) {
        let element = match node.tag_name().name() {
            "note" => Element::Note(read_note(node)?),
            "rest" => Element::Rest(read_rest(node)?),
            "dot" => Element::Dot(Dot {
                form: if node.attribute("form") == Some("aug") { DotForm::Aug } else { DotForm::Div },
            }),
            "mensur" => Element::Mensuration(read_mensur(node)?),
            "proport" => Element::Proportion(Proportion {
                num: parse_attr(node, "num")?,
                numbase: parse_attr(node, "numbase")?,
            }),
            "barLine" => Element::BarLine(BarLine {
                form: if node.attribute("form") == Some("dotted") {
                    BarLineForm::Dotted
                } else {
                    BarLineForm::Single
                },
            }),
            _ => continue,
        };
        let source_index = ordinals.get(&node.id()).copied().unwrap_or_default();
        builder.push_source(element, xml_id(node), source_index);
    }
    Ok(builder.build(document))
}

fn read_note(node: Node) -> Result<Note, MeiError> {
    Ok(Note {
        level: required_level(node)?,
        colored: node.attribute("colored") == Some("true"),
        quality: node.attribute("quality").and_then(NotatedQuality::parse),
        given_duration: read_given(node)?,
    })
}

fn read_rest(node: Node) -> Result<Rest, MeiError> {
    let level = required_level(node)?;
    let perfect_longa = level == Level::Longa
        && (node.attribute("dur") == Some("3B") || node.attribute("quality") == Some("p"));
    Ok(Rest {
        level,
        loc: parse_attr(node, "loc")?,
        perfect_longa,
        maxima_is_perfect: node.attribute("maximaIsPerfect") == Some("true"),
        longa_is_perfect: node.attribute("longaIsPerfect") == Some("true"),
        given_duration: read_given(node)?,
    })
}

/// `dur.intermediate` from an earlier run, with the attributes written
/// beside it
fn read_given(node: Node) -> Result<Option<GivenDuration>, MeiError> {
    let Some(minims) = node.attribute("dur.intermediate").and_then(parse_beats) else {
        return Ok(None);
    };
    Ok(Some(GivenDuration {
        minims,
        rule: node.attribute("rule").map(str::to_string),
        quality: node.attribute("dur.quality").map(str::to_string),
        num: parse_attr(node, "num")?,
        numbase: parse_attr(node, "numbase")?,
        default_minims: node.attribute("defaultminims").and_then(parse_beats),
        comment: node.attribute("comment").map(str::to_string),
    }))
}

fn required_level(node: Node) -> Result<Level, MeiError> {
    let dur = node.attribute("dur").unwrap_or_default();
    Level::parse(dur).ok_or_else(|| invalid(node, "dur", dur))
}

const MENSUR_ATTRIBUTES: [&str; 4] = ["prolatio", "tempus", "modusminor", "modusmaior"];

fn read_mensur(node: Node) -> Result<Mensuration, MeiError> {
    let mut mens = Mensuration::unset();
    for (index, name) in MENSUR_ATTRIBUTES.iter().enumerate() {
        if let Some(digit) = parse_attr::<u32>(node, name)? {
            let division = Division::from_digit(digit).ok_or_else(|| invalid(node, name, &digit.to_string()))?;
            mens.set_flag(index, division);
        }
    }
    Ok(mens)
}

/// Initial mensuration per staff, from a `mensur` child of `staffDef` or
/// from the staff definition's own attributes
fn read_staff_defs(xml: &XmlDocument, document: &mut Document) -> Result<(), MeiError> {
    for def in xml.descendants().filter(|n| is(n, "staffDef")) {
        let Some(n) = parse_attr::<u32>(def, "n")? else {
            continue;
        };
        let mens = match def.children().find(|c| is(c, "mensur")) {
            Some(mensur) => read_mensur(mensur)?,
            None => read_mensur(def)?,
        };
        if mens != Mensuration::unset() {
            document.staff_mensurations.insert(n, mens);
        }
    }
    Ok(())
}

fn parse_attr<T: FromStr>(node: Node, name: &str) -> Result<Option<T>, MeiError> {
    match node.attribute(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(node, name, value)),
    }
}

fn invalid(node: Node, attribute: &str, value: &str) -> MeiError {
    MeiError::InvalidValue {
        element: node.tag_name().name().to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}
