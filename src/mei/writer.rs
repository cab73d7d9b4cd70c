//! Annotated MEI output
//!
//! Streams the source through quick-xml, rewriting the start tag of every
//! interpreted element with its ledger attributes and inserting
//! `<barLine>` elements where post-processing placed them. Everything else
//! passes through untouched. Attributes from an earlier run are replaced,
//! not duplicated.

use std::collections::HashMap;
use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::MeiError;
use crate::config::InterpreterConfig;
use crate::interpreter::{EventRecord, Interpretation};
use crate::models::minims::format_beats;
use crate::models::{BarLineForm, Document, ElementId};

/// Attributes owned by the interpreter
const ANNOTATION_ATTRIBUTES: [&str; 13] = [
    "dur.intermediate",
    "dur.ges",
    "num",
    "numbase",
    "dur.quality",
    "rule",
    "defaultminims",
    "startsAt",
    "mensurBlockStartsAt",
    "beatPos",
    "onTheBreveBeat",
    "crossedABreveBeat",
    "comment",
];

/// Re-emit `source` with the interpretation of `document` attached
pub fn annotate(
    source: &str,
    document: &Document,
    interpretation: &Interpretation,
    config: &InterpreterConfig,
) -> Result<String, MeiError> {
    let mut by_ordinal: HashMap<usize, ElementId> = HashMap::new();
    for voice in document.voices() {
        for item in &voice.items {
            if let Some(index) = item.source_index {
                by_ordinal.insert(index, item.id);
            }
        }
    }
    let mut bars_before: HashMap<ElementId, BarLineForm> = HashMap::new();
    for placement in &interpretation.bar_lines {
        bars_before.insert(placement.before, placement.form);
    }

    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut ordinal = 0;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                let element = by_ordinal.get(&ordinal).copied();
                ordinal += 1;
                write_bar_line(&mut writer, element.and_then(|id| bars_before.get(&id)))?;
                let tag = annotated_start(&e, element, interpretation, config)?;
                writer.write_event(Event::Start(tag))?;
            }
            Event::Empty(e) => {
                let element = by_ordinal.get(&ordinal).copied();
                ordinal += 1;
                write_bar_line(&mut writer, element.and_then(|id| bars_before.get(&id)))?;
                let tag = annotated_start(&e, element, interpretation, config)?;
                writer.write_event(Event::Empty(tag))?;
            }
            other => writer.write_event(other)?,
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_bar_line(writer: &mut Writer<Cursor<Vec<u8>>>, form: Option<&BarLineForm>) -> Result<(), MeiError> {
    if let Some(form) = form {
        let mut bar = BytesStart::new("barLine");
        bar.push_attribute(("form", bar_line_form(*form)));
        writer.write_event(Event::Empty(bar))?;
    }
    Ok(())
}

fn bar_line_form(form: BarLineForm) -> &'static str {
    match form {
        BarLineForm::Dotted => "dotted",
        BarLineForm::Single => "single",
    }
}

fn annotated_start(
    original: &BytesStart,
    element: Option<ElementId>,
    interpretation: &Interpretation,
    config: &InterpreterConfig,
) -> Result<BytesStart<'static>, MeiError> {
    let Some(record) = element.and_then(|id| interpretation.ledger.record(id)) else {
        return Ok(original.to_owned());
    };
    let name = String::from_utf8_lossy(original.name().as_ref()).into_owned();
    let mut tag = BytesStart::new(name);
    for attribute in original.attributes() {
        let attribute = attribute?;
        let key = attribute.key.as_ref();
        if ANNOTATION_ATTRIBUTES.iter().any(|a| a.as_bytes() == key) {
            continue;
        }
        tag.push_attribute(attribute);
    }
    for (key, value) in annotation_values(record, config) {
        tag.push_attribute((key, value.as_str()));
    }
    Ok(tag)
}

/// Attribute values for one ledger record, in a fixed order
pub fn annotation_values(record: &EventRecord, config: &InterpreterConfig) -> Vec<(&'static str, String)> {
    let mut values = Vec::new();
    if let Some(duration) = record.duration {
        values.push(("dur.intermediate", format_beats(duration)));
    }
    if let Some(scaled) = record.scaled {
        values.push(("dur.ges", format_beats(scaled)));
    }
    if let (Some(num), Some(numbase)) = (record.num, record.numbase) {
        values.push(("num", num.to_string()));
        values.push(("numbase", numbase.to_string()));
    }
    if let Some(quality) = record.quality.and_then(|q| q.mei_value()) {
        values.push(("dur.quality", quality.to_string()));
    }
    if let Some(rule) = record.rule {
        values.push(("rule", rule.code().to_string()));
    }
    if let Some(default) = record.default_minims {
        values.push(("defaultminims", format_beats(default)));
    }
    if config.annotate_beat_positions {
        if let Some(starts_at) = record.starts_at {
            values.push(("startsAt", format_beats(starts_at)));
        }
        if let Some(block_from) = record.block_from {
            values.push(("mensurBlockStartsAt", format_beats(block_from)));
        }
        if let Some(position) = &record.beat_position {
            values.push(("beatPos", position.to_attribute()));
        }
        if record.on_the_breve_beat {
            values.push(("onTheBreveBeat", "true".to_string()));
        }
        if record.crossed_a_breve_beat {
            values.push(("crossedABreveBeat", "true".to_string()));
        }
    }
    if let Some(comment) = &record.comment {
        values.push(("comment", comment.clone()));
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::mei::read_document;

    const SOURCE: &str = r#"<mei><music><section><staff n="1"><layer>
<mensur tempus="2" prolatio="2"/>
<note xml:id="a" dur="brevis"/>
<note xml:id="b" dur="brevis"/>
<rest xml:id="c" dur="semibrevis"/>
<!-- untouched -->
</layer></staff></section></music></mei>"#;

    fn run(config: &InterpreterConfig) -> String {
        let mut doc = read_document(SOURCE).unwrap();
        let result = Interpreter::new(config.clone()).run(&mut doc).unwrap();
        annotate(SOURCE, &doc, &result, config).unwrap()
    }

    #[test]
    fn test_attributes_and_bar_lines_written() {
        let out = run(&InterpreterConfig::default());
        assert!(out.contains(r#"xml:id="a" dur="brevis" dur.intermediate="4b""#));
        assert!(out.contains(r#"rule="rest""#));
        assert!(out.contains(r#"startsAt="4b""#));
        assert!(out.contains(r#"<barLine form="dotted"/><note xml:id="b""#));
        assert!(out.contains("<!-- untouched -->"));
        assert!(roxmltree::Document::parse(&out).is_ok());
    }

    #[test]
    fn test_beat_positions_can_be_left_out() {
        let config = InterpreterConfig { annotate_beat_positions: false, ..Default::default() };
        let out = run(&config);
        assert!(out.contains("dur.intermediate"));
        assert!(!out.contains("startsAt"));
        assert!(!out.contains("beatPos"));
    }

    #[test]
    fn test_annotating_annotated_output_changes_nothing() {
        const RECORDED: &str = r#"<mei><music><section><staff n="1"><layer>
<mensur tempus="3" prolatio="2"/>
<note xml:id="a" dur="brevis"/>
<note xml:id="b" dur="semibrevis"/>
<note xml:id="c" dur="brevis"/>
<note xml:id="d" dur="brevis"/>
</layer></staff></section></music></mei>"#;
        let config = InterpreterConfig::default();
        let annotate_once = |source: &str| {
            let mut doc = read_document(source).unwrap();
            let result = Interpreter::new(config.clone()).run(&mut doc).unwrap();
            annotate(source, &doc, &result, &config).unwrap()
        };

        let once = annotate_once(RECORDED);
        assert!(once.contains(r#"num="3" numbase="2" dur.quality="imperfecta" rule="I.4a""#));
        assert!(once.contains(r#"rule="I.2.b.antesim""#));

        let twice = annotate_once(&once);
        assert_eq!(once, twice);
    }
}
