//! Document structure
//!
//! A document is a tree of sections. Only *atomic* sections (those that
//! contain no nested sections) hold music; each of their layers is one
//! voice. Element identities are allocated by the document so that they are
//! unique across all voices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::element::{
    BarLine, BarLineForm, Dot, DotForm, Element, ElementId, Event, Note, Rest, VoiceItem,
};
use super::level::Level;
use super::mensuration::{Mensuration, Proportion};

/// One layer of one staff in one atomic section
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Voice {
    /// Staff number (`staff/@n`)
    pub part: u32,
    /// Layer number within the staff
    pub layer: u32,
    pub items: Vec<VoiceItem>,
}

impl Voice {
    pub fn builder(part: u32) -> VoiceBuilder {
        VoiceBuilder::new(part)
    }

    /// Notes, rests and dots in order
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.items.iter().filter_map(Event::from_item)
    }

    pub fn event_ids(&self) -> Vec<ElementId> {
        self.events().map(|e| e.id).collect()
    }

    pub fn position_of(&self, id: ElementId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Section {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub voices: Vec<Voice>,
}

impl Section {
    pub fn new(id: Option<String>) -> Self {
        Self { id, sections: Vec::new(), voices: Vec::new() }
    }

    /// A section with music and no nested sections
    pub fn is_atomic(&self) -> bool {
        self.sections.is_empty() && !self.voices.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub sections: Vec<Section>,
    /// Mensuration given by each staff definition, keyed by part number
    #[serde(default)]
    pub staff_mensurations: BTreeMap<u32, Mensuration>,
    #[serde(default)]
    next_id: u32,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Build a voice and append it to the last top-level section (creating
    /// one if needed). Returns the voice's ordinal in [`Document::voices`].
    pub fn push_voice(&mut self, builder: VoiceBuilder) -> usize {
        let voice = builder.build(self);
        if self.sections.last().map_or(true, |s| !s.sections.is_empty()) {
            self.sections.push(Section::new(None));
        }
        if let Some(section) = self.sections.last_mut() {
            section.voices.push(voice);
        }
        self.voices().len() - 1
    }

    /// All atomic sections in document order
    pub fn atomic_sections(&self) -> Vec<&Section> {
        fn collect<'a>(sections: &'a [Section], out: &mut Vec<&'a Section>) {
            for section in sections {
                if section.sections.is_empty() {
                    if section.is_atomic() {
                        out.push(section);
                    }
                } else {
                    collect(&section.sections, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.sections, &mut out);
        out
    }

    /// Every voice of every atomic section, in document order
    pub fn voices(&self) -> Vec<&Voice> {
        self.atomic_sections()
            .into_iter()
            .flat_map(|section| section.voices.iter())
            .collect()
    }

    pub fn voices_mut(&mut self) -> Vec<&mut Voice> {
        fn collect<'a>(sections: &'a mut [Section], out: &mut Vec<&'a mut Voice>) {
            for section in sections.iter_mut() {
                if section.sections.is_empty() {
                    out.extend(section.voices.iter_mut());
                } else {
                    collect(&mut section.sections, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(&mut self.sections, &mut out);
        out
    }

    /// Event identities of the voice at `ordinal`
    pub fn event_ids(&self, ordinal: usize) -> Vec<ElementId> {
        self.voices().get(ordinal).map(|v| v.event_ids()).unwrap_or_default()
    }

    pub fn item(&self, id: ElementId) -> Option<&VoiceItem> {
        self.voices()
            .into_iter()
            .flat_map(|voice| voice.items.iter())
            .find(|item| item.id == id)
    }

    /// Number of notes, rests and dots in the document
    pub fn event_count(&self) -> usize {
        self.voices().iter().map(|voice| voice.events().count()).sum()
    }
}

/// Fluent construction of a voice stream
#[derive(Clone, Debug, Default)]
pub struct VoiceBuilder {
    part: u32,
    layer: u32,
    elements: Vec<(Element, Option<String>, Option<usize>)>,
}

impl VoiceBuilder {
    pub fn new(part: u32) -> Self {
        Self { part, layer: 1, elements: Vec::new() }
    }

    pub fn layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    pub fn element(mut self, element: Element) -> Self {
        self.elements.push((element, None, None));
        self
    }

    /// Element carrying its source identity (used by document readers)
    pub fn push_source(&mut self, element: Element, xml_id: Option<String>, source_index: usize) {
        self.elements.push((element, xml_id, Some(source_index)));
    }

    pub fn mensur(self, mensuration: Mensuration) -> Self {
        self.element(Element::Mensuration(mensuration))
    }

    /// Mensuration from `[prolatio, tempus, modus minor, modus maior]`
    pub fn mensur_digits(self, digits: [u32; 4]) -> Self {
        self.mensur(Mensuration::from_digits(digits))
    }

    pub fn proportion(self, num: u32, numbase: u32) -> Self {
        self.element(Element::Proportion(Proportion::new(num, numbase)))
    }

    pub fn note(self, level: Level) -> Self {
        self.element(Element::Note(Note { level, colored: false, quality: None, given_duration: None }))
    }

    pub fn colored(self, level: Level) -> Self {
        self.element(Element::Note(Note { level, colored: true, quality: None, given_duration: None }))
    }

    pub fn rest(self, level: Level) -> Self {
        self.element(Element::Rest(Rest {
            level,
            loc: None,
            perfect_longa: false,
            maxima_is_perfect: false,
            longa_is_perfect: false,
            given_duration: None,
        }))
    }

    pub fn aug_dot(self) -> Self {
        self.element(Element::Dot(Dot { form: DotForm::Aug }))
    }

    pub fn div_dot(self) -> Self {
        self.element(Element::Dot(Dot { form: DotForm::Div }))
    }

    pub fn bar_line(self, form: BarLineForm) -> Self {
        self.element(Element::BarLine(BarLine { form }))
    }

    /// Allocate identities from `document` and produce the voice
    pub fn build(self, document: &mut Document) -> Voice {
        let items = self
            .elements
            .into_iter()
            .map(|(element, xml_id, source_index)| VoiceItem {
                id: document.allocate_id(),
                xml_id,
                source_index,
                element,
            })
            .collect();
        Voice { part: self.part, layer: self.layer, items }
    }
}
