// Credential template materialization
//
// A Cognos credential template lists named slots:
//
//   <credential>
//     <credentialElements>
//       <name>CAMNamespace</name>
//       <label>Namespace:</label>
//       <value><actualValue/></value>
//     </credentialElements>
//     ...
//   </credential>
//
// Logon fills the three CAM slots and sends the re-serialized document.
// Element order and count always survive the round trip.

use std::fmt;
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;

pub const CAM_NAMESPACE: &str = "CAMNamespace";
pub const CAM_USERNAME: &str = "CAMUsername";
pub const CAM_PASSWORD: &str = "CAMPassword";

const DEFAULT_ROOT: &str = "credential";
const DEFAULT_ELEMENT_TAG: &str = "credentialElements";
/// Child tags accepted as credential slots. Cognos itself uses the plural.
const ELEMENT_TAGS: [&str; 2] = ["credentialElements", "credentialElement"];

/// One named slot of a credential template.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialElement {
    pub name: String,
    pub label: String,
    pub actual_value: String,
}

impl fmt::Debug for CredentialElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.name == CAM_PASSWORD && !self.actual_value.is_empty() {
            "[REDACTED]"
        } else {
            self.actual_value.as_str()
        };
        f.debug_struct("CredentialElement")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("actual_value", &value)
            .finish()
    }
}

/// A parsed credential template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDocument {
    root: String,
    element_tag: String,
    elements: Vec<CredentialElement>,
}

impl Default for CredentialDocument {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.into(),
            element_tag: DEFAULT_ELEMENT_TAG.into(),
            elements: Vec::new(),
        }
    }
}

impl CredentialDocument {
    /// Build a document from elements, using Cognos' default tag names.
    pub fn from_elements(elements: Vec<CredentialElement>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }

    /// Read and parse a template file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let xml = std::fs::read_to_string(path).map_err(|source| Error::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml)
    }

    /// Parse a template from XML text.
    ///
    /// The root element may have any name. Its `credentialElements` (or
    /// `credentialElement`) children become slots; any other content is
    /// ignored. Text inside `name`, `label` and `actualValue` is kept
    /// exactly as read, whitespace included. Tags are matched by local
    /// name, so namespace prefixes are dropped.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let mut reader = Reader::from_str(xml);

        let mut root: Option<String> = None;
        let mut element_tag: Option<String> = None;
        let mut elements = Vec::new();
        let mut current: Option<CredentialElement> = None;
        let mut stack: Vec<String> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| Error::TemplateParse {
                message: format!("{e} (at byte {})", reader.buffer_position()),
            })?;

            match event {
                Event::Start(start) => {
                    open_element(&start, &mut stack, &mut root, &mut element_tag, &mut current)?;
                }
                Event::Empty(start) => {
                    open_element(&start, &mut stack, &mut root, &mut element_tag, &mut current)?;
                    close_element(&mut stack, &mut current, &mut elements);
                }
                Event::End(_) => close_element(&mut stack, &mut current, &mut elements),
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| Error::TemplateParse {
                        message: e.to_string(),
                    })?;
                    append_text(&stack, current.as_mut(), &text);
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    append_text(&stack, current.as_mut(), &String::from_utf8_lossy(&data));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::TemplateParse {
                message: format!("unexpected end of document inside <{open}>"),
            });
        }
        let root = root.ok_or_else(|| Error::TemplateParse {
            message: "document has no root element".into(),
        })?;

        Ok(Self {
            root,
            element_tag: element_tag.unwrap_or_else(|| DEFAULT_ELEMENT_TAG.into()),
            elements,
        })
    }

    /// Name of the document's root element.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// The credential slots, in template order.
    pub fn elements(&self) -> &[CredentialElement] {
        &self.elements
    }

    /// Look up a slot by name.
    pub fn element(&self, name: &str) -> Option<&CredentialElement> {
        self.elements.iter().find(|el| el.name == name)
    }

    /// Overwrite the actual value of the three CAM slots. Every other
    /// slot is left as read.
    pub fn fill(&mut self, namespace: &str, username: &str, password: &SecretString) {
        for element in &mut self.elements {
            let value = match element.name.as_str() {
                CAM_NAMESPACE => namespace,
                CAM_USERNAME => username,
                CAM_PASSWORD => password.expose_secret(),
                _ => continue,
            };
            value.clone_into(&mut element.actual_value);
        }
    }

    /// Serialize back to compact XML.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::new());

        write(&mut writer, Event::Start(BytesStart::new(self.root.as_str())))?;
        for element in &self.elements {
            write(&mut writer, Event::Start(BytesStart::new(self.element_tag.as_str())))?;
            write_text_element(&mut writer, "name", &element.name)?;
            write_text_element(&mut writer, "label", &element.label)?;
            write(&mut writer, Event::Start(BytesStart::new("value")))?;
            write_text_element(&mut writer, "actualValue", &element.actual_value)?;
            write(&mut writer, Event::End(BytesEnd::new("value")))?;
            write(&mut writer, Event::End(BytesEnd::new(self.element_tag.as_str())))?;
        }
        write(&mut writer, Event::End(BytesEnd::new(self.root.as_str())))?;

        String::from_utf8(writer.into_inner()).map_err(serialize_error)
    }
}

/// Read the template at `path`, fill the CAM slots, and return the
/// serialized document ready to send as the logon `xmlData` parameter.
pub fn materialize(
    path: &Path,
    namespace: &str,
    username: &str,
    password: &SecretString,
) -> Result<String, Error> {
    let mut document = CredentialDocument::from_file(path)?;
    debug!(
        path = %path.display(),
        slots = document.elements().len(),
        "materializing credential template"
    );
    document.fill(namespace, username, password);
    document.to_xml()
}

// ── Parser helpers ──────────────────────────────────────────────────

fn open_element(
    start: &BytesStart<'_>,
    stack: &mut Vec<String>,
    root: &mut Option<String>,
    element_tag: &mut Option<String>,
    current: &mut Option<CredentialElement>,
) -> Result<(), Error> {
    let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    match stack.len() {
        0 => {
            if root.is_some() {
                return Err(Error::TemplateParse {
                    message: format!("unexpected second root element <{local}>"),
                });
            }
            *root = Some(local.clone());
        }
        1 if ELEMENT_TAGS.contains(&local.as_str()) => {
            element_tag.get_or_insert_with(|| local.clone());
            *current = Some(CredentialElement::default());
        }
        _ => {}
    }

    stack.push(local);
    Ok(())
}

fn close_element(
    stack: &mut Vec<String>,
    current: &mut Option<CredentialElement>,
    elements: &mut Vec<CredentialElement>,
) {
    stack.pop();
    if stack.len() == 1 {
        if let Some(element) = current.take() {
            elements.push(element);
        }
    }
}

fn append_text(stack: &[String], current: Option<&mut CredentialElement>, text: &str) {
    let Some(element) = current else {
        return;
    };
    match stack {
        [_, _, field] if field == "name" => element.name.push_str(text),
        [_, _, field] if field == "label" => element.label.push_str(text),
        [_, _, value, actual] if value == "value" && actual == "actualValue" => {
            element.actual_value.push_str(text);
        }
        _ => {}
    }
}

// ── Writer helpers ──────────────────────────────────────────────────

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), Error> {
    writer.write_event(event).map_err(serialize_error)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), Error> {
    write(writer, Event::Start(BytesStart::new(tag)))?;
    if !text.is_empty() {
        write(writer, Event::Text(BytesText::new(text)))?;
    }
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn serialize_error(e: impl fmt::Display) -> Error {
    Error::TemplateParse {
        message: format!("failed to serialize credentials: {e}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use pretty_assertions::assert_eq;

    use super::*;

    const TEMPLATE: &str = r#"<credential>
  <credentialElements>
    <name>CAMNamespace</name>
    <label>Namespace:</label>
    <value><actualValue/></value>
  </credentialElements>
  <credentialElements>
    <name>CAMUsername</name>
    <label>User ID:</label>
    <value><actualValue></actualValue></value>
  </credentialElements>
  <credentialElements>
    <name>CAMPassword</name>
    <label>Password:</label>
    <value><actualValue/></value>
  </credentialElements>
</credential>"#;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_owned())
    }

    #[test]
    fn parses_cognos_template() {
        let doc = CredentialDocument::parse(TEMPLATE).unwrap();
        assert_eq!(doc.root_name(), "credential");
        let names: Vec<&str> = doc.elements().iter().map(|el| el.name.as_str()).collect();
        assert_eq!(names, [CAM_NAMESPACE, CAM_USERNAME, CAM_PASSWORD]);
        assert!(doc.elements().iter().all(|el| el.actual_value.is_empty()));
        assert_eq!(doc.element(CAM_USERNAME).unwrap().label, "User ID:");
    }

    #[test]
    fn fill_populates_cam_slots_only() {
        let xml = r"<credential>
  <credentialElements><name>CAMNamespace</name><label>NS</label><value><actualValue/></value></credentialElements>
  <credentialElements><name>Locale</name><label>Locale</label><value><actualValue>en-us</actualValue></value></credentialElements>
  <credentialElements><name>CAMUsername</name><label>User</label><value><actualValue/></value></credentialElements>
  <credentialElements><name>CAMPassword</name><label>Pass</label><value><actualValue>old</actualValue></value></credentialElements>
</credential>";
        let mut doc = CredentialDocument::parse(xml).unwrap();
        let before = doc.clone();
        doc.fill("ns1", "user1", &secret("pass1"));

        assert_eq!(doc.elements().len(), before.elements().len());
        for (after, before) in doc.elements().iter().zip(before.elements()) {
            assert_eq!(after.name, before.name);
            assert_eq!(after.label, before.label);
            match after.name.as_str() {
                CAM_NAMESPACE => assert_eq!(after.actual_value, "ns1"),
                CAM_USERNAME => assert_eq!(after.actual_value, "user1"),
                CAM_PASSWORD => assert_eq!(after.actual_value, "pass1"),
                _ => assert_eq!(after.actual_value, before.actual_value),
            }
        }
    }

    #[test]
    fn pass_through_text_keeps_whitespace_and_entities() {
        let xml = r"<credential>
  <credentialElements>
    <name>Locale</name>
    <label>Pick a locale: </label>
    <value><actualValue>  en us &amp; fr  </actualValue></value>
  </credentialElements>
  <credentialElements>
    <name>CAMUsername</name>
    <label> User ID </label>
    <value><actualValue/></value>
  </credentialElements>
</credential>";
        let mut doc = CredentialDocument::parse(xml).unwrap();
        doc.fill("ns", "me", &secret("pw"));

        let locale = doc.element("Locale").unwrap();
        assert_eq!(locale.label, "Pick a locale: ");
        assert_eq!(locale.actual_value, "  en us & fr  ");
        assert_eq!(doc.element(CAM_USERNAME).unwrap().label, " User ID ");

        let reparsed = CredentialDocument::parse(&doc.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed.element("Locale").unwrap().actual_value, "  en us & fr  ");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn prefixed_tags_are_matched_and_written_by_local_name() {
        let xml = r#"<cm:credential xmlns:cm="urn:cognos">
  <cm:credentialElements><cm:name>CAMUsername</cm:name><cm:label>User</cm:label><cm:value><cm:actualValue/></cm:value></cm:credentialElements>
</cm:credential>"#;
        let mut doc = CredentialDocument::parse(xml).unwrap();
        assert_eq!(doc.root_name(), "credential");
        doc.fill("ns", "me", &secret("pw"));

        assert_eq!(
            doc.to_xml().unwrap(),
            "<credential><credentialElements><name>CAMUsername</name><label>User</label>\
             <value><actualValue>me</actualValue></value></credentialElements></credential>"
        );
    }

    #[test]
    fn serialized_document_reparses_to_same_slots() {
        let mut doc = CredentialDocument::parse(TEMPLATE).unwrap();
        doc.fill("LDAP", "jdoe", &secret("p<a>ss&word"));
        let xml = doc.to_xml().unwrap();

        assert!(xml.starts_with("<credential><credentialElements><name>CAMNamespace</name>"));
        assert!(xml.contains("p&lt;a&gt;ss&amp;word"));
        assert_eq!(CredentialDocument::parse(&xml).unwrap(), doc);
    }

    #[test]
    fn singular_element_tag_is_accepted_and_preserved() {
        let xml = "<credentialElements>\
            <credentialElement><name>CAMUsername</name><label>User</label><value><actualValue/></value></credentialElement>\
            </credentialElements>";
        let mut doc = CredentialDocument::parse(xml).unwrap();
        doc.fill("ns", "me", &secret("pw"));
        assert_eq!(doc.elements().len(), 1);
        assert_eq!(
            doc.to_xml().unwrap(),
            "<credentialElements><credentialElement><name>CAMUsername</name><label>User</label>\
             <value><actualValue>me</actualValue></value></credentialElement></credentialElements>"
        );
    }

    #[test]
    fn malformed_template_is_an_error() {
        let result = CredentialDocument::parse("<credential><credentialElements><name>x</credential>");
        assert!(matches!(result, Err(Error::TemplateParse { .. })));

        let result = CredentialDocument::parse("<credential><credentialElements>");
        assert!(matches!(result, Err(Error::TemplateParse { .. })));

        let result = CredentialDocument::parse("   ");
        assert!(matches!(result, Err(Error::TemplateParse { .. })));
    }

    #[test]
    fn debug_redacts_password() {
        let mut doc = CredentialDocument::parse(TEMPLATE).unwrap();
        doc.fill("ns", "user", &secret("hunter2"));
        let rendered = format!("{doc:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn materialize_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEMPLATE.as_bytes()).unwrap();

        let xml = materialize(file.path(), "ns1", "user1", &secret("pass1")).unwrap();
        let doc = CredentialDocument::parse(&xml).unwrap();
        assert_eq!(doc.element(CAM_NAMESPACE).unwrap().actual_value, "ns1");
        assert_eq!(doc.element(CAM_USERNAME).unwrap().actual_value, "user1");
        assert_eq!(doc.element(CAM_PASSWORD).unwrap().actual_value, "pass1");
    }

    #[test]
    fn materialize_missing_file_is_file_access_error() {
        let result = materialize(
            Path::new("/nonexistent/credentials.xml"),
            "ns",
            "user",
            &secret("pw"),
        );
        assert!(matches!(result, Err(Error::FileAccess { .. })));
    }
}
