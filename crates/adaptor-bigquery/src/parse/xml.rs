//! XML to JSON conversion and the `parse_xml` operation
//!
//! Output follows the xml2js conventions job scripts already expect:
//! attributes under `$`, text under `_` when an element also has attributes
//! or children, and child elements grouped by name.

use adaptor_common::Result as AdaptorResult;
use adaptor_core::{Operation, Param, State};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ConnectorError, Result};

/// Options understood by [`parse_xml`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlOptions {
    /// Wrap the result in an object keyed by the root element's name
    pub explicit_root: bool,
    /// Always put child elements in arrays, even when there is only one
    pub explicit_array: bool,
    pub attr_key: String,
    pub char_key: String,
    pub ignore_attrs: bool,
    /// Trim whitespace around text content
    pub trim: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            explicit_root: true,
            explicit_array: true,
            attr_key: "$".to_string(),
            char_key: "_".to_string(),
            ignore_attrs: false,
            trim: false,
        }
    }
}

struct Element {
    name: String,
    attrs: Map<String, Value>,
    text: String,
    children: Vec<(String, Value)>,
}

impl Element {
    fn open(start: &BytesStart<'_>, options: &XmlOptions) -> Result<Self> {
        let mut attrs = Map::new();
        if !options.ignore_attrs {
            for attr in start.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr.unescape_value()?.into_owned();
                attrs.insert(key, Value::String(value));
            }
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attrs,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn into_value(self, options: &XmlOptions) -> Value {
        let text = if options.trim {
            self.text.trim().to_string()
        } else {
            self.text
        };
        // whitespace-only text between tags is layout, not content
        let has_text = !text.trim().is_empty();

        if self.attrs.is_empty() && self.children.is_empty() {
            return Value::String(if has_text { text } else { String::new() });
        }

        let mut object = Map::new();
        if !self.attrs.is_empty() {
            object.insert(options.attr_key.clone(), Value::Object(self.attrs));
        }
        if has_text {
            object.insert(options.char_key.clone(), Value::String(text));
        }

        let mut grouped: Map<String, Value> = Map::new();
        for (name, child) in self.children {
            match grouped.get_mut(&name) {
                Some(Value::Array(items)) => items.push(child),
                _ => {
                    grouped.insert(name, Value::Array(vec![child]));
                },
            }
        }
        for (name, items) in grouped {
            let value = match items {
                Value::Array(mut items) if !options.explicit_array && items.len() == 1 => items.remove(0),
                other => other,
            };
            object.insert(name, value);
        }

        Value::Object(object)
    }
}

/// Convert an XML document to JSON
pub fn parse_xml_str(xml: &str, options: &XmlOptions) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::open(&start, options)?),
            Event::Empty(start) => {
                let element = Element::open(&start, options)?;
                close(element, &mut stack, &mut root, options)?;
            },
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ConnectorError::MalformedXml("closing tag without an open element".into()))?;
                close(element, &mut stack, &mut root, options)?;
            },
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            },
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConnectorError::MalformedXml(format!("unclosed element <{}>", open.name)));
    }

    let (name, value) =
        root.ok_or_else(|| ConnectorError::MalformedXml("document has no root element".into()))?;

    if options.explicit_root {
        let mut wrapped = Map::new();
        wrapped.insert(name, value);
        Ok(Value::Object(wrapped))
    } else {
        Ok(value)
    }
}

fn close(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<(String, Value)>,
    options: &XmlOptions,
) -> Result<()> {
    let name = element.name.clone();
    let value = element.into_value(options);

    if let Some(parent) = stack.last_mut() {
        parent.children.push((name, value));
    } else if root.is_some() {
        return Err(ConnectorError::MalformedXml(format!(
            "second root element <{}>",
            name
        )));
    } else {
        *root = Some((name, value));
    }

    Ok(())
}

/// Operation returned by [`parse_xml`]
pub struct ParseXml {
    xml: Param<String>,
    options: Param<XmlOptions>,
}

/// Parse an XML document into `data`
pub fn parse_xml(xml: impl Into<Param<String>>, options: impl Into<Param<XmlOptions>>) -> ParseXml {
    ParseXml {
        xml: xml.into(),
        options: options.into(),
    }
}

#[async_trait]
impl Operation for ParseXml {
    async fn run(&self, state: State) -> AdaptorResult<State> {
        let xml = self.xml.resolve(&state)?;
        let options = self.options.resolve(&state)?;

        let result = parse_xml_str(&xml, &options)?;
        info!("Finished parsing. Result available in state.data");

        Ok(state.advance(result))
    }

    fn name(&self) -> &str {
        "parse_xml"
    }
}
