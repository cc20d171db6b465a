// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use quick_xml::events::{BytesStart, Event};

use super::ast::{AttributeBlock, Document, Profile, RuleKind, RuleNode};
use super::Error;
use crate::format::{attribute, attributes_of, Parser};
use crate::router::{RouteDataObjectAttribute, RoutingParameter, RoutingParameterType};

/// Reads a whole routing configuration document.
pub(super) fn read_document<P: Parser>(mut parser: P) -> Result<Document, Error> {
    let mut b = DocumentBuilder::default();

    loop {
        match parser.read_event()? {
            Event::Start(start) => b.start(&start)?,
            Event::Empty(start) => {
                b.start(&start)?;
                b.end(start.local_name().as_ref());
            }
            Event::End(end) => b.end(end.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(b.finish())
}

#[derive(Default)]
struct DocumentBuilder {
    doc: Document,
    profile: Option<Profile>,
    block: Option<AttributeBlock>,
    rules: Vec<RuleNode>,
}

impl DocumentBuilder {
    fn start(&mut self, start: &BytesStart<'_>) -> Result<(), Error> {
        let name = start.local_name();
        let name = name.as_ref();
        let attrs = attributes_of(start);

        match name {
            b"osmand_routing_config" => {
                self.doc.default_profile = attribute(&attrs, "defaultProfile").to_string();
            }

            b"routingProfile" => {
                self.close_profile();
                self.profile = Some(Profile {
                    name: attribute(&attrs, "name").to_string(),
                    base_profile: attribute(&attrs, "baseProfile").to_string(),
                    attributes: attrs,
                    ..Default::default()
                });
            }

            b"attribute" => {
                let kv = (
                    attribute(&attrs, "name").to_string(),
                    attribute(&attrs, "value").to_string(),
                );
                match self.profile.as_mut() {
                    Some(profile) => profile.attributes.push(kv),
                    None => self.doc.attributes.push(kv),
                }
            }

            b"parameter" => {
                let profile = self
                    .profile
                    .as_mut()
                    .ok_or(Error::MisplacedElement("parameter"))?;
                profile.parameters.push(parse_parameter(&attrs)?);
            }

            b"point" | b"way" => {
                if self.profile.is_none() {
                    return Err(Error::MisplacedElement(if name == b"point" {
                        "point"
                    } else {
                        "way"
                    }));
                }

                let attribute_name = attribute(&attrs, "attribute");
                let attribute = RouteDataObjectAttribute::from_name(attribute_name)
                    .ok_or_else(|| Error::UnknownAttribute(attribute_name.to_string()))?;
                self.block = Some(AttributeBlock {
                    attribute,
                    value_type: crate::format::attribute(&attrs, "type").to_string(),
                    rules: Vec::default(),
                });
            }

            _ => match RuleKind::from_tag(name) {
                Some(kind) => {
                    if self.profile.is_none() {
                        return Err(Error::MisplacedElement(kind.tag()));
                    }
                    if self.block.is_none() && self.rules.is_empty() {
                        log::warn!("<{}> outside of a <point> or <way> block is ignored", kind.tag());
                    }
                    self.rules.push(parse_rule(kind, &attrs));
                }
                None => log::warn!(
                    "unknown routing configuration element: <{}>",
                    String::from_utf8_lossy(name),
                ),
            },
        }

        Ok(())
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"routingProfile" => self.close_profile(),
            b"point" | b"way" => self.close_block(),
            _ if RuleKind::from_tag(name).is_some() => {
                let Some(node) = self.rules.pop() else {
                    return;
                };
                if let Some(parent) = self.rules.last_mut() {
                    parent.children.push(node);
                } else if let Some(block) = self.block.as_mut() {
                    block.rules.push(node);
                }
            }
            _ => {}
        }
    }

    fn close_block(&mut self) {
        self.rules.clear();
        if let Some(block) = self.block.take() {
            if let Some(profile) = self.profile.as_mut() {
                profile.blocks.push(block);
            }
        }
    }

    fn close_profile(&mut self) {
        self.close_block();
        if let Some(profile) = self.profile.take() {
            self.doc.profiles.push(profile);
        }
    }

    fn finish(mut self) -> Document {
        self.close_profile();
        self.doc
    }
}

fn parse_parameter(attrs: &[(String, String)]) -> Result<RoutingParameter, Error> {
    let type_name = attribute(attrs, "type");
    let type_ = match type_name.to_ascii_lowercase().as_str() {
        "boolean" => RoutingParameterType::Boolean,
        "numeric" => RoutingParameterType::Numeric,
        "symbolic" => RoutingParameterType::Symbolic,
        _ => return Err(Error::InvalidParameterType(type_name.to_string())),
    };

    let possible_values = if type_ == RoutingParameterType::Numeric {
        split_list(attribute(attrs, "values"))
            .map(|v| v.parse().unwrap_or(0.0))
            .collect()
    } else {
        Vec::default()
    };

    Ok(RoutingParameter {
        id: attribute(attrs, "id").to_string(),
        group: attribute(attrs, "group").to_string(),
        name: attribute(attrs, "name").to_string(),
        description: attribute(attrs, "description").to_string(),
        type_,
        possible_values,
        possible_value_descriptions: split_list(attribute(attrs, "valueDescriptions"))
            .map(|s| s.to_string())
            .collect(),
        default_boolean: attribute(attrs, "default") == "true",
    })
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_rule(kind: RuleKind, attrs: &[(String, String)]) -> RuleNode {
    let mut node = RuleNode::new(kind);
    for (k, v) in attrs {
        let field = match k.as_str() {
            "t" => &mut node.t,
            "v" => &mut node.v,
            "param" => &mut node.param,
            "value1" => &mut node.value1,
            "value2" => &mut node.value2,
            "type" => &mut node.value_type,
            "value" => &mut node.value,
            _ => continue,
        };
        *field = v.clone();
    }
    node
}
