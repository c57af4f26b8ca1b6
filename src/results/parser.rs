//! FlowDroid result document parser.
//!
//! The document looks like this:
//!
//! ```xml
//! <DataFlowResults FileFormatVersion="102" TerminationState="Success">
//!   <Results>
//!     <Result>
//!       <Sink Statement="..." Method="..." MethodSourceSinkDefinition="...">
//!         <AccessPath Value="$r3" Type="java.lang.String" />
//!       </Sink>
//!       <Sources>
//!         <Source Statement="..." Method="..." MethodSourceSinkDefinition="..." />
//!       </Sources>
//!     </Result>
//!   </Results>
//!   <PerformanceData>
//!     <PerformanceEntry Name="TotalRuntimeSeconds" Value="12" />
//!   </PerformanceData>
//! </DataFlowResults>
//! ```

use std::{collections::BTreeMap, io::Read};

use failure::Error;
use xml::{
    attribute::OwnedAttribute,
    reader::{EventReader, XmlEvent},
    ParserConfig,
};

use super::{
    finding::{AccessPath, Endpoint, Finding, UNKNOWN},
    Report,
};
use crate::error::ErrorKind;

/// Element open while walking the document.
enum Frame {
    /// A `Result` element, with the index reserved for its finding.
    Record {
        index: usize,
        sink: Option<Endpoint>,
        sources: Vec<Endpoint>,
    },
    /// A `Sink` element.
    Sink(EndpointBuilder),
    /// A `Source` element.
    Source(EndpointBuilder),
    /// Anything else.
    Other,
}

/// Attributes of a sink or source collected so far.
struct EndpointBuilder {
    statement: String,
    method: String,
    definition: String,
    access_path: Option<AccessPath>,
}

impl EndpointBuilder {
    fn from_attributes(attributes: &[OwnedAttribute]) -> Self {
        Self {
            statement: required_attribute(attributes, "Statement"),
            method: required_attribute(attributes, "Method"),
            definition: required_attribute(attributes, "MethodSourceSinkDefinition"),
            access_path: None,
        }
    }

    fn build(self) -> Endpoint {
        Endpoint::new(
            self.statement,
            self.method,
            self.definition,
            self.access_path,
        )
    }
}

/// Parses a result document held in memory.
pub fn parse_str(document: &str) -> Result<Report, Error> {
    parse(document.as_bytes())
}

/// Parses a result document.
///
/// Every `Result` element, at any depth, yields one finding. Missing `Statement`, `Method`
/// and `MethodSourceSinkDefinition` attributes are replaced by `Unknown`, and a result
/// without a sink gets a sink made of placeholders.
pub fn parse<R: Read>(source: R) -> Result<Report, Error> {
    let config = ParserConfig::new()
        .trim_whitespace(true)
        .ignore_comments(true);
    let parser = EventReader::new_with_config(source, config);

    let mut stack: Vec<Frame> = Vec::new();
    let mut findings: Vec<Option<Finding>> = Vec::new();
    let mut performance = BTreeMap::new();
    let mut termination_state: Option<String> = None;

    for event in parser {
        match event {
            Ok(XmlEvent::StartElement {
                name, attributes, ..
            }) => {
                let frame = match name.local_name.as_str() {
                    "DataFlowResults" => {
                        if termination_state.is_none() {
                            termination_state =
                                Some(attribute(&attributes, "TerminationState").unwrap_or_default());
                        }
                        Frame::Other
                    }
                    "Result" => {
                        findings.push(None);
                        Frame::Record {
                            index: findings.len() - 1,
                            sink: None,
                            sources: Vec::new(),
                        }
                    }
                    "Sink" => Frame::Sink(EndpointBuilder::from_attributes(&attributes)),
                    "Source" => Frame::Source(EndpointBuilder::from_attributes(&attributes)),
                    "AccessPath" => {
                        if let Some(endpoint) = innermost_endpoint(&mut stack) {
                            if endpoint.access_path.is_none() {
                                endpoint.access_path = Some(AccessPath::new(
                                    attribute(&attributes, "Value").unwrap_or_default(),
                                    attribute(&attributes, "Type").unwrap_or_default(),
                                ));
                            }
                        }
                        Frame::Other
                    }
                    "PerformanceEntry" => {
                        if let (Some(name), Some(value)) =
                            (attribute(&attributes, "Name"), attribute(&attributes, "Value"))
                        {
                            let _ = performance.insert(name, value);
                        }
                        Frame::Other
                    }
                    _ => Frame::Other,
                };
                stack.push(frame);
            }
            Ok(XmlEvent::EndElement { .. }) => match stack.pop() {
                Some(Frame::Record {
                    index,
                    sink,
                    sources,
                }) => {
                    findings[index] = Some(Finding::new(sink.unwrap_or_default(), sources));
                }
                Some(Frame::Sink(builder)) => {
                    if let Some((sink, _)) = innermost_record(&mut stack) {
                        if sink.is_none() {
                            *sink = Some(builder.build());
                        }
                    }
                }
                Some(Frame::Source(builder)) => {
                    if let Some((_, sources)) = innermost_record(&mut stack) {
                        sources.push(builder.build());
                    }
                }
                Some(Frame::Other) | None => {}
            },
            Ok(_) => {}
            Err(e) => {
                return Err(ErrorKind::Parse {
                    message: format!("invalid result document: {}", e),
                }
                .into());
            }
        }
    }

    Ok(Report::new(
        findings.into_iter().flatten().collect(),
        performance,
        termination_state.unwrap_or_default(),
    ))
}

/// Gets the value of the given attribute, if present and not empty.
fn attribute(attributes: &[OwnedAttribute], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|attr| attr.name.local_name == name)
        .map(|attr| attr.value.clone())
        .filter(|value| !value.is_empty())
}

/// Gets the value of an attribute every sink and source should carry.
fn required_attribute(attributes: &[OwnedAttribute], name: &str) -> String {
    attribute(attributes, name).unwrap_or_else(|| UNKNOWN.to_owned())
}

/// Finds the sink or source being parsed, if the current element belongs to one.
fn innermost_endpoint(stack: &mut [Frame]) -> Option<&mut EndpointBuilder> {
    for frame in stack.iter_mut().rev() {
        match frame {
            Frame::Sink(builder) | Frame::Source(builder) => return Some(builder),
            Frame::Record { .. } => return None,
            Frame::Other => {}
        }
    }
    None
}

/// Finds the result record being parsed, if any.
fn innermost_record(
    stack: &mut [Frame],
) -> Option<(&mut Option<Endpoint>, &mut Vec<Endpoint>)> {
    stack.iter_mut().rev().find_map(|frame| match frame {
        Frame::Record { sink, sources, .. } => Some((sink, sources)),
        _ => None,
    })
}
