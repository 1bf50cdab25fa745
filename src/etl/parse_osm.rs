use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::{self, FromStr};

use log::{info, warn};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::config::UserConfig;
use crate::data::{Coordinate, Element, Member, MemberType, Node, OsmId, OverpassResponse, Relation, Role, Tags, Way};
use crate::errors::{Error, Result};

use super::{remove_if_exists, Etl};

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_elements.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    OverpassJson,
    OsmXml,
}

impl InputFormat {
    /// Guesses the payload format from the file name. Returns the format and
    /// whether the file is xz compressed.
    pub fn detect(path: &Path) -> (InputFormat, bool) {
        let compressed = path.extension().is_some_and(|ext| ext == "xz");
        let inner = if compressed {
            path.file_stem().map(Path::new).unwrap_or(path)
        } else {
            path
        };
        let format = match inner.extension().and_then(|ext| ext.to_str()) {
            Some("osm") | Some("xml") => InputFormat::OsmXml,
            _ => InputFormat::OverpassJson,
        };
        (format, compressed)
    }
}

pub fn read_overpass_json<R: Read>(source: R) -> Result<Vec<Element>> {
    let response: OverpassResponse = serde_json::from_reader(source)?;
    Ok(response.elements)
}

enum ParserState {
    Top,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl ParserState {
    fn tags_mut(&mut self) -> Option<&mut Tags> {
        match self {
            ParserState::Top => None,
            ParserState::Node(node) => Some(&mut node.tags),
            ParserState::Way(way) => Some(&mut way.tags),
            ParserState::Relation(relation) => Some(&mut relation.tags),
        }
    }

    fn finish(&mut self, elements: &mut Vec<Element>) {
        match std::mem::replace(self, ParserState::Top) {
            ParserState::Top => (),
            ParserState::Node(node) => elements.push(Element::Node(node)),
            ParserState::Way(way) => elements.push(Element::Way(way)),
            ParserState::Relation(relation) => elements.push(Element::Relation(relation)),
        }
    }
}

fn find_attribute<'a>(el: &'a BytesStart, key: &[u8]) -> Result<Option<Attribute<'a>>> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == key {
            return Ok(Some(attribute));
        }
    }
    Ok(None)
}

fn parse_attribute<T>(el: &BytesStart, key: &[u8]) -> Result<Option<T>>
    where T: FromStr, Error: From<T::Err> {
    match find_attribute(el, key)? {
        Some(attribute) => {
            let value_str = str::from_utf8(&attribute.value)?;
            Ok(Some(value_str.parse()?))
        },
        None => Ok(None),
    }
}

fn required_attribute<T>(el: &BytesStart, key: &[u8]) -> Result<T>
    where T: FromStr, Error: From<T::Err> {
    parse_attribute(el, key)?.ok_or_else(|| {
        format!(
            "<{}> element without '{}' attribute",
            String::from_utf8_lossy(el.name().as_ref()),
            String::from_utf8_lossy(key),
        ).into()
    })
}

fn text_attribute(el: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    match find_attribute(el, key)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Inline `lat`/`lon` pair on an `<nd>` written by `out geom`.
fn parse_point(el: &BytesStart) -> Result<Option<Coordinate>> {
    let lat: Option<f64> = parse_attribute(el, b"lat")?;
    let lon: Option<f64> = parse_attribute(el, b"lon")?;
    Ok(lat.zip(lon).map(Coordinate::from))
}

fn parse_node(el: &BytesStart) -> Result<Option<Node>> {
    let id: OsmId = required_attribute(el, b"id")?;
    let lat: Option<f64> = parse_attribute(el, b"lat")?;
    let lon: Option<f64> = parse_attribute(el, b"lon")?;
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Some(Node { id, lat, lon, tags: Tags::new() })),
        _ => {
            warn!(node_id = id; "Skipping node without coordinates");
            Ok(None)
        },
    }
}

fn parse_member(el: &BytesStart) -> Result<Option<Member>> {
    let member_type = match text_attribute(el, b"type")?.as_deref() {
        Some("node") => MemberType::Node,
        Some("way") => MemberType::Way,
        Some("relation") => MemberType::Relation,
        _ => return Ok(None),
    };
    let role = text_attribute(el, b"role")?.unwrap_or_default();
    Ok(Some(Member {
        member_type,
        reference: required_attribute(el, b"ref")?,
        role: Role::from(role.as_str()),
        geometry: Vec::new(),
    }))
}

fn open_element(el: &BytesStart, self_closing: bool, state: &mut ParserState, elements: &mut Vec<Element>) -> Result<()> {
    match el.name().as_ref() {
        b"node" => {
            if let Some(node) = parse_node(el)? {
                *state = ParserState::Node(node);
            }
        },
        b"way" => {
            *state = ParserState::Way(Way {
                id: required_attribute(el, b"id")?,
                nodes: Vec::new(),
                geometry: Vec::new(),
                tags: Tags::new(),
            });
        },
        b"relation" => {
            *state = ParserState::Relation(Relation {
                id: required_attribute(el, b"id")?,
                members: Vec::new(),
                tags: Tags::new(),
            });
        },
        b"nd" => match state {
            ParserState::Way(way) => {
                way.nodes.push(required_attribute(el, b"ref")?);
                if let Some(point) = parse_point(el)? {
                    way.geometry.push(point);
                }
            },
            // Points nested in a <member> of an `out geom` relation.
            ParserState::Relation(relation) => {
                if let (Some(member), Some(point)) = (relation.members.last_mut(), parse_point(el)?) {
                    member.geometry.push(point);
                }
            },
            _ => (),
        },
        b"member" => {
            if let ParserState::Relation(relation) = state {
                if let Some(member) = parse_member(el)? {
                    relation.members.push(member);
                }
            }
        },
        b"tag" => {
            if let Some(tags) = state.tags_mut() {
                if let (Some(key), Some(value)) = (text_attribute(el, b"k")?, text_attribute(el, b"v")?) {
                    tags.insert(key, value);
                }
            }
        },
        _ => return Ok(()),
    }
    if self_closing && matches!(el.name().as_ref(), b"node" | b"way" | b"relation") {
        state.finish(elements);
    }
    Ok(())
}

/// Streams an `.osm` XML document into the element model.
pub fn read_osm_xml<R: BufRead>(source: R) -> Result<Vec<Element>> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut elements: Vec<Element> = Vec::new();
    let mut state = ParserState::Top;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(e.into()),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => open_element(&e, false, &mut state, &mut elements)?,
            Ok(Event::Empty(e)) => open_element(&e, true, &mut state, &mut elements)?,
            Ok(Event::End(e)) => {
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    state.finish(&mut elements);
                }
            },
            // Declarations, comments and whitespace carry nothing we need.
            Ok(_) => (),
        }
        buf.clear();
    }
    Ok(elements)
}

pub struct ParseOsmEtl<'a> {
    config: &'a UserConfig,
}

impl ParseOsmEtl<'_> {
    pub fn new(config: &UserConfig) -> ParseOsmEtl<'_> {
        ParseOsmEtl {
            config
        }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }
}

impl Etl for ParseOsmEtl<'_> {
    type Input = (InputFormat, Box<dyn BufRead>);
    type Output = Vec<Element>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&Self::output_path(dir))
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        let data_path = Path::new(&self.config.data_path);
        let (format, compressed) = InputFormat::detect(data_path);
        let file = fs::File::open(data_path)
            .map_err(|err| format!("Could not open {}: {err}", data_path.display()))?;
        let file_reader = BufReader::new(file);
        let reader: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        Ok((format, reader))
    }

    fn transform(&mut self, (format, reader): Self::Input) -> Result<Self::Output> {
        let elements = match format {
            InputFormat::OverpassJson => read_overpass_json(reader)?,
            InputFormat::OsmXml => read_osm_xml(reader)?,
        };
        info!(etl_name = ETL_NAME, element_count = elements.len(); "Parsed OSM payload");
        Ok(elements)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut writer = BufWriter::new(fs::File::create(Self::output_path(dir))?);
        serde_json::to_writer(&mut writer, &OverpassResponse { elements: output })?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::ElementIndex;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="46.9" minlon="-122.1" maxlat="47.2" maxlon="-121.8"/>
  <node id="1" lat="47.0" lon="-122.0" version="2"/>
  <node id="2" lat="47.0" lon="-121.9"/>
  <node id="3" lat="47.1" lon="-121.9">
    <tag k="natural" v="peak"/>
  </node>
  <node id="4" visible="false"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="3"/>
    <nd ref="1"/>
    <tag k="name" v="Lake &amp; Shore"/>
  </way>
  <relation id="100">
    <member type="way" ref="10" role="outer"/>
    <member type="node" ref="3" role="label"/>
    <member type="changeset" ref="5" role=""/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>"#;

    const SAMPLE_JSON: &str = r#"{"elements": [
        {"type": "node", "id": 1, "lat": 47.0, "lon": -122.0},
        {"type": "node", "id": 2, "lat": 47.0, "lon": -121.9},
        {"type": "node", "id": 3, "lat": 47.1, "lon": -121.9, "tags": {"natural": "peak"}},
        {"type": "way", "id": 10, "nodes": [1, 2, 3, 1], "tags": {"name": "Lake & Shore"}},
        {"type": "relation", "id": 100, "members": [
            {"type": "way", "ref": 10, "role": "outer"},
            {"type": "node", "ref": 3, "role": "label"}
        ], "tags": {"type": "multipolygon"}}
    ]}"#;

    #[test]
    fn xml_and_json_payloads_agree() {
        let from_xml = read_osm_xml(SAMPLE_XML.as_bytes()).unwrap();
        let from_json = read_overpass_json(SAMPLE_JSON.as_bytes()).unwrap();
        assert_eq!(from_xml, from_json);

        let index = ElementIndex::new(&from_xml);
        assert_eq!(index.way(10).unwrap().len(), 4);
    }

    #[test]
    fn xml_tags_are_unescaped() {
        let elements = read_osm_xml(SAMPLE_XML.as_bytes()).unwrap();
        let Element::Way(way) = &elements[3] else {
            panic!("expected the way, got {:?}", elements[3]);
        };
        assert_eq!(way.tags["name"], "Lake & Shore");
    }

    #[test]
    fn xml_without_required_id_is_an_error() {
        let err = read_osm_xml(r#"<osm><way><nd ref="1"/></way></osm>"#.as_bytes()).unwrap_err();
        assert_eq!(err.message, "<way> element without 'id' attribute");
    }

    #[test]
    fn detects_format_from_file_name() {
        assert_eq!(InputFormat::detect(Path::new("data/monaco.json")), (InputFormat::OverpassJson, false));
        assert_eq!(InputFormat::detect(Path::new("data/monaco.osm")), (InputFormat::OsmXml, false));
        assert_eq!(InputFormat::detect(Path::new("data/monaco.osm.xz")), (InputFormat::OsmXml, true));
        assert_eq!(InputFormat::detect(Path::new("data/monaco.json.xz")), (InputFormat::OverpassJson, true));
    }

    #[test]
    fn xml_out_geom_points_are_kept() {
        let xml = r#"<osm>
  <way id="20">
    <nd ref="1" lat="0.0" lon="0.0"/>
    <nd ref="2" lat="0.0" lon="1.0"/>
  </way>
  <relation id="1">
    <member type="way" ref="20" role="outer">
      <nd lat="0.0" lon="0.0"/><nd lat="0.0" lon="1.0"/>
    </member>
    <member type="way" ref="21" role="outer">
      <nd lat="0.0" lon="1.0"/><nd lat="1.0" lon="1.0"/><nd lat="0.0" lon="0.0"/>
    </member>
  </relation>
</osm>"#;
        let elements = read_osm_xml(xml.as_bytes()).unwrap();

        let Element::Way(way) = &elements[0] else {
            panic!("expected the way, got {:?}", elements[0]);
        };
        assert_eq!(way.nodes, vec![1, 2]);
        assert_eq!(way.geometry, vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)]);

        let Element::Relation(relation) = &elements[1] else {
            panic!("expected the relation, got {:?}", elements[1]);
        };
        assert_eq!(relation.members[0].geometry.len(), 2);
        assert_eq!(relation.members[1].geometry[2], Coordinate::new(0.0, 0.0));
    }
}
