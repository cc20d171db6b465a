// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Loading of [RoadNetworks](RoadNetwork) from [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML) files.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::from_utf8;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};

use super::RoadNetwork;
use crate::format::{buffered, BufParser, FileFormat, IoParser, Parser};
use crate::road::{Point31, Road, RoutingRegion};

/// Error conditions which may occur when loading OSM data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Clone, Default)]
struct Node {
    id: i64,
    lat: f64,
    lon: f64,
    tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
struct Way {
    id: i64,
    nodes: Vec<i64>,
    tags: Vec<(String, String)>,
}

#[derive(Debug)]
enum Feature {
    Node(Node),
    Way(Way),
}

impl Feature {
    fn tags(&mut self) -> &mut Vec<(String, String)> {
        match self {
            Self::Node(n) => &mut n.tags,
            Self::Way(w) => &mut w.tags,
        }
    }
}

/// Reads all nodes and ways from an OSM XML document.
fn read_features<P: Parser>(mut parser: P) -> Result<(HashMap<i64, Node>, Vec<Way>), Error> {
    let mut nodes = HashMap::default();
    let mut ways = Vec::default();
    let mut f: Option<Feature> = None;

    let mut finish = |f: Feature| match f {
        Feature::Node(n) => {
            nodes.insert(n.id, n);
        }
        Feature::Way(w) => ways.push(w),
    };

    loop {
        match parser.read_event()? {
            Event::Start(start) => match start.local_name().as_ref() {
                b"node" => f = parse_node(&start).map(Feature::Node),
                b"way" => f = parse_way(&start).map(Feature::Way),
                _ => {}
            },

            Event::Empty(start) => match start.local_name().as_ref() {
                b"node" => {
                    if let Some(n) = parse_node(&start) {
                        finish(Feature::Node(n));
                    }
                }
                b"tag" => {
                    if let (Some(f), Some(kv)) = (f.as_mut(), parse_tag(&start)) {
                        f.tags().push(kv);
                    }
                }
                b"nd" => {
                    if let (Some(Feature::Way(w)), Some(ref_)) = (f.as_mut(), parse_nd(&start)) {
                        w.nodes.push(ref_);
                    }
                }
                _ => {}
            },

            Event::End(end) => match end.local_name().as_ref() {
                b"node" | b"way" => {
                    if let Some(f) = f.take() {
                        finish(f);
                    }
                }
                _ => {}
            },

            Event::Eof => break,
            _ => {}
        }
    }

    Ok((nodes, ways))
}

fn parse_node(start: &BytesStart<'_>) -> Option<Node> {
    let mut id: i64 = 0;
    let mut lat = f64::NAN;
    let mut lon = f64::NAN;

    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"id" => id = from_utf8(&attr.value).ok()?.parse().ok()?,
            b"lat" => lat = from_utf8(&attr.value).ok()?.parse().ok()?,
            b"lon" => lon = from_utf8(&attr.value).ok()?.parse().ok()?,
            _ => {}
        }
    }

    if id != 0 && lat.is_finite() && lon.is_finite() {
        Some(Node {
            id,
            lat,
            lon,
            tags: Vec::default(),
        })
    } else {
        log::warn!("skipping node with invalid attributes (id={})", id);
        None
    }
}

fn parse_way(start: &BytesStart<'_>) -> Option<Way> {
    for attr in start.attributes() {
        let attr = attr.ok()?;
        if attr.key.as_ref() == b"id" {
            let id: i64 = from_utf8(&attr.value).ok()?.parse().ok()?;
            return Some(Way {
                id,
                ..Default::default()
            });
        }
    }
    None
}

fn parse_tag(start: &BytesStart<'_>) -> Option<(String, String)> {
    let mut k = None;
    let mut v = None;
    for attr in start.attributes() {
        let attr = attr.ok()?;
        match attr.key.as_ref() {
            b"k" => k = Some(attr.unescape_value().ok()?.into_owned()),
            b"v" => v = Some(attr.unescape_value().ok()?.into_owned()),
            _ => {}
        }
    }
    Some((k?, v?))
}

fn parse_nd(start: &BytesStart<'_>) -> Option<i64> {
    for attr in start.attributes() {
        let attr = attr.ok()?;
        if attr.key.as_ref() == b"ref" {
            return from_utf8(&attr.value).ok()?.parse().ok();
        }
    }
    None
}

/// Turns every way with a `highway` tag into a [Road] sharing a single [RoutingRegion].
///
/// Node tags become point types of the roads. If every node of a way has an `ele` tag,
/// the road gets elevation data.
fn build_network(nodes: HashMap<i64, Node>, ways: Vec<Way>) -> RoadNetwork {
    let mut region = RoutingRegion::new("osm");

    struct Pending {
        id: i64,
        points: Vec<Point31>,
        types: Vec<u32>,
        point_types: Vec<Vec<u32>>,
        heights: Option<Vec<f64>>,
    }

    let mut pending = Vec::default();
    for way in ways {
        if !way.tags.iter().any(|(k, _)| k == "highway") {
            continue;
        }

        let way_nodes: Vec<&Node> = way.nodes.iter().filter_map(|id| nodes.get(id)).collect();
        if way_nodes.len() != way.nodes.len() {
            log::warn!("way {} references unknown nodes - skipping", way.id);
            continue;
        }
        if way_nodes.len() < 2 {
            continue;
        }

        let heights: Option<Vec<f64>> = way_nodes
            .iter()
            .map(|n| {
                n.tags
                    .iter()
                    .find(|(k, _)| k == "ele")
                    .and_then(|(_, v)| v.trim().parse().ok())
            })
            .collect();

        pending.push(Pending {
            id: way.id,
            points: way_nodes
                .iter()
                .map(|n| Point31::from_lat_lon(n.lat, n.lon))
                .collect(),
            types: way.tags.iter().map(|(k, v)| region.encode(k, v)).collect(),
            point_types: way_nodes
                .iter()
                .map(|n| {
                    n.tags
                        .iter()
                        .filter(|(k, _)| k != "ele")
                        .map(|(k, v)| region.encode(k, v))
                        .collect()
                })
                .collect(),
            heights,
        });
    }

    let region = Arc::new(region);
    let roads = pending.into_iter().map(|p| {
        let mut road = Road::new(p.id, region.clone(), p.points, p.types);
        road.point_types = p.point_types;
        road.heights = p.heights;
        Arc::new(road)
    });

    let network = RoadNetwork::from_roads(roads);
    log::debug!("loaded {} road(s) from OSM data", network.len());
    return network;
}

/// Loads a [RoadNetwork] from an OSM XML stream.
///
/// The provided stream will be automatically wrapped in a buffered reader.
pub fn load_network_from_io<R: io::Read>(reader: R, format: FileFormat) -> Result<RoadNetwork, Error> {
    let (nodes, ways) = read_features(IoParser::new(buffered(reader, format)))?;
    Ok(build_network(nodes, ways))
}

/// Loads a [RoadNetwork] from an OSM XML file at the provided path.
pub fn load_network_from_file<P: AsRef<Path>>(path: P, format: FileFormat) -> Result<RoadNetwork, Error> {
    let f = File::open(path)?;
    load_network_from_io(f, format)
}

/// Loads a [RoadNetwork] from a static buffer.
pub fn load_network_from_buffer(data: &[u8], format: FileFormat) -> Result<RoadNetwork, Error> {
    if format == FileFormat::Xml {
        // Fast path is available for in-memory XML data
        let (nodes, ways) = read_features(BufParser::new(data))?;
        Ok(build_network(nodes, ways))
    } else {
        load_network_from_io(io::Cursor::new(data), format)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::network::RoadSource;

    const SIMPLE_OSM: &[u8] = include_bytes!("test_fixtures/simple.osm");

    #[test]
    fn load_simple() {
        let n = load_network_from_buffer(SIMPLE_OSM, FileFormat::Xml).unwrap();
        // building and the unfinished way are skipped
        assert_eq!(n.len(), 5);

        let primary = n.road(100).unwrap();
        assert_eq!(primary.highway(), "primary");
        assert_eq!(primary.len(), 3);
        assert_eq!(primary.point_types(0).len(), 0);
        assert_eq!(primary.point_types(1).len(), 1);
        assert_eq!(
            primary.region.decode(primary.point_types(1)[0]).map(|tv| tv.to_string()),
            Some("highway=traffic_signals".to_string()),
        );
        assert!(primary.heights.is_none());

        let residential = n.road(101).unwrap();
        assert_eq!(residential.heights, Some(vec![110.0, 104.0]));
        assert_eq!(residential.tag_value("name"), Some("Ogrodowa & Polna"));

        let junction = n.roads_at(primary.points[1]);
        assert_eq!(junction.len(), 3);
    }

    #[test]
    fn load_compressed() {
        let mut e = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        e.write_all(SIMPLE_OSM).unwrap();
        let data = e.finish().unwrap();

        let n = load_network_from_buffer(&data, FileFormat::XmlGz).unwrap();
        assert_eq!(n.len(), 5);
    }

    #[test]
    fn malformed() {
        let err = load_network_from_buffer(b"<osm><way id=\"1\"></node></osm>", FileFormat::Xml)
            .unwrap_err();
        assert!(matches!(err, Error::Xml(_)));
    }
}
