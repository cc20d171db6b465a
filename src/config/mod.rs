// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Loading of routing profiles from `routing.xml` files.
//!
//! # Example
//!
//! ```no_run
//! let builder = roadrules::config::parse_routing_configuration_from_file(
//!     "path/to/routing.xml",
//!     roadrules::FileFormat::Xml,
//! ).expect("failed to load routing.xml");
//!
//! let config = builder.build("car", &std::collections::HashMap::default());
//! println!("Using {} router", config.router_name);
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::format::{buffered, BufParser, FileFormat, IoParser};
use crate::road::Point31;
use crate::router::GeneralRouter;

pub mod ast;
mod compile;
mod xml;

/// Default limit of memory used for loading road data, in megabytes.
pub const DEFAULT_MEMORY_LIMIT: usize = 100;

/// Error conditions which may occur when loading a routing configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("unknown route attribute: {0:?}")]
    UnknownAttribute(String),

    #[error("<{0}> outside of a <routingProfile>")]
    MisplacedElement(&'static str),

    #[error("invalid parameter type: {0:?}")]
    InvalidParameterType(String),
}

/// Settings of a single route calculation, with a [GeneralRouter]
/// built for the requested profile and parameters.
#[derive(Debug, Clone)]
pub struct RoutingConfiguration {
    pub attributes: HashMap<String, String>,
    pub router: GeneralRouter,
    pub router_name: String,

    /// Memory limit for loading road data, in megabytes.
    pub memory_limitation: usize,

    /// Initial heading of the vehicle (in degrees), if known.
    pub initial_direction: Option<f64>,

    /// Zoom level of tiles with road data.
    pub zoom_to_load: u32,

    /// Multiplier of the A* heuristic.
    pub heuristic_coefficient: f64,

    pub plan_road_direction: i32,

    /// Distance (in meters) used to help route recalculation.
    pub recalculate_distance: f64,
}

impl Default for RoutingConfiguration {
    fn default() -> Self {
        Self {
            attributes: HashMap::default(),
            router: GeneralRouter::default(),
            router_name: String::default(),
            memory_limitation: DEFAULT_MEMORY_LIMIT,
            initial_direction: None,
            zoom_to_load: 16,
            heuristic_coefficient: 1.0,
            plan_road_direction: 0,
            recalculate_distance: 20000.0,
        }
    }
}

impl RoutingConfiguration {
    /// Returns an attribute of the router, falling back to configuration-level attributes.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.router
            .attribute(name)
            .or_else(|| self.attributes.get(name).map(|v| v.as_str()))
    }

    fn float_attribute(&self, name: &str, default: f64) -> f64 {
        self.attribute(name)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn init_params(&mut self) {
        self.plan_road_direction = self.float_attribute("planRoadDirection", 0.0) as i32;
        self.heuristic_coefficient = self.float_attribute("heuristicCoefficient", 1.0);
        self.recalculate_distance = self.float_attribute("recalculateDistanceHelp", 20000.0);
        self.memory_limitation =
            self.float_attribute("nativeMemoryLimitInMB", self.memory_limitation as f64) as usize;
        self.zoom_to_load = self.float_attribute("zoomToLoadTiles", 16.0) as u32;
    }
}

/// Set of named routers loaded from a routing configuration file,
/// used to create [RoutingConfigurations](RoutingConfiguration).
#[derive(Debug, Clone, Default)]
pub struct RoutingConfigurationBuilder {
    routers: HashMap<String, GeneralRouter>,
    attributes: HashMap<String, String>,
    impassable_roads: HashMap<i64, Point31>,
    pub default_router: String,
}

impl RoutingConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [RoutingConfiguration] for the provided router and parameters.
    ///
    /// Falls back to the [default router](Self::default_router) if `router_name` is unknown,
    /// and to a router without any rules if the default router is unknown as well.
    pub fn build(&self, router_name: &str, params: &HashMap<String, String>) -> RoutingConfiguration {
        let name = if self.routers.contains_key(router_name) {
            router_name
        } else {
            self.default_router.as_str()
        };

        let mut config = RoutingConfiguration::default();
        if let Some(router) = self.routers.get(name) {
            config.router = router.build(params);
            config.router_name = name.to_string();
        } else {
            log::warn!("no router named {:?} - using a router without rules", name);
        }

        config.attributes = self.attributes.clone();
        config
            .attributes
            .insert("routerName".to_string(), name.to_string());
        config.init_params();

        for &id in self.impassable_roads.keys() {
            config.router.add_impassable_road(id);
        }

        return config;
    }

    pub fn add_router<S: Into<String>>(&mut self, name: S, router: GeneralRouter) {
        self.routers.insert(name.into(), router);
    }

    pub fn router(&self, name: &str) -> Option<&GeneralRouter> {
        self.routers.get(name)
    }

    pub fn router_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.routers.keys().map(|k| k.as_str())
    }

    pub fn add_attribute<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.as_str())
    }

    /// Marks a road as impassable. Returns `false` if the road was already marked.
    pub fn add_impassable_road(&mut self, road_id: i64, location: Point31) -> bool {
        if self.impassable_roads.contains_key(&road_id) {
            return false;
        }
        self.impassable_roads.insert(road_id, location);
        true
    }

    pub fn remove_impassable_road(&mut self, road_id: i64) {
        self.impassable_roads.remove(&road_id);
    }

    pub fn impassable_roads(&self) -> &HashMap<i64, Point31> {
        &self.impassable_roads
    }

    fn from_document(doc: ast::Document) -> Self {
        let mut builder = Self {
            default_router: doc.default_profile,
            ..Default::default()
        };
        for (k, v) in doc.attributes {
            builder.add_attribute(k, v);
        }
        for profile in &doc.profiles {
            let router = compile::compile_profile(profile);
            log::debug!(
                "loaded routing profile {:?} ({:?}) with {} parameter(s)",
                profile.name,
                router.profile(),
                profile.parameters.len(),
            );
            builder.add_router(profile.name.clone(), router);
        }
        builder
    }
}

/// Parses a routing configuration from a stream.
///
/// The provided stream will be automatically wrapped in a buffered reader.
pub fn parse_routing_configuration_from_io<R: io::Read>(
    reader: R,
    format: FileFormat,
) -> Result<RoutingConfigurationBuilder, Error> {
    let parser = IoParser::new(buffered(reader, format));
    let doc = xml::read_document(parser)?;
    Ok(RoutingConfigurationBuilder::from_document(doc))
}

/// Parses a routing configuration from a file at the provided path.
pub fn parse_routing_configuration_from_file<P: AsRef<Path>>(
    path: P,
    format: FileFormat,
) -> Result<RoutingConfigurationBuilder, Error> {
    let f = File::open(path)?;
    parse_routing_configuration_from_io(f, format)
}

/// Parses a routing configuration from a static buffer.
pub fn parse_routing_configuration_from_buffer(
    data: &[u8],
    format: FileFormat,
) -> Result<RoutingConfigurationBuilder, Error> {
    if format == FileFormat::Xml {
        // Fast path is available for in-memory XML data
        let doc = xml::read_document(BufParser::new(data))?;
        Ok(RoutingConfigurationBuilder::from_document(doc))
    } else {
        parse_routing_configuration_from_io(io::Cursor::new(data), format)
    }
}
