// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Rule-driven routing over [OpenStreetMap](https://www.openstreetmap.org/) data.
//!
//! Roads are described by raw tags, interpreted by a [GeneralRouter] built from
//! a `routing.xml` profile. The router decides which roads may be used, how fast and
//! in which direction, and how much time is lost at obstacles and turns.
//! The [planner] runs A* over road points with such a router, and turns the outcome
//! into [RouteSegments](planner::RouteSegment) with turn-by-turn instructions.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! let network = roadrules::network::osm::load_network_from_file(
//!     "path/to/monaco.osm.gz",
//!     roadrules::FileFormat::XmlGz,
//! ).expect("failed to load monaco.osm.gz");
//!
//! let builder = roadrules::config::parse_routing_configuration_from_file(
//!     "path/to/routing.xml",
//!     roadrules::FileFormat::Xml,
//! ).expect("failed to load routing.xml");
//! let config = builder.build("car", &HashMap::default());
//!
//! let mut planner = roadrules::planner::RoutePlanner::new(&network, config);
//! let result = planner.route(43.7384, 7.4246, 43.7478, 7.4323);
//! match result.error() {
//!     None => {
//!         for s in result.segments() {
//!             println!("{}", s.description);
//!         }
//!     }
//!     Some(e) => eprintln!("failed to find route: {}", e),
//! }
//! ```

pub mod config;
mod distance;
mod format;
pub mod network;
pub mod planner;
pub mod road;
pub mod router;

#[cfg(test)]
mod testing;

pub use distance::{
    align_angle_difference, degrees_diff, earth_distance, normalized_angle_degrees,
};
pub use format::FileFormat;
pub use road::{Point31, Road, RoadDirection, RoutingRegion, TagValue};
pub use router::{GeneralRouter, GeneralRouterProfile};
