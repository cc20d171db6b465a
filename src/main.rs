// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use roadrules::config::{self, RoutingConfigurationBuilder};
use roadrules::network::{self, RoadNetwork};
use roadrules::planner::RoutePlanner;
use roadrules::FileFormat;

#[derive(Debug, thiserror::Error)]
#[error("{0}: {1}")]
struct NetworkLoadError(PathBuf, #[source] network::osm::Error);

#[derive(Debug, thiserror::Error)]
#[error("{0}: {1}")]
struct ConfigLoadError(PathBuf, #[source] config::Error);

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct RouteCalculationError(String);

#[derive(Parser)]
struct Cli {
    /// The path to the OSM file (.osm, .osm.gz or .osm.bz2)
    osm_file: PathBuf,

    /// The path to the routing.xml file
    routing_xml: PathBuf,

    /// Latitude of the start point
    start_lat: f64,

    /// Longitude of the start point
    start_lon: f64,

    /// Latitude of the end point
    end_lat: f64,

    /// Longitude of the end point
    end_lon: f64,

    /// Name of the routing profile, defaults to the profile marked as default in routing.xml
    #[arg(short, long)]
    profile: Option<String>,

    /// Routing parameters, as name=value or just name for boolean parameters
    #[arg(short = 'P', long = "param")]
    params: Vec<String>,

    /// Reject routes which are not fully connected
    #[arg(long)]
    strict: bool,

    /// Use left-hand traffic for turn instructions
    #[arg(long)]
    left_side: bool,

    /// Log all rules of the selected router
    #[arg(long)]
    print_rules: bool,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    colog::init();
    let cli = Cli::parse();

    let network = load_network(&cli.osm_file)?;
    let builder = load_config(&cli.routing_xml)?;

    let profile = cli.profile.as_deref().unwrap_or(&builder.default_router);
    let config = builder.build(profile, &parse_params(&cli.params));
    if cli.print_rules {
        config.router.print_rules();
    }

    let mut planner = RoutePlanner::new(&network, config);
    planner.strict_validation = cli.strict;
    planner.turns.left_side_navigation = cli.left_side;

    let result = planner.route(cli.start_lat, cli.start_lon, cli.end_lat, cli.end_lon);
    if let Some(e) = result.error() {
        return Err(Box::new(RouteCalculationError(e.to_string())));
    }

    for s in result.segments() {
        let turn = s.turn.as_ref().map(|t| t.turn_type.short_name()).unwrap_or("");
        println!(
            "{:>12} {:>4} -> {:<4} {:>3} {:>9.2} m {:>8.2} s  {}",
            s.road_id(),
            s.start,
            s.end,
            turn,
            s.distance,
            s.time,
            s.description,
        );
    }
    println!(
        "Total: {:.2} m, {:.2} s",
        result.complete_distance(),
        result.complete_time()
    );

    Ok(())
}

fn parse_params(params: &[String]) -> HashMap<String, String> {
    params
        .iter()
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (p.clone(), "true".to_string()),
        })
        .collect()
}

fn load_network<P: AsRef<Path>>(path: P) -> Result<RoadNetwork, NetworkLoadError> {
    let format = FileFormat::from_file_name(&path.as_ref().to_string_lossy());
    match network::osm::load_network_from_file(path.as_ref(), format) {
        Ok(n) => Ok(n),
        Err(e) => Err(NetworkLoadError(PathBuf::from(path.as_ref()), e)),
    }
}

fn load_config<P: AsRef<Path>>(path: P) -> Result<RoutingConfigurationBuilder, ConfigLoadError> {
    let format = FileFormat::from_file_name(&path.as_ref().to_string_lossy());
    match config::parse_routing_configuration_from_file(path.as_ref(), format) {
        Ok(b) => Ok(b),
        Err(e) => Err(ConfigLoadError(PathBuf::from(path.as_ref()), e)),
    }
}
