use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pathflow::flow::{
    convert_forwarding_to_flow, link_utilization, worst_case_delay_and_length, xde_to_paths,
    ForwardingRules,
};
use pathflow::model::{GraphModel, Network, Path};
use pathflow::route_compute::{
    compute_paths, disjoint_path_pair, DisjointKind, PathAlgorithm, PathRequest,
};
use pathflow::runtime::{load_engine_config, load_topology, EngineConfig, Stopwatch, Topology};
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pathflow")]
#[command(about = "Compute paths and convert routing representations over a topology")]
struct Args {
    #[arg(long)]
    topology: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "INFO")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one path algorithm between two named nodes.
    Paths {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        algorithm: Option<String>,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Cheapest pair of disjoint paths between two named nodes.
    Disjoint {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        /// `link(s)` or `node(s)`; defaults to the configured kind.
        #[arg(long)]
        kind: Option<String>,
    },
    /// Turn the topology's forwarding rules into link flows and paths.
    Flows,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let cfg = match args.config.as_ref() {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    };
    let mut watch = Stopwatch::start();
    let topology = load_topology(&args.topology)?;
    watch.lap("load");
    info!(
        "loaded topology with {} nodes, {} links, {} demands",
        topology.network.node_count(),
        topology.network.link_count(),
        topology.demands.len()
    );

    let mut report = match &args.command {
        Command::Paths {
            origin,
            destination,
            algorithm,
            k,
        } => run_paths(
            &topology,
            &cfg,
            &mut watch,
            origin,
            destination,
            algorithm.as_deref(),
            *k,
        )?,
        Command::Disjoint {
            origin,
            destination,
            kind,
        } => run_disjoint(&topology, &cfg, &mut watch, origin, destination, kind.as_deref())?,
        Command::Flows => run_flows(&topology, &cfg, &mut watch)?,
    };

    if let Value::Object(map) = &mut report {
        map.insert("runtime_ms".to_string(), watch.to_json_ms());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}

fn path_json(network: &Network, path: &Path) -> Value {
    let names: Vec<&str> = path
        .nodes()
        .iter()
        .filter_map(|node| network.node(*node).map(|n| n.name.as_str()))
        .collect();
    json!({
        "nodes": names,
        "links": path.links(),
        "cost": path.cost(),
        "hops": path.hop_count(),
        "length_km": path.length_km(network),
        "delay_ms": path.delay_ms(network),
    })
}

fn run_paths(
    topology: &Topology,
    cfg: &EngineConfig,
    watch: &mut Stopwatch,
    origin: &str,
    destination: &str,
    algorithm: Option<&str>,
    k: Option<usize>,
) -> Result<Value> {
    let algorithm = match algorithm {
        Some(name) => name.parse::<PathAlgorithm>()?,
        None => cfg.algorithm,
    };
    let mut request = PathRequest::new(
        topology.node_named(origin)?,
        topology.node_named(destination)?,
    );
    request.k = k.unwrap_or(cfg.ksp.k);
    request.constraints = cfg.ksp.constraints;

    let graph = GraphModel::new(&topology.network).with_metric(cfg.cost)?;
    let paths = watch.time("compute", || compute_paths(&graph, algorithm, &request))?;
    info!("{algorithm} found {} paths", paths.len());

    Ok(json!({
        "algorithm": algorithm.name(),
        "origin": origin,
        "destination": destination,
        "paths": paths.iter().map(|p| path_json(&topology.network, p)).collect::<Vec<_>>(),
    }))
}

fn run_disjoint(
    topology: &Topology,
    cfg: &EngineConfig,
    watch: &mut Stopwatch,
    origin: &str,
    destination: &str,
    kind: Option<&str>,
) -> Result<Value> {
    let kind = match kind {
        Some(name) => name.parse::<DisjointKind>()?,
        None => cfg.disjoint,
    };
    let origin_id = topology.node_named(origin)?;
    let destination_id = topology.node_named(destination)?;

    let graph = GraphModel::new(&topology.network).with_metric(cfg.cost)?;
    let paths = watch.time("compute", || {
        disjoint_path_pair(&graph, origin_id, destination_id, kind)
    })?;

    Ok(json!({
        "kind": kind,
        "origin": origin,
        "destination": destination,
        "paths": paths.iter().map(|p| path_json(&topology.network, p)).collect::<Vec<_>>(),
    }))
}

fn run_flows(topology: &Topology, cfg: &EngineConfig, watch: &mut Stopwatch) -> Result<Value> {
    let Some(f_te) = topology.forwarding.clone() else {
        bail!("topology has no forwarding section");
    };
    let network = &topology.network;

    let conversion = watch.time("convert", || {
        convert_forwarding_to_flow(
            network,
            &topology.demands,
            &ForwardingRules::PerDestination(f_te.clone()),
            cfg.precision,
        )
    })?;
    let decompositions = watch.time("decompose", || {
        xde_to_paths(network, &topology.demands, &conversion.x_de, cfg.precision)
    })?;
    let utilization = link_utilization(network, &conversion.x_de)?;
    watch.lap("utilization");

    let mut demands = Vec::with_capacity(topology.demands.len());
    for (demand, decomposition) in topology.demands.iter().zip(&decompositions) {
        let worst = worst_case_delay_and_length(
            network,
            f_te.row(demand.egress),
            demand.ingress,
            demand.egress,
        )
        .with_context(|| format!("worst case for demand {}", demand.index))?;
        let routes: Vec<Value> = decomposition
            .routes
            .iter()
            .map(|route| {
                json!({
                    "volume": route.volume,
                    "path": path_json(network, &route.path),
                })
            })
            .collect();
        demands.push(json!({
            "index": demand.index,
            "classification": conversion.classification[demand.index],
            "absorbed_fraction": conversion.absorbed_fraction[demand.index],
            "routes": routes,
            "unrouted": decomposition.unrouted,
            // infinite values serialize as null
            "worst_case_delay_ms": worst.delay_ms,
            "worst_case_length_km": worst.length_km,
        }));
    }
    info!(
        "converted {} demands, {} in closed cycles",
        demands.len(),
        conversion.closed_cycle_demands().len()
    );

    Ok(json!({
        "all_loopless": conversion.all_loopless(),
        "demands": demands,
        "link_utilization": utilization,
        "x_te": conversion.x_te.to_rows(),
    }))
}
