//! CLI front-end: load a decoding-graph + dense-emission fixture from JSON,
//! run [`densefsa_intersect::intersect_dense_pruned`], and print the
//! resulting lattice's arc count and best-path score. A thin demonstration
//! surface, not a production decoding pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Deserialize;
use tracing::error;

use densefsa_intersect::{Arc, Context, DecodeConfig, DenseFsaVec, FsaVec};

#[derive(Parser, Debug)]
#[command(name = "densefsa-intersect", about = "Pruned dense-graph intersection for speech decoding")]
struct Cli {
    /// Path to a JSON fixture (see `ArcFixture` for the shape).
    fixture: PathBuf,

    /// Override the default search beam.
    #[arg(long)]
    search_beam: Option<f32>,

    /// Override the default output beam.
    #[arg(long)]
    output_beam: Option<f32>,

    /// Run kernels on a rayon thread pool instead of serially.
    #[arg(long)]
    parallel: bool,
}

#[derive(Debug, Deserialize)]
struct ArcFixture {
    src_state: u32,
    dest_state: u32,
    label: i32,
    score: f32,
}

#[derive(Debug, Deserialize)]
struct GraphFixture {
    states_per_fsa: Vec<u32>,
    arcs_per_state: Vec<u32>,
    arcs: Vec<ArcFixture>,
}

#[derive(Debug, Deserialize)]
struct DenseFixture {
    frames_per_seq: Vec<u32>,
    columns: usize,
    scores: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    graph: GraphFixture,
    dense: DenseFixture,
    #[serde(default)]
    config: Option<DecodeConfig>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let text = match std::fs::read_to_string(&cli.fixture) {
        Ok(t) => t,
        Err(e) => {
            error!(path = %cli.fixture.display(), %e, "failed to read fixture");
            return ExitCode::FAILURE;
        }
    };
    let fixture: Fixture = match serde_json::from_str(&text) {
        Ok(f) => f,
        Err(e) => {
            error!(%e, "failed to parse fixture JSON");
            return ExitCode::FAILURE;
        }
    };

    let arcs = fixture
        .graph
        .arcs
        .into_iter()
        .map(|a| Arc {
            src_state: a.src_state,
            dest_state: a.dest_state,
            label: a.label,
            score: a.score,
        })
        .collect();
    let a_fsas = FsaVec::from_counts(&fixture.graph.states_per_fsa, &fixture.graph.arcs_per_state, arcs);
    let b_fsas = DenseFsaVec::new(&fixture.dense.frames_per_seq, fixture.dense.columns, fixture.dense.scores);

    let mut config = fixture.config.unwrap_or_default();
    if let Some(b) = cli.search_beam {
        config.search_beam = b;
    }
    if let Some(b) = cli.output_beam {
        config.output_beam = b;
    }
    let ctx = if cli.parallel { Context::Parallel } else { Context::Serial };

    match densefsa_intersect::intersect_dense_pruned(&a_fsas, &b_fsas, &config, ctx) {
        Ok((lattice, arc_map_a, arc_map_b)) => {
            println!("output arcs: {}", lattice.arcs.values.len());
            let best = lattice
                .arcs
                .values
                .iter()
                .map(|a| a.score)
                .fold(f32::NEG_INFINITY, f32::max);
            println!("best arc score seen: {best}");
            println!("arc_map_a entries: {}, arc_map_b entries: {}", arc_map_a.len(), arc_map_b.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(%e, "intersection failed");
            ExitCode::FAILURE
        }
    }
}
