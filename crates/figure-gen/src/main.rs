//! figure-gen: renders the three study figures from precomputed CSV tables.
//!
//! Reads the fixed inputs under `data/` and writes a vector (SVG) and
//! raster (PNG) copy of each figure under `figures/`:
//!
//!   data/covid1-trend.csv      => figures/covid1-trend.{svg,png}
//!   data/covid1-effect-rd.csv  => figures/covid1-effect-rd.{svg,png}
//!   data/covid1-effect-did.csv => figures/covid1-effect-did.{svg,png}
//!
//! Takes no arguments; exits non-zero on the first failure.

mod charts;

use std::path::Path;

const TREND_INPUT: &str = "data/covid1-trend.csv";
const RD_INPUT: &str = "data/covid1-effect-rd.csv";
const DID_INPUT: &str = "data/covid1-effect-did.csv";

const TREND_OUTPUT: &str = "figures/covid1-trend";
const RD_OUTPUT: &str = "figures/covid1-effect-rd";
const DID_OUTPUT: &str = "figures/covid1-effect-did";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "figure_gen=info,event_study=info".into()),
        )
        .init();

    std::fs::create_dir_all("figures")?;

    let trend = charts::trend::render(Path::new(TREND_INPUT), Path::new(TREND_OUTPUT))?;
    println!("{}", trend.display());

    let rd = charts::rd::render(Path::new(RD_INPUT), Path::new(RD_OUTPUT))?;
    println!("{}", rd.display());

    let did = charts::did::render(Path::new(DID_INPUT), Path::new(DID_OUTPUT))?;
    println!("{}", did.display());

    Ok(())
}
