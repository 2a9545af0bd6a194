use std::io::BufWriter;
use std::path::PathBuf;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::adapters::carthagene::{CarthaGene, CarthaGeneDriver, DriverConfig};
use crate::adapters::Adapter;
use crate::args::{AliasArgs, EngineArgs, OutputArgs};
use crate::engine::ProcessEngine;
use crate::io::{get_output, push_to_output};
use crate::linkage::write_maps_tsv;
use crate::segregation::SymbolAliases;
use crate::subcommands::encode::read_table;

#[doc(hidden)]
pub fn run(file: PathBuf, engine: EngineArgs, aliases: AliasArgs, config: DriverConfig, out: OutputArgs) -> Result<()> {
    let aliases = aliases.resolve(SymbolAliases::default())?;
    let table = read_table(&file, &aliases)?;

    let engine_config = engine.engine_config()?;
    tracing::info!("Using the engine {}", engine_config.program);
    let process = ProcessEngine::new(engine_config);
    let scratch = engine.scratch(out.prefix.clone());

    let adapter = CarthaGene {
        aliases: aliases.clone(),
        individuals: table.offspring.clone(),
    };
    let matrices = adapter.encode(&table)?;
    let driver = CarthaGeneDriver::new(config, aliases);

    for matrix in matrices.iter() {
        let parent = matrix.parent.to_string();
        let result = driver
            .run(&process, matrix, &scratch)
            .wrap_err(eyre!("Failed to map the loci of {parent}"))?;

        let mut output = out.output.clone();
        push_to_output(&out.prefix, &mut output, &format!("{parent}_markers"), "tsv");
        result.markers.write_tsv(BufWriter::new(get_output(Some(output))?))?;

        let mut output = out.output.clone();
        push_to_output(&out.prefix, &mut output, &format!("{parent}_groups"), "tsv");
        result.groups.write_tsv(BufWriter::new(get_output(Some(output))?))?;

        let mut output = out.output.clone();
        push_to_output(&out.prefix, &mut output, &format!("{parent}_map"), "tsv");
        write_maps_tsv(&result.maps, BufWriter::new(get_output(Some(output))?))?;

        tracing::info!(
            "{parent}: {} maps, {:.1} cM in total",
            result.maps.len(),
            result.maps.values().map(|m| m.length()).sum::<f64>()
        );
    }

    Ok(())
}
