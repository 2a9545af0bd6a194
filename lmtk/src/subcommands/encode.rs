use std::io::BufWriter;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{ensure, eyre, WrapErr};
use color_eyre::Result;

use crate::adapters::asmap::{mstmap_aliases, Asmap};
use crate::adapters::backcross::{Backcross, BackcrossOptions};
use crate::adapters::carthagene::CarthaGene;
use crate::adapters::Adapter;
use crate::args::{AliasArgs, OutputArgs, Tool};
use crate::io::{get_buffered_input, get_output, push_to_output};
use crate::segregation::{read_joinmap, SegregationTable, SymbolAliases};

/// Read a segregation table written by the `segregation` command
///
/// Parent ids and the missing symbol recorded in the file header win over
/// the defaults passed here.
pub fn read_table(path: &Path, aliases: &SymbolAliases) -> Result<SegregationTable> {
    let input = get_buffered_input(Some(path.to_path_buf()))?;
    let table = read_joinmap(input, [String::from("P1"), String::from("P2")], aliases)
        .wrap_err(eyre!("Failed to read the segregation table {path:?}"))?;
    tracing::info!(
        "Read {} loci of {} offspring from {path:?}",
        table.calls.len(),
        table.offspring.len()
    );
    Ok(table)
}

pub fn write_parents<A: Adapter>(adapter: &A, table: &SegregationTable, out: &OutputArgs) -> Result<()> {
    let matrices = adapter.encode(table)?;
    for matrix in matrices.iter() {
        let mut output = out.output.clone();
        push_to_output(&out.prefix, &mut output, &matrix.parent.to_string(), adapter.suffix());
        adapter
            .write(matrix, BufWriter::new(get_output(Some(output.clone()))?))
            .wrap_err(eyre!("Failed to write {output:?}"))?;
        tracing::info!(
            "Wrote {} loci of {} to {output:?} for {}",
            matrix.nloci(),
            matrix.parent,
            adapter.name()
        );
    }
    Ok(())
}

#[doc(hidden)]
pub fn run(
    file: PathBuf,
    tool: Tool,
    aliases: AliasArgs,
    options: BackcrossOptions,
    maf: f64,
    out: OutputArgs,
) -> Result<()> {
    ensure!((0.0..=0.5).contains(&maf), "MAF threshold has to be between 0 and 0.5");

    let resolved = aliases.resolve(SymbolAliases::default())?;
    let table = read_table(&file, &resolved)?;

    match tool {
        Tool::Backcross => write_parents(&Backcross { aliases: resolved, options }, &table, &out)?,
        Tool::Carthagene => {
            let adapter = CarthaGene {
                aliases: resolved,
                individuals: table.offspring.clone(),
            };
            write_parents(&adapter, &table, &out)?
        }
        Tool::Asmap => {
            let adapter = Asmap {
                aliases: aliases.resolve(mstmap_aliases())?,
                maf,
                ..Default::default()
            };
            write_parents(&adapter, &table, &out)?
        }
    }

    Ok(())
}
