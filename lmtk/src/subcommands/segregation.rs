use std::io::BufWriter;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::args::{AliasArgs, GenotypeArgs, OutputArgs};
use crate::genotype::read_genotype_table;
use crate::io::{get_output, push_to_output, read_ids};
use crate::segregation::{encode, write_joinmap, SymbolAliases};
use crate::utils::strip_prefix;

#[doc(hidden)]
pub fn run(args: GenotypeArgs, aliases: AliasArgs, out: OutputArgs) -> Result<()> {
    let matrix = read_genotype_table(args.file.clone())
        .wrap_err(eyre!("Failed to read the genotype table {:?}", args.file))?;
    tracing::info!(
        "Read {} loci of {} individuals",
        matrix.nloci(),
        matrix.nindividuals()
    );

    let matrix = match &args.offspring {
        Some(path) => {
            let mut ids = args.parents.clone();
            ids.extend(read_ids(path)?.into_iter().filter(|id| !args.parents.contains(id)));
            matrix.select_individuals(&ids)?
        }
        None => matrix,
    };

    let matrix = match &args.loci {
        Some(path) => matrix.select_loci(&read_ids(path)?)?,
        None => matrix,
    };

    let matrix = match args.sort {
        true => matrix.sorted_by_position(),
        false => matrix,
    };

    let aliases = aliases.resolve(SymbolAliases::default())?;
    let mut table = encode(&matrix, &args.parents, &aliases)?;
    if let Some(name) = strip_prefix(out.prefix.clone()) {
        table.name = name;
    }

    for (seg_type, count) in table.type_counts() {
        tracing::info!("<{seg_type}>: {count} loci");
    }

    let mut output = out.output.clone();
    push_to_output(&out.prefix, &mut output, "segregation", "loc");
    write_joinmap(&table, BufWriter::new(get_output(Some(output.clone()))?))
        .wrap_err(eyre!("Failed to write {output:?}"))?;

    let mut output = out.output.clone();
    push_to_output(&out.prefix, &mut output, "encoder_summary", "json");
    serde_json::to_writer_pretty(get_output(Some(output))?, &table.summary)?;

    Ok(())
}
