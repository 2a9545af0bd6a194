use std::io::{BufRead, Write};

use itertools::Itertools;
use ndarray::Array2;

use crate::adapters::{Adapter, Call, CallMatrix, ParentMatrices};
use crate::error::{Error, Result};
use crate::genotype::Locus;
use crate::io::{get_csv_reader, get_csv_writer};
use crate::segregation::{Inheritance, Parent, PhaseBit, SegregationTable, SegregationType, SymbolAliases};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct BackcrossOptions {
    /// Keep hkxhk loci, heterozygous offspring are coded as duplicates
    #[cfg_attr(feature = "clap", arg(long))]
    pub include_hkxhk: bool,

    /// Swap the calls of loci in repulsion phase for the parent
    #[cfg_attr(feature = "clap", arg(long))]
    pub apply_phase: bool,
}

fn informative(seg_type: SegregationType, parent: Parent, options: &BackcrossOptions) -> bool {
    match seg_type {
        SegregationType::Hkxhk => options.include_hkxhk,
        t => t.segregates_in(parent),
    }
}

/// Reduce the loci segregating in `parent` to backcross calls of the offspring
pub fn pseudo_testcross(table: &SegregationTable, parent: Parent, options: &BackcrossOptions) -> Result<CallMatrix> {
    let calls: Vec<_> = table
        .calls
        .iter()
        .filter(|c| informative(c.seg_type, parent, options))
        .collect();

    let mut matrix = Array2::from_elem((calls.len(), table.offspring.len()), Call::Missing);

    for (row, call) in calls.iter().enumerate() {
        let swap = options.apply_phase
            && call.phase.is_some_and(|p| {
                let bit = match parent {
                    Parent::P1 => p.p1,
                    Parent::P2 => p.p2,
                };
                bit == PhaseBit::Repulsion
            });

        for idx in 0..table.offspring.len() {
            matrix[[row, idx]] = match (call.inherited(idx, parent), swap) {
                (Inheritance::First, false) | (Inheritance::Second, true) => Call::Homozygous,
                (Inheritance::Second, false) | (Inheritance::First, true) => Call::Heterozygous,
                (Inheritance::Either, _) => Call::Duplicate,
                (Inheritance::Unknown, _) => Call::Missing,
            };
        }
    }

    tracing::info!(
        "{parent}: {} of {} loci kept for the pseudo-testcross",
        calls.len(),
        table.calls.len()
    );

    CallMatrix::new(
        parent,
        calls.iter().map(|c| c.locus.clone()).collect(),
        table.offspring.clone(),
        matrix,
    )
}

/// R/qtl style "csvr" tables, one row per locus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backcross {
    pub aliases: SymbolAliases,
    pub options: BackcrossOptions,
}

impl Adapter for Backcross {
    fn name(&self) -> &'static str {
        "backcross"
    }

    fn suffix(&self) -> &'static str {
        "csvr"
    }

    fn encode(&self, table: &SegregationTable) -> Result<ParentMatrices> {
        Ok(ParentMatrices {
            p1: pseudo_testcross(table, Parent::P1, &self.options)?,
            p2: pseudo_testcross(table, Parent::P2, &self.options)?,
        })
    }

    fn write<W: Write>(&self, matrix: &CallMatrix, output: W) -> Result<()> {
        let mut writer = get_csv_writer(output);

        let mut header = vec![String::from("id"), String::from("chromosome"), String::from("position")];
        header.extend(matrix.individuals.iter().cloned());
        writer.write_record(&header)?;

        for (locus, row) in matrix.loci.iter().zip(matrix.calls.rows()) {
            let mut record = vec![locus.id.clone(), locus.chromosome.clone(), locus.position.to_string()];
            record.extend(row.iter().map(|c| c.symbol(&self.aliases).to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn read<R: BufRead>(&self, input: R, parent: Parent) -> Result<CallMatrix> {
        let mut reader = get_csv_reader(input, true);
        let header = reader.headers()?.clone();
        if header.len() < 3 {
            return Err(Error::unparsable(1, &header.iter().join(","), "expected id,chromosome,position columns"));
        }
        let individuals: Vec<String> = header.iter().skip(3).map(String::from).collect();

        let mut loci = vec![];
        let mut rows = vec![];
        for (n, record) in reader.records().enumerate() {
            let record = record?;
            let line = n + 2;
            let text = record.iter().join(",");

            let position = record[2]
                .parse::<u64>()
                .map_err(|_| Error::unparsable(line, &text, "position is not an integer"))?;
            loci.push(Locus::new(&record[0], &record[1], position));

            for field in record.iter().skip(3) {
                let mut chars = field.chars();
                let call = match (chars.next(), chars.next()) {
                    (Some(c), None) => Call::from_symbol(c, &self.aliases),
                    _ => None,
                };
                rows.push(call.ok_or_else(|| Error::unparsable(line, &text, format!("unknown call {field:?}")))?);
            }
        }

        let calls = Array2::from_shape_vec((loci.len(), individuals.len()), rows)
            .map_err(|e| Error::malformed(e.to_string()))?;
        CallMatrix::new(parent, loci, individuals, calls)
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;
    use crate::segregation::{EncoderSummary, Phase, SegregationCall};

    fn call(id: &str, seg_type: SegregationType, offspring: &[&str]) -> SegregationCall {
        SegregationCall {
            locus: Locus::new(id, "1", 100),
            alleles: seg_type.letters(),
            seg_type,
            phase: None,
            offspring: offspring.iter().map(|c| {
                let c: Vec<char> = c.chars().collect();
                match c.as_slice() {
                    ['-', '-'] => None,
                    [x, y] => Some([*x, *y]),
                    _ => unreachable!(),
                }
            }).collect(),
        }
    }

    fn table() -> SegregationTable {
        SegregationTable {
            name: String::from("pop"),
            parents: [String::from("P1"), String::from("P2")],
            offspring: vec!["F1".into(), "F2".into(), "F3".into(), "F4".into()],
            calls: vec![
                call("m1", SegregationType::Lmxll, &["ll", "lm", "lm", "--"]),
                call("m2", SegregationType::Nnxnp, &["nn", "np", "nn", "np"]),
                call("m3", SegregationType::Abxcd, &["ac", "ad", "bc", "bd"]),
                call("m4", SegregationType::Hkxhk, &["hh", "hk", "kk", "hk"]),
                call("m5", SegregationType::Efxeg, &["ee", "ef", "eg", "fg"]),
            ],
            aliases: SymbolAliases::default(),
            summary: EncoderSummary::default(),
        }
    }

    fn symbols(m: &CallMatrix) -> Vec<String> {
        let aliases = SymbolAliases::default();
        m.calls.rows().into_iter().map(|r| r.iter().map(|c| c.symbol(&aliases)).collect()).collect()
    }

    #[test]
    fn parent_restriction() {
        let options = BackcrossOptions::default();
        let p1 = pseudo_testcross(&table(), Parent::P1, &options).unwrap();
        assert_eq!(p1.locus_ids(), vec!["m1", "m3", "m5"]);
        assert_eq!(symbols(&p1), vec!["AHH-", "AAHH", "AHAH"]);

        let p2 = pseudo_testcross(&table(), Parent::P2, &options).unwrap();
        assert_eq!(p2.locus_ids(), vec!["m2", "m3", "m5"]);
        assert_eq!(symbols(&p2), vec!["AHAH", "AHAH", "AAHH"]);
    }

    #[test]
    fn hkxhk_duplicates() {
        let options = BackcrossOptions { include_hkxhk: true, ..Default::default() };
        let p1 = pseudo_testcross(&table(), Parent::P1, &options).unwrap();
        assert_eq!(p1.locus_ids(), vec!["m1", "m3", "m4", "m5"]);
        assert_eq!(symbols(&p1)[2], "ADHD");
    }

    #[test]
    fn repulsion_swaps_calls() {
        let mut table = table();
        table.calls[0].phase = Some(Phase { p1: PhaseBit::Repulsion, p2: PhaseBit::Coupling });
        let options = BackcrossOptions { apply_phase: true, ..Default::default() };
        let p1 = pseudo_testcross(&table, Parent::P1, &options).unwrap();
        assert_eq!(symbols(&p1)[0], "HAA-");
    }

    #[test]
    fn csvr_round_trip() {
        let adapter = Backcross::default();
        let matrices = adapter.encode(&table()).unwrap();
        for m in matrices.iter() {
            let mut out = vec![];
            adapter.write(m, &mut out).unwrap();
            let again = adapter.read(out.as_slice(), m.parent).unwrap();
            assert_eq!(&again, m);
        }
    }

    #[test]
    fn csvr_layout() {
        let adapter = Backcross::default();
        let p1 = pseudo_testcross(&table(), Parent::P1, &BackcrossOptions::default()).unwrap();
        let mut out = vec![];
        adapter.write(&p1, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().next().unwrap(), "id,chromosome,position,F1,F2,F3,F4");
        assert_eq!(text.lines().nth(1).unwrap(), "m1,1,100,A,H,H,-");
    }

    #[test]
    fn csvr_unknown_symbol() {
        let text = "id,chromosome,position,F1\nm1,1,100,Z\n";
        let res = Backcross::default().read(text.as_bytes(), Parent::P1);
        assert!(matches!(res, Err(Error::UnparsableRecord { line: 2, .. })));
    }
}
