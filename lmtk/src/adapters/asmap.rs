use std::io::{BufRead, Write};

use itertools::Itertools;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adapters::backcross::{pseudo_testcross, BackcrossOptions};
use crate::adapters::{Adapter, Call, CallMatrix, ParentMatrices};
use crate::error::{Error, Result};
use crate::genotype::Locus;
use crate::linkage::{MapEntry, OrderedMap, OrderedMaps, PairwiseMatrix, Stat, StatKind};
use crate::segregation::{Parent, SegregationTable, SymbolAliases};

pub const CLONE_THRESHOLD: f64 = 0.9;

/// MSTmap settings written to the input file header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MstmapParams {
    pub population_type: String,
    pub distance_function: String,
    pub cut_off_p_value: f64,
    pub no_map_dist: f64,
    pub no_map_size: usize,
    pub missing_threshold: f64,
    pub estimation_before_clustering: bool,
    pub detect_bad_data: bool,
    pub objective_function: String,
}

impl Default for MstmapParams {
    fn default() -> Self {
        Self {
            population_type: String::from("DH"),
            distance_function: String::from("kosambi"),
            cut_off_p_value: 1e-6,
            no_map_dist: 15.0,
            no_map_size: 0,
            missing_threshold: 1.0,
            estimation_before_clustering: false,
            detect_bad_data: true,
            objective_function: String::from("COUNT"),
        }
    }
}

fn yes_no(b: bool) -> &'static str {
    match b {
        true => "yes",
        false => "no",
    }
}

/// MSTmap symbols, `A`/`B` for the two classes and `U` for missing
pub fn mstmap_aliases() -> SymbolAliases {
    SymbolAliases {
        homozygous: 'A',
        heterozygous: 'B',
        duplicate: 'X',
        missing: 'U',
    }
}

/// Minor class frequency among typed calls, `None` when nothing is typed
pub fn minor_allele_frequency(calls: ndarray::ArrayView1<Call>) -> Option<f64> {
    let hom = calls.iter().filter(|c| **c == Call::Homozygous).count();
    let het = calls.iter().filter(|c| **c == Call::Heterozygous).count();
    match hom + het {
        0 => None,
        typed => Some(hom.min(het) as f64 / typed as f64),
    }
}

/// Keep the loci with `maf >= threshold`, returns the number dropped
pub fn filter_maf(matrix: &CallMatrix, threshold: f64) -> (CallMatrix, usize) {
    let keep: Vec<bool> = matrix
        .calls
        .axis_iter(Axis(0))
        .map(|row| minor_allele_frequency(row).is_some_and(|maf| maf >= threshold))
        .collect();
    let filtered = matrix.retain_loci(|i| keep[i]);
    let dropped = matrix.nloci() - filtered.nloci();
    (filtered, dropped)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asmap {
    pub aliases: SymbolAliases,
    pub maf: f64,
    pub params: MstmapParams,
}

impl Default for Asmap {
    fn default() -> Self {
        Self {
            aliases: mstmap_aliases(),
            maf: 0.0,
            params: MstmapParams::default(),
        }
    }
}

impl Asmap {
    /// Pseudo-testcross matrices after MAF filtering and the dropped counts per parent
    pub fn encode_filtered(&self, table: &SegregationTable) -> Result<(ParentMatrices, [usize; 2])> {
        let options = BackcrossOptions::default();
        let (p1, d1) = filter_maf(&pseudo_testcross(table, Parent::P1, &options)?, self.maf);
        let (p2, d2) = filter_maf(&pseudo_testcross(table, Parent::P2, &options)?, self.maf);
        tracing::info!(
            "MAF >= {}: dropped {d1} loci of P1 and {d2} loci of P2",
            self.maf
        );
        Ok((ParentMatrices { p1, p2 }, [d1, d2]))
    }
}

impl Adapter for Asmap {
    fn name(&self) -> &'static str {
        "asmap"
    }

    fn suffix(&self) -> &'static str {
        "txt"
    }

    fn encode(&self, table: &SegregationTable) -> Result<ParentMatrices> {
        Ok(self.encode_filtered(table)?.0)
    }

    fn write<W: Write>(&self, matrix: &CallMatrix, mut output: W) -> Result<()> {
        let p = &self.params;
        writeln!(output, "population_type {}", p.population_type)?;
        writeln!(output, "population_name {}", matrix.parent)?;
        writeln!(output, "distance_function {}", p.distance_function)?;
        writeln!(output, "cut_off_p_value {}", p.cut_off_p_value)?;
        writeln!(output, "no_map_dist {}", p.no_map_dist)?;
        writeln!(output, "no_map_size {}", p.no_map_size)?;
        writeln!(output, "missing_threshold {}", p.missing_threshold)?;
        writeln!(output, "estimation_before_clustering {}", yes_no(p.estimation_before_clustering))?;
        writeln!(output, "detect_bad_data {}", yes_no(p.detect_bad_data))?;
        writeln!(output, "objective_function {}", p.objective_function)?;
        writeln!(output, "number_of_loci {}", matrix.nloci())?;
        writeln!(output, "number_of_individual {}", matrix.nindividuals())?;
        writeln!(output)?;
        writeln!(output, "locus_name\t{}", matrix.individuals.join("\t"))?;

        for (locus, row) in matrix.loci.iter().zip(matrix.calls.rows()) {
            writeln!(output, "{}\t{}", locus.id, row.iter().map(|c| c.symbol(&self.aliases)).join("\t"))?;
        }
        output.flush()?;
        Ok(())
    }

    fn read<R: BufRead>(&self, input: R, parent: Parent) -> Result<CallMatrix> {
        let mut nloci: Option<usize> = None;
        let mut nind: Option<usize> = None;
        let mut individuals: Option<Vec<String>> = None;
        let mut loci = vec![];
        let mut calls = vec![];

        for (i, line) in input.lines().enumerate() {
            let line = line?;
            let n = i + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(first) = tokens.first() else {
                continue;
            };

            let Some(ids) = &individuals else {
                match *first {
                    "locus_name" => individuals = Some(tokens[1..].iter().map(|t| t.to_string()).collect()),
                    "number_of_loci" | "number_of_individual" => {
                        let value = tokens
                            .get(1)
                            .and_then(|t| t.parse::<usize>().ok())
                            .ok_or_else(|| Error::unparsable(n, &line, "expected a count"))?;
                        match *first {
                            "number_of_loci" => nloci = Some(value),
                            _ => nind = Some(value),
                        }
                    }
                    _ => (),
                }
                continue;
            };

            if tokens.len() != ids.len() + 1 {
                return Err(Error::unparsable(n, &line, format!("expected {} calls", ids.len())));
            }
            for token in &tokens[1..] {
                let mut chars = token.chars();
                let call = match (chars.next(), chars.next()) {
                    (Some(c), None) => Call::from_symbol(c, &self.aliases),
                    _ => None,
                };
                calls.push(call.ok_or_else(|| Error::unparsable(n, &line, format!("unknown call {token:?}")))?);
            }
            loci.push(Locus::new(first, "", 0));
        }

        let individuals = individuals.ok_or_else(|| Error::malformed("no locus_name line in MSTmap input"))?;
        if nloci.is_some_and(|n| n != loci.len()) || nind.is_some_and(|n| n != individuals.len()) {
            return Err(Error::malformed("MSTmap header counts do not match the listed data"));
        }

        let calls = Array2::from_shape_vec((loci.len(), individuals.len()), calls)
            .map_err(|e| Error::malformed(e.to_string()))?;
        CallMatrix::new(parent, loci, individuals, calls)
    }
}

/// Parse MSTmap output, `group <name>` followed by a `;BEGINOFGROUP` ... `;ENDOFGROUP` block
pub fn parse_mstmap_output<R: BufRead>(input: R) -> Result<OrderedMaps> {
    let mut maps = OrderedMaps::new();
    let mut name: Option<(usize, String)> = None;
    let mut open: Option<(String, Vec<MapEntry>)> = None;

    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let n = i + 1;
        let trimmed = line.trim();

        if trimmed == ";BEGINOFGROUP" {
            if open.is_some() {
                return Err(Error::unparsable(n, &line, "group opened inside another group"));
            }
            let (_, group) = name
                .take()
                .ok_or_else(|| Error::unparsable(n, &line, "group block without a group name"))?;
            open = Some((group, vec![]));
            continue;
        }

        if trimmed == ";ENDOFGROUP" {
            let (group, entries) = open
                .take()
                .ok_or_else(|| Error::unparsable(n, &line, "group closed without being opened"))?;
            if maps.contains_key(&group) {
                return Err(Error::unparsable(n, &line, format!("group {group} is listed twice")));
            }
            let map = OrderedMap::new(&group, entries)?;
            maps.insert(group, map);
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        match (&mut open, tokens.as_slice()) {
            (Some((_, entries)), [locus, distance]) => {
                let distance: f64 = distance
                    .parse()
                    .map_err(|_| Error::unparsable(n, &line, "distance is not a number"))?;
                entries.push(MapEntry {
                    locus: locus.to_string(),
                    distance,
                });
            }
            (Some(_), _) => return Err(Error::unparsable(n, &line, "expected 'locus distance'")),
            (None, ["group", group]) => name = Some((n, group.to_string())),
            (None, _) => (),
        }
    }

    if let Some((group, _)) = open {
        return Err(Error::malformed(format!("group {group} is never closed")));
    }
    if let Some((n, group)) = name {
        return Err(Error::unparsable(n, &format!("group {group}"), "group name without a block"));
    }

    Ok(maps)
}

/// Fraction of matching calls over the loci typed in both individuals, for every pair
pub fn congruence_matrix(matrix: &CallMatrix) -> Result<PairwiseMatrix> {
    let n = matrix.nindividuals();
    let calls = &matrix.calls;

    let pairs: Vec<(usize, usize, Stat)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            (i + 1..n).map(move |j| {
                let a = calls.column(i);
                let b = calls.column(j);
                let (shared, matching) = a
                    .iter()
                    .zip(b.iter())
                    .filter(|(x, y)| x.is_typed() && y.is_typed())
                    .fold((0usize, 0usize), |(s, m), (x, y)| (s + 1, m + usize::from(x == y)));
                let stat = match shared {
                    0 => Stat::Missing,
                    _ => Stat::Present(matching as f64 / shared as f64),
                };
                (i, j, stat)
            })
        })
        .collect();

    let mut congruence = PairwiseMatrix::new(StatKind::Congruence, matrix.individuals.clone())?;
    for (i, j, stat) in pairs {
        congruence.set(i, j, stat)?;
    }

    tracing::debug!(
        "Congruence of {n} individuals, {} pairs without shared typed loci",
        congruence.missing_pairs()
    );
    Ok(congruence)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClonePair {
    pub first: String,
    pub second: String,
    pub congruence: f64,
}

/// Pairs whose congruence is at least `threshold`
pub fn flag_clones(congruence: &PairwiseMatrix, threshold: f64) -> Vec<ClonePair> {
    congruence
        .upper_pairs()
        .filter(|(_, _, v)| *v >= threshold)
        .map(|(a, b, v)| ClonePair {
            first: a.to_string(),
            second: b.to_string(),
            congruence: v,
        })
        .collect()
}
