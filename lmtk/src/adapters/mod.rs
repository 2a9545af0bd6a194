use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use indexmap::IndexSet;
use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::genotype::Locus;
use crate::linkage::{OrderedMap, OrderedMaps};
use crate::segregation::{Parent, SegregationTable, SymbolAliases};

/// R/qtl style backcross tables (csvr)
pub mod backcross;

/// CarthaGene raw files, listings and a session driver
pub mod carthagene;

/// ASMap/MSTmap input and output, clone detection
pub mod asmap;

/// A pseudo-testcross call of one offspring at one locus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Call {
    Homozygous,
    Heterozygous,
    Duplicate,
    #[default]
    Missing,
}

impl Call {
    pub fn symbol(&self, aliases: &SymbolAliases) -> char {
        match self {
            Self::Homozygous => aliases.homozygous,
            Self::Heterozygous => aliases.heterozygous,
            Self::Duplicate => aliases.duplicate,
            Self::Missing => aliases.missing,
        }
    }

    pub fn from_symbol(symbol: char, aliases: &SymbolAliases) -> Option<Self> {
        match symbol {
            s if s == aliases.homozygous => Some(Self::Homozygous),
            s if s == aliases.heterozygous => Some(Self::Heterozygous),
            s if s == aliases.duplicate => Some(Self::Duplicate),
            s if s == aliases.missing => Some(Self::Missing),
            _ => None,
        }
    }

    pub fn is_typed(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Calls of one parent's segregating loci, rows are loci and columns individuals
#[derive(Debug, Clone, PartialEq)]
pub struct CallMatrix {
    pub parent: Parent,
    pub loci: Vec<Locus>,
    pub individuals: Vec<String>,
    pub calls: Array2<Call>,
}

impl CallMatrix {
    pub fn new(parent: Parent, loci: Vec<Locus>, individuals: Vec<String>, calls: Array2<Call>) -> Result<Self> {
        if calls.dim() != (loci.len(), individuals.len()) {
            return Err(Error::malformed(format!(
                "call matrix has shape {:?}, expected {} loci x {} individuals",
                calls.dim(),
                loci.len(),
                individuals.len()
            )));
        }
        Ok(Self {
            parent,
            loci,
            individuals,
            calls,
        })
    }

    pub fn nloci(&self) -> usize {
        self.loci.len()
    }

    pub fn nindividuals(&self) -> usize {
        self.individuals.len()
    }

    pub fn locus_ids(&self) -> Vec<&str> {
        self.loci.iter().map(|l| l.id.as_str()).collect()
    }

    /// Keep the loci for which `keep` returns true
    pub fn retain_loci<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let idx: Vec<usize> = (0..self.nloci()).filter(|i| keep(*i)).collect();
        Self {
            parent: self.parent,
            loci: idx.iter().map(|i| self.loci[*i].clone()).collect(),
            individuals: self.individuals.clone(),
            calls: self.calls.select(ndarray::Axis(0), &idx),
        }
    }
}

/// Pseudo-testcross matrices of both parents
#[derive(Debug, Clone, PartialEq)]
pub struct ParentMatrices {
    pub p1: CallMatrix,
    pub p2: CallMatrix,
}

impl ParentMatrices {
    pub fn get(&self, parent: Parent) -> &CallMatrix {
        match parent {
            Parent::P1 => &self.p1,
            Parent::P2 => &self.p2,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallMatrix> {
        [&self.p1, &self.p2].into_iter()
    }
}

/// One textual convention of an external mapping engine
pub trait Adapter {
    fn name(&self) -> &'static str;

    /// File suffix of the engine input files
    fn suffix(&self) -> &'static str;

    fn encode(&self, table: &SegregationTable) -> Result<ParentMatrices>;

    fn write<W: Write>(&self, matrix: &CallMatrix, output: W) -> Result<()>;

    fn read<R: BufRead>(&self, input: R, parent: Parent) -> Result<CallMatrix>;
}

/// Both directions of the echoed locus list have to match the expected set
pub fn verify_locus_set<'a, E, I>(expected: E, echoed: I) -> Result<()>
where
    E: IntoIterator<Item = &'a str>,
    I: IntoIterator<Item = &'a str>,
{
    let expected: IndexSet<&str> = expected.into_iter().collect();
    let echoed: IndexSet<&str> = echoed.into_iter().collect();

    if let Some(locus) = echoed.iter().find(|l| !expected.contains(*l)) {
        return Err(Error::UnknownLocusReference {
            locus: locus.to_string(),
            line: None,
        });
    }
    if let Some(locus) = expected.iter().find(|l| !echoed.contains(*l)) {
        return Err(Error::UnknownLocusReference {
            locus: locus.to_string(),
            line: None,
        });
    }
    Ok(())
}

/// Order every linkage group independently on the rayon pool
pub fn order_groups_parallel<F>(groups: &BTreeMap<u32, Vec<String>>, orderer: F) -> Result<OrderedMaps>
where
    F: Fn(u32, &[String]) -> Result<OrderedMap> + Sync,
{
    let groups: Vec<(&u32, &Vec<String>)> = groups.iter().collect();
    let maps = groups
        .par_iter()
        .map(|(group, loci)| orderer(**group, loci))
        .collect::<Result<Vec<OrderedMap>>>()?;

    Ok(maps.into_iter().map(|m| (m.group.clone(), m)).collect())
}
