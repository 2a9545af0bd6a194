use std::collections::BTreeMap;
use std::io::Write;

use indexmap::{IndexMap, IndexSet};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io::{get_strict_tsv_writer, get_tsv_reader};

/// A pairwise statistic value, engines report unresolvable pairs as missing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Stat {
    Present(f64),
    #[default]
    Missing,
}

impl Stat {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Present(v) => Some(*v),
            Self::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Present(v) => write!(f, "{v}"),
            Self::Missing => write!(f, "NA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum StatKind {
    RecombinationFraction,
    Lod,
    Distance,
    Congruence,
}

impl StatKind {
    pub fn accepts(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            Self::RecombinationFraction | Self::Congruence => (0.0..=1.0).contains(&value),
            Self::Lod | Self::Distance => value >= 0.0,
        }
    }
}

/// Square, symmetric and labelled matrix of a pairwise statistic
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseMatrix {
    pub kind: StatKind,
    labels: IndexSet<String>,
    values: Array2<Stat>,
}

impl PairwiseMatrix {
    pub fn new(kind: StatKind, labels: Vec<String>) -> Result<Self> {
        let n = labels.len();
        let labels: IndexSet<String> = labels.into_iter().collect();
        if labels.len() != n {
            return Err(Error::malformed("duplicate labels in a pairwise matrix"));
        }
        Ok(Self {
            kind,
            labels,
            values: Array2::from_elem((n, n), Stat::Missing),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &IndexSet<String> {
        &self.labels
    }

    pub fn values(&self) -> &Array2<Stat> {
        &self.values
    }

    /// Set both `(i, j)` and `(j, i)`. The diagonal stays missing.
    pub fn set(&mut self, i: usize, j: usize, stat: Stat) -> Result<()> {
        if i == j {
            return Ok(());
        }
        if let Stat::Present(v) = stat {
            if !self.kind.accepts(v) {
                return Err(Error::malformed(format!(
                    "{v} is out of range for {:?}",
                    self.kind
                )));
            }
        }
        self.values[[i, j]] = stat;
        self.values[[j, i]] = stat;
        Ok(())
    }

    pub fn get_idx(&self, i: usize, j: usize) -> Stat {
        self.values[[i, j]]
    }

    pub fn get(&self, a: &str, b: &str) -> Result<Stat> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Ok(self.values[[i, j]])
    }

    fn index_of(&self, label: &str) -> Result<usize> {
        self.labels
            .get_index_of(label)
            .ok_or_else(|| Error::UnknownLocusReference {
                locus: label.to_string(),
                line: None,
            })
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.len();
        (0..n).all(|i| (0..n).all(|j| self.values[[i, j]] == self.values[[j, i]]))
    }

    pub fn missing_pairs(&self) -> usize {
        let n = self.len();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|(i, j)| self.values[[*i, *j]].is_missing())
            .count()
    }

    /// Pairs `i < j` with a present value
    pub fn upper_pairs(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        let n = self.len();
        (0..n).flat_map(move |i| {
            (i + 1..n).filter_map(move |j| {
                self.values[[i, j]].value().map(|v| {
                    (
                        self.labels[i].as_str(),
                        self.labels[j].as_str(),
                        v,
                    )
                })
            })
        })
    }

    /// Write the full square matrix with a header row of labels
    pub fn write_tsv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = get_strict_tsv_writer(output);
        let mut header = vec![String::new()];
        header.extend(self.labels.iter().cloned());
        writer.write_record(&header)?;

        for (i, label) in self.labels.iter().enumerate() {
            let mut record = vec![label.clone()];
            record.extend(self.values.row(i).iter().map(|s| s.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub locus: String,
    pub group: u32,
}

/// Linkage group assignment of one parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageGroups {
    pub records: Vec<GroupRecord>,
}

impl LinkageGroups {
    pub fn push(&mut self, locus: &str, group: u32) {
        self.records.push(GroupRecord {
            locus: locus.to_string(),
            group,
        });
    }

    pub fn groups(&self) -> BTreeMap<u32, Vec<String>> {
        let mut groups: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for r in &self.records {
            groups.entry(r.group).or_default().push(r.locus.clone());
        }
        groups
    }

    pub fn loci(&self) -> IndexSet<String> {
        self.records.iter().map(|r| r.locus.clone()).collect()
    }

    /// Read a `locus group` table with a header row
    pub fn read_tsv<R: std::io::Read>(input: R) -> Result<Self> {
        let mut reader = get_tsv_reader(input, true);
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<GroupRecord>, csv::Error>>()?;
        if let Some(r) = records.iter().find(|r| r.group == 0) {
            return Err(Error::malformed(format!("locus {} has the group label 0", r.locus)));
        }
        Ok(Self { records })
    }

    pub fn write_tsv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = get_strict_tsv_writer(output);
        writer.write_record(["locus", "group"])?;
        for r in &self.records {
            writer.write_record([r.locus.as_str(), r.group.to_string().as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub locus: String,
    pub distance: f64,
}

/// Loci of one linkage group in map order with cumulative distances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedMap {
    pub group: String,
    pub entries: Vec<MapEntry>,
}

impl OrderedMap {
    /// The first distance is 0 and distances never decrease
    pub fn new(group: &str, entries: Vec<MapEntry>) -> Result<Self> {
        let mut previous = 0.0;
        for (i, entry) in entries.iter().enumerate() {
            let bad = match i {
                0 => entry.distance != 0.0,
                _ => entry.distance < previous || entry.distance.is_nan(),
            };
            if bad {
                return Err(Error::InvalidMapOrder {
                    group: group.to_string(),
                    record: i + 1,
                    previous,
                    distance: entry.distance,
                });
            }
            previous = entry.distance;
        }

        Ok(Self {
            group: group.to_string(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn length(&self) -> f64 {
        self.entries.last().map(|e| e.distance).unwrap_or(0.0)
    }

    pub fn loci(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.locus.as_str()).collect()
    }
}

pub type OrderedMaps = IndexMap<String, OrderedMap>;

pub fn write_maps_tsv<W: Write>(maps: &OrderedMaps, output: W) -> Result<()> {
    let mut writer = get_strict_tsv_writer(output);
    writer.write_record(["group", "locus", "distance"])?;
    for (name, map) in maps {
        for entry in &map.entries {
            writer.write_record([name.as_str(), entry.locus.as_str(), entry.distance.to_string().as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}
