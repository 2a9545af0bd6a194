use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use crate::error::{Error, Result};
use crate::io::get_strict_tsv_writer;
use crate::linkage::LinkageGroups;
use crate::segregation::{phase_label, Phase, PhaseBit, SegregationTable, SegregationType};

/// Group assignment of one parent and the group holding its reference phase
#[derive(Debug, Clone, PartialEq)]
pub struct ParentAssignment {
    pub name: String,
    pub groups: LinkageGroups,
    pub reference_group: u32,
}

impl ParentAssignment {
    pub fn new(name: &str, groups: LinkageGroups, reference_group: u32) -> Self {
        Self {
            name: name.to_string(),
            groups,
            reference_group,
        }
    }

    fn lookup(&self) -> Result<HashMap<&str, u32>> {
        let mut lookup: HashMap<&str, u32> = HashMap::new();
        for r in &self.groups.records {
            match lookup.get(r.locus.as_str()) {
                Some(first) if *first != r.group => {
                    return Err(Error::AmbiguousGroupMapping {
                        locus: r.locus.clone(),
                        parent: self.name.clone(),
                        first: *first,
                        second: r.group,
                    })
                }
                Some(_) => (),
                None => {
                    lookup.insert(r.locus.as_str(), r.group);
                }
            }
        }
        Ok(lookup)
    }
}

/// Loci counted by segregation type and phase label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseCrossTab(pub BTreeMap<(SegregationType, String), usize>);

impl PhaseCrossTab {
    pub fn count(&self, seg_type: SegregationType, label: &str) -> usize {
        self.0
            .get(&(seg_type, label.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn write_tsv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = get_strict_tsv_writer(output);
        writer.write_record(["type", "phase", "count"])?;
        for ((seg_type, label), count) in &self.0 {
            writer.write_record([seg_type.as_str(), label.as_str(), count.to_string().as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn bit(group: u32, reference: u32) -> PhaseBit {
    match group == reference {
        true => PhaseBit::Coupling,
        false => PhaseBit::Repulsion,
    }
}

/// Assign a phase to every locus grouped in both parents.
///
/// Returns a new table, phases already present in `table` are recomputed.
pub fn reconcile(
    table: &SegregationTable,
    p1: &ParentAssignment,
    p2: &ParentAssignment,
) -> Result<(SegregationTable, PhaseCrossTab)> {
    let lookup1 = p1.lookup()?;
    let lookup2 = p2.lookup()?;

    let mut phased = table.clone();
    let mut crosstab = PhaseCrossTab::default();

    for call in phased.calls.iter_mut() {
        let id = call.locus.id.as_str();
        call.phase = match (lookup1.get(id), lookup2.get(id)) {
            (Some(g1), Some(g2)) => Some(Phase {
                p1: bit(*g1, p1.reference_group),
                p2: bit(*g2, p2.reference_group),
            }),
            _ => None,
        };

        *crosstab
            .0
            .entry((call.seg_type, phase_label(&call.phase)))
            .or_insert(0) += 1;
    }

    let unphased: usize = phased.calls.iter().filter(|c| c.phase.is_none()).count();
    tracing::info!(
        "Phased {}/{} loci, {unphased} are missing from a parental group assignment",
        phased.calls.len() - unphased,
        phased.calls.len()
    );

    Ok((phased, crosstab))
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;
    use crate::genotype::Locus;
    use crate::segregation::{EncoderSummary, SegregationCall, SymbolAliases};

    fn table() -> SegregationTable {
        let call = |id: &str, seg_type| SegregationCall {
            locus: Locus::new(id, "1", 0),
            alleles: SegregationType::letters(&seg_type),
            seg_type,
            phase: None,
            offspring: vec![],
        };
        SegregationTable {
            name: String::from("pop"),
            parents: [String::from("P1"), String::from("P2")],
            offspring: vec![],
            calls: vec![
                call("m1", SegregationType::Abxcd),
                call("m2", SegregationType::Efxeg),
                call("m3", SegregationType::Hkxhk),
                call("m4", SegregationType::Lmxll),
            ],
            aliases: SymbolAliases::default(),
            summary: EncoderSummary::default(),
        }
    }

    fn assignments() -> (ParentAssignment, ParentAssignment) {
        let mut g1 = LinkageGroups::default();
        g1.push("m1", 1);
        g1.push("m2", 2);
        g1.push("m3", 1);
        g1.push("m4", 2);
        let mut g2 = LinkageGroups::default();
        g2.push("m1", 4);
        g2.push("m2", 4);
        g2.push("m3", 3);
        (ParentAssignment::new("P1", g1, 1), ParentAssignment::new("P2", g2, 3))
    }

    #[test]
    fn phases_follow_reference_groups() {
        let (p1, p2) = assignments();
        let (phased, crosstab) = reconcile(&table(), &p1, &p2).unwrap();

        let labels: Vec<String> = phased.calls.iter().map(|c| phase_label(&c.phase)).collect();
        assert_eq!(labels, vec!["{01}", "{11}", "{00}", "{??}"]);

        assert_eq!(crosstab.count(SegregationType::Lmxll, "{??}"), 1);
        assert_eq!(crosstab.count(SegregationType::Hkxhk, "{00}"), 1);
        assert_eq!(crosstab.total(), 4);
    }

    #[test]
    fn deterministic() {
        let (p1, p2) = assignments();
        let a = reconcile(&table(), &p1, &p2).unwrap();
        let b = reconcile(&a.0, &p1, &p2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ambiguous_group() {
        let (mut p1, p2) = assignments();
        p1.groups.push("m3", 2);
        let res = reconcile(&table(), &p1, &p2);
        assert!(matches!(res, Err(Error::AmbiguousGroupMapping { first: 1, second: 2, .. })));
    }

    #[test]
    fn crosstab_tsv() {
        let (p1, p2) = assignments();
        let (_, crosstab) = reconcile(&table(), &p1, &p2).unwrap();
        let mut out = vec![];
        crosstab.write_tsv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "type\tphase\tcount\nabxcd\t{01}\t1\nefxeg\t{11}\t1\nhkxhk\t{00}\t1\nlmxll\t{??}\t1\n"
        );
    }
}
