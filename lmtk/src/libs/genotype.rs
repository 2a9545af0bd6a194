use std::io::{BufRead, Write};
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io::{get_buffered_input, get_strict_tsv_writer};
use crate::utils::{compare_chromosomes, is_missing_token};

/// Allele dose of the alternative allele, `None` when the call is missing
pub type Dose = Option<u8>;

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locus {
    pub id: String,
    pub chromosome: String,
    pub position: u64,
}

impl Locus {
    pub fn new(id: &str, chromosome: &str, position: u64) -> Self {
        Self {
            id: id.to_string(),
            chromosome: chromosome.to_string(),
            position,
        }
    }
}

impl std::fmt::Display for Locus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.id, self.chromosome, self.position)
    }
}

pub fn parse_dose(token: &str) -> Result<Dose> {
    if token == "-1" || is_missing_token(token) {
        return Ok(None);
    }
    match token.parse::<u8>() {
        Ok(v @ 0..=2) => Ok(Some(v)),
        _ => Err(Error::malformed(format!(
            "allele dose {token:?} is not one of 0, 1, 2 or a missing marker"
        ))),
    }
}

/// Allele doses of individuals (rows) at loci (columns)
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeMatrix {
    loci: IndexMap<String, Locus>,
    individuals: IndexSet<String>,
    pub matrix: Array2<Dose>,
}

impl GenotypeMatrix {
    pub fn new(loci: Vec<Locus>, individuals: Vec<String>, matrix: Array2<Dose>) -> Result<Self> {
        if matrix.nrows() != individuals.len() || matrix.ncols() != loci.len() {
            return Err(Error::malformed(format!(
                "matrix shape {:?} does not match {} individuals and {} loci",
                matrix.shape(),
                individuals.len(),
                loci.len()
            )));
        }

        if let Some(dose) = matrix.iter().flatten().find(|d| **d > 2) {
            return Err(Error::malformed(format!(
                "allele dose {dose} is not one of 0, 1, 2 or missing"
            )));
        }

        let mut locus_map = IndexMap::with_capacity(loci.len());
        for locus in loci {
            let id = locus.id.clone();
            if locus_map.insert(id.clone(), locus).is_some() {
                return Err(Error::malformed(format!("locus {id} is listed twice")));
            }
        }

        let mut individual_set = IndexSet::with_capacity(individuals.len());
        for id in individuals {
            if !individual_set.insert(id.clone()) {
                return Err(Error::malformed(format!("individual {id} is listed twice")));
            }
        }

        Ok(Self {
            loci: locus_map,
            individuals: individual_set,
            matrix,
        })
    }

    /// Build a matrix from per-locus rows that reference locus metadata by id
    pub fn from_rows(
        metadata: &[Locus],
        individuals: Vec<String>,
        rows: Vec<(String, Vec<Dose>)>,
    ) -> Result<Self> {
        let by_id: IndexMap<&str, &Locus> = metadata.iter().map(|l| (l.id.as_str(), l)).collect();

        let mut loci = Vec::with_capacity(rows.len());
        let mut matrix = Array2::from_elem((individuals.len(), rows.len()), None);

        for (col, (id, doses)) in rows.into_iter().enumerate() {
            let locus = by_id
                .get(id.as_str())
                .ok_or_else(|| Error::malformed(format!("locus {id} has no metadata")))?;

            if doses.len() != individuals.len() {
                return Err(Error::malformed(format!(
                    "locus {id} has {} calls for {} individuals",
                    doses.len(),
                    individuals.len()
                )));
            }

            matrix.column_mut(col).assign(&ArrayView1::from(&doses));
            loci.push((*locus).clone());
        }

        Self::new(loci, individuals, matrix)
    }

    pub fn nindividuals(&self) -> usize {
        self.individuals.len()
    }

    pub fn nloci(&self) -> usize {
        self.loci.len()
    }

    pub fn individuals(&self) -> &IndexSet<String> {
        &self.individuals
    }

    pub fn loci(&self) -> impl Iterator<Item = &Locus> {
        self.loci.values()
    }

    pub fn locus(&self, id: &str) -> Option<&Locus> {
        self.loci.get(id)
    }

    pub fn locus_ids(&self) -> Vec<String> {
        self.loci.keys().cloned().collect()
    }

    fn individual_idx(&self, id: &str) -> Result<usize> {
        self.individuals
            .get_index_of(id)
            .ok_or_else(|| Error::malformed(format!("individual {id} is not in the matrix")))
    }

    fn locus_idx(&self, id: &str) -> Result<usize> {
        self.loci
            .get_index_of(id)
            .ok_or_else(|| Error::UnknownLocusReference {
                locus: id.to_string(),
                line: None,
            })
    }

    pub fn get(&self, individual: &str, locus: &str) -> Result<Dose> {
        Ok(self.matrix[[self.individual_idx(individual)?, self.locus_idx(locus)?]])
    }

    pub fn is_missing(&self, individual: &str, locus: &str) -> Result<bool> {
        Ok(self.get(individual, locus)?.is_none())
    }

    pub fn individual_row(&self, id: &str) -> Result<ArrayView1<'_, Dose>> {
        Ok(self.matrix.row(self.individual_idx(id)?))
    }

    pub fn locus_column(&self, id: &str) -> Result<ArrayView1<'_, Dose>> {
        Ok(self.matrix.column(self.locus_idx(id)?))
    }

    /// A new matrix with only the given individuals, in the given order
    pub fn select_individuals<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self> {
        let idx = ids
            .iter()
            .map(|id| self.individual_idx(id.as_ref()))
            .collect::<Result<Vec<usize>>>()?;

        Self::new(
            self.loci.values().cloned().collect(),
            ids.iter().map(|s| s.as_ref().to_string()).collect(),
            self.matrix.select(Axis(0), &idx),
        )
    }

    /// A new matrix with only the given loci, in the given order
    pub fn select_loci<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self> {
        let idx = ids
            .iter()
            .map(|id| self.locus_idx(id.as_ref()))
            .collect::<Result<Vec<usize>>>()?;

        Self::new(
            idx.iter().map(|i| self.loci[*i].clone()).collect(),
            self.individuals.iter().cloned().collect(),
            self.matrix.select(Axis(1), &idx),
        )
    }

    /// Loci ordered by chromosome and physical position
    pub fn sorted_by_position(&self) -> Self {
        let mut idx: Vec<usize> = (0..self.nloci()).collect();
        idx.sort_by(|a, b| {
            let (la, lb) = (&self.loci[*a], &self.loci[*b]);
            compare_chromosomes(&la.chromosome, &lb.chromosome)
                .then(la.position.cmp(&lb.position))
        });

        Self {
            loci: idx
                .iter()
                .map(|i| (self.loci[*i].id.clone(), self.loci[*i].clone()))
                .collect(),
            individuals: self.individuals.clone(),
            matrix: self.matrix.select(Axis(1), &idx),
        }
    }
}

/// Read a genotype table with loci in rows.
///
/// The header row is `locus chromosome position <individual>...`, fields are
/// tab delimited or, when the header has no tabs, separated by whitespace.
pub fn read_genotype_table(path: PathBuf) -> Result<GenotypeMatrix> {
    parse_genotype_table(get_buffered_input(Some(path))?)
}

pub fn parse_genotype_table<R: BufRead>(reader: R) -> Result<GenotypeMatrix> {
    let mut lines = reader.lines().enumerate();

    let (header, tabbed) = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if line.trim().is_empty() || line.starts_with('#') {
                    continue;
                }
                let tabbed = line.contains('\t');
                let header: Vec<String> = split_fields(&line, tabbed).into_iter().map(String::from).collect();
                break (header, tabbed);
            }
            None => return Err(Error::malformed("genotype table has no header row")),
        }
    };

    if header.len() < 4 {
        return Err(Error::malformed(
            "genotype table header needs locus, chromosome, position and at least one individual",
        ));
    }

    let individuals: Vec<String> = header[3..].to_vec();
    let mut loci = vec![];
    let mut rows = vec![];

    for (n, line) in lines {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields = split_fields(&line, tabbed);
        if fields.len() != header.len() {
            return Err(Error::malformed(format!(
                "line {} has {} fields, the header has {}",
                n + 1,
                fields.len(),
                header.len()
            )));
        }

        let position = fields[2].parse::<u64>().map_err(|_| {
            Error::malformed(format!(
                "line {}: position {:?} is not an integer",
                n + 1,
                fields[2]
            ))
        })?;

        let doses = fields[3..]
            .iter()
            .map(|f| parse_dose(f))
            .collect::<Result<Vec<Dose>>>()?;

        loci.push(Locus::new(fields[0], fields[1], position));
        rows.push((fields[0].to_string(), doses));
    }

    tracing::debug!(
        "Read {} loci for {} individuals",
        loci.len(),
        individuals.len()
    );

    GenotypeMatrix::from_rows(&loci, individuals, rows)
}

fn split_fields(line: &str, tabbed: bool) -> Vec<&str> {
    match tabbed {
        true => line.trim_end_matches(['\r', '\n']).split('\t').collect(),
        false => line.split_whitespace().collect(),
    }
}

pub fn write_genotype_table<W: Write>(matrix: &GenotypeMatrix, output: W) -> Result<()> {
    let mut writer = get_strict_tsv_writer(output);

    let mut header = vec!["locus".to_string(), "chromosome".into(), "position".into()];
    header.extend(matrix.individuals().iter().cloned());
    writer.write_record(&header)?;

    for (col, locus) in matrix.loci().enumerate() {
        let mut record = vec![
            locus.id.clone(),
            locus.chromosome.clone(),
            locus.position.to_string(),
        ];
        record.extend(matrix.matrix.column(col).iter().map(|d| match d {
            Some(v) => v.to_string(),
            None => "NA".to_string(),
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_matrix() -> GenotypeMatrix {
        let loci = vec![
            Locus::new("m1", "chr2", 300),
            Locus::new("m2", "chr10", 100),
            Locus::new("m3", "chr2", 100),
        ];
        let individuals = vec!["P1".to_string(), "P2".into(), "F1".into()];
        let matrix = array![
            [Some(1), Some(0), Some(2)],
            [Some(0), Some(1), Some(1)],
            [None, Some(1), Some(2)],
        ];
        GenotypeMatrix::new(loci, individuals, matrix).unwrap()
    }

    #[test]
    fn lookup() {
        let m = create_matrix();
        assert_eq!(m.get("P1", "m1").unwrap(), Some(1));
        assert_eq!(m.get("F1", "m3").unwrap(), Some(2));
        assert!(m.is_missing("F1", "m1").unwrap());
        assert!(!m.is_missing("P2", "m1").unwrap());
        assert!(m.get("F9", "m1").is_err());
        assert!(matches!(m.get("P1", "m9"), Err(Error::UnknownLocusReference { .. })));
    }

    #[test]
    fn rows_and_columns() {
        let m = create_matrix();
        assert_eq!(m.individual_row("P2").unwrap().to_vec(), vec![Some(0), Some(1), Some(1)]);
        assert_eq!(m.locus_column("m2").unwrap().to_vec(), vec![Some(0), Some(1), Some(1)]);
    }

    #[test]
    fn select() {
        let m = create_matrix();
        let s = m.select_individuals(&["F1", "P1"]).unwrap();
        assert_eq!(s.individuals().iter().collect::<Vec<_>>(), vec!["F1", "P1"]);
        assert_eq!(s.get("F1", "m2").unwrap(), Some(1));

        let s = m.select_loci(&["m3"]).unwrap();
        assert_eq!(s.nloci(), 1);
        assert_eq!(s.locus_column("m3").unwrap().to_vec(), vec![Some(2), Some(1), Some(2)]);
    }

    #[test]
    fn sort_by_position() {
        let m = create_matrix().sorted_by_position();
        assert_eq!(m.locus_ids(), vec!["m3", "m1", "m2"]);
        assert_eq!(m.get("P1", "m3").unwrap(), Some(2));
    }

    #[test]
    fn invalid_dose() {
        let matrix = array![[Some(3)]];
        let res = GenotypeMatrix::new(vec![Locus::new("m1", "1", 1)], vec!["P1".into()], matrix);
        assert!(matches!(res, Err(Error::MalformedInput { .. })));
        assert!(parse_dose("7").is_err());
        assert_eq!(parse_dose("NA").unwrap(), None);
        assert_eq!(parse_dose("-1").unwrap(), None);
    }

    #[test]
    fn missing_metadata() {
        let res = GenotypeMatrix::from_rows(
            &[Locus::new("m1", "1", 1)],
            vec!["P1".into()],
            vec![("m2".into(), vec![Some(0)])],
        );
        assert!(matches!(res, Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn parse_space_delimited_table() {
        let text = "locus chr pos P1 P2 F1\nm1 1 10 1 0 NA\nm2 1 20  2 1 1\n";
        let m = parse_genotype_table(text.as_bytes()).unwrap();
        assert_eq!(m.nloci(), 2);
        assert_eq!(m.get("F1", "m1").unwrap(), None);
        assert_eq!(m.get("P1", "m2").unwrap(), Some(2));

        let mut out = vec![];
        write_genotype_table(&m, &mut out).unwrap();
        let again = parse_genotype_table(out.as_slice()).unwrap();
        assert_eq!(m, again);
    }

    #[test]
    fn parse_header_after_comments() {
        let text = "# exported\n\nlocus\tchr\tpos\tP1\tP2\n# note\nm1\t1\t5\t0\t1\n";
        let m = parse_genotype_table(text.as_bytes()).unwrap();
        assert_eq!(m.individuals().iter().collect::<Vec<_>>(), vec!["P1", "P2"]);
        assert_eq!(m.get("P2", "m1").unwrap(), Some(1));
        assert!(parse_genotype_table("# only\n".as_bytes()).is_err());
        assert!(parse_genotype_table("locus\tchr\tpos\n".as_bytes()).is_err());
    }
}
