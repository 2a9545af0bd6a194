mod common;

use color_eyre::Result;

use lmtk::adapters::asmap::{congruence_matrix, flag_clones, Asmap, CLONE_THRESHOLD};
use lmtk::adapters::backcross::{Backcross, BackcrossOptions};
use lmtk::adapters::carthagene::CarthaGene;
use lmtk::adapters::{Adapter, CallMatrix};
use lmtk::segregation::Parent;

fn round_trip<A: Adapter>(adapter: &A) -> Result<Vec<CallMatrix>> {
    let table = common::create_test_table()?;
    let matrices = adapter.encode(&table)?;

    let mut again = vec![];
    for matrix in matrices.iter() {
        let mut out = vec![];
        adapter.write(matrix, &mut out)?;
        let read = adapter.read(out.as_slice(), matrix.parent)?;

        assert_eq!(read.locus_ids(), matrix.locus_ids(), "{} {}", adapter.name(), matrix.parent);
        assert_eq!(read.individuals, matrix.individuals);
        assert_eq!(read.calls, matrix.calls);
        again.push(read);
    }
    Ok(again)
}

#[test]
fn backcross_round_trip() -> Result<()> {
    let matrices = round_trip(&Backcross::default())?;
    assert_eq!(matrices[0].locus_ids(), vec!["m1", "m2", "m8"]);
    assert_eq!(matrices[1].locus_ids(), vec!["m3", "m6"]);
    assert_eq!(matrices[0].loci[2].chromosome, "10");
    Ok(())
}

#[test]
fn backcross_with_hkxhk() -> Result<()> {
    let adapter = Backcross {
        options: BackcrossOptions { include_hkxhk: true, ..Default::default() },
        ..Default::default()
    };
    let matrices = round_trip(&adapter)?;
    assert_eq!(matrices[0].locus_ids(), vec!["m1", "m2", "m4", "m8"]);
    assert_eq!(matrices[1].locus_ids(), vec!["m3", "m4", "m6"]);
    Ok(())
}

#[test]
fn carthagene_round_trip() -> Result<()> {
    let adapter = CarthaGene {
        individuals: common::OFFSPRING.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    let matrices = round_trip(&adapter)?;
    assert_eq!(matrices[0].nindividuals(), 8);
    Ok(())
}

#[test]
fn asmap_round_trip() -> Result<()> {
    round_trip(&Asmap::default())?;

    let table = common::create_test_table()?;
    let adapter = Asmap { maf: 0.45, ..Default::default() };
    let (matrices, dropped) = adapter.encode_filtered(&table)?;
    assert_eq!(matrices.p1.nloci() + dropped[0], 3);
    assert_eq!(matrices.p2.nloci() + dropped[1], 2);
    Ok(())
}

#[test]
fn clones_in_cross() -> Result<()> {
    let table = common::create_test_table()?;
    let matrices = Asmap::default().encode(&table)?;
    let p1 = matrices.get(Parent::P1);

    let congruence = congruence_matrix(p1)?;
    assert!(congruence.is_symmetric());
    assert_eq!(congruence.get("F1", "F4")?.value(), Some(1.0));
    assert_eq!(congruence.get("F1", "F2")?.value(), Some(0.0));

    let clones = flag_clones(&congruence, CLONE_THRESHOLD);
    assert!(clones.iter().any(|c| c.first == "F1" && c.second == "F4"));
    assert!(!clones.iter().any(|c| c.first == "F1" && c.second == "F2"));
    Ok(())
}
