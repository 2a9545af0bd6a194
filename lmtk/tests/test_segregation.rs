mod common;

use color_eyre::Result;

use lmtk::error::Error;
use lmtk::segregation::{encode, read_joinmap, write_joinmap, SegregationType, SymbolAliases};

#[test]
fn encoder_summary() -> Result<()> {
    let table = common::create_test_table()?;
    insta::assert_yaml_snapshot!(table.summary, @r###"
    ---
    input_loci: 8
    encoded: 6
    non_segregating: 1
    missing_parent: 1
    inconsistent_calls: 1
    "###);
    assert_eq!(table.summary.dropped(), 2);
    Ok(())
}

#[test]
fn segregation_types() -> Result<()> {
    let table = common::create_test_table()?;
    assert_eq!(table.locus_ids(), vec!["m1", "m2", "m3", "m4", "m6", "m8"]);
    assert_eq!(table.offspring, common::OFFSPRING);

    let counts: Vec<(SegregationType, usize)> = table.type_counts().into_iter().filter(|(_, n)| *n > 0).collect();
    assert_eq!(
        counts,
        vec![(SegregationType::Hkxhk, 1), (SegregationType::Lmxll, 3), (SegregationType::Nnxnp, 2)]
    );

    let m6 = table.get("m6").unwrap();
    assert_eq!(m6.seg_type, SegregationType::Nnxnp);
    assert_eq!(m6.offspring[4], None);
    assert!(table.calls.iter().all(|c| c.phase.is_none()));

    let m8 = table.get("m8").unwrap();
    assert_eq!(m8.offspring.iter().filter(|c| c.is_none()).count(), 1);
    Ok(())
}

#[test]
fn parent_selection() -> Result<()> {
    let matrix = common::create_test_matrix()?;

    let res = encode(&matrix, &["P1"], &SymbolAliases::default());
    assert!(matches!(res, Err(Error::IncompatibleParentCount { found: 1 })));

    let res = encode(&matrix, &["P1", "P9"], &SymbolAliases::default());
    assert!(res.is_err());
    Ok(())
}

#[test]
fn alias_collides_with_alleles() -> Result<()> {
    let matrix = common::create_test_matrix()?;
    let aliases = SymbolAliases { missing: '0', ..Default::default() };
    let res = encode(&matrix, &common::PARENTS, &aliases);
    assert!(matches!(res, Err(Error::UnknownSymbolAlias { alias: '0', .. })));
    Ok(())
}

#[test]
fn joinmap_file_round_trip() -> Result<()> {
    let table = common::create_test_table()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pop.loc");

    write_joinmap(&table, std::fs::File::create(&path)?)?;
    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("nloc = 6"));
    assert!(text.contains("nind = 8"));

    let parents = [String::from("P1"), String::from("P2")];
    let again = read_joinmap(text.as_bytes(), parents, &SymbolAliases::default())?;
    assert_eq!(again.locus_ids(), table.locus_ids());
    assert_eq!(again.offspring, table.offspring);
    for (a, b) in again.calls.iter().zip(table.calls.iter()) {
        assert_eq!(a.seg_type, b.seg_type);
        assert_eq!(a.offspring, b.offspring);
    }
    Ok(())
}
