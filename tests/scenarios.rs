use rusty_redshift::catalog::{RedshiftSource, TargetCatalog};
use rusty_redshift::pipeline::transform;
use rusty_redshift::transform::{deredshift, ErrorMode, GridSpec, Resampler, UniformGrid};
use rusty_redshift::{SpectrumError, SpectrumRecord};

fn linear_record() -> SpectrumRecord {
    SpectrumRecord::new(
        "12345678",
        vec![1.0, 2.0, 3.0, 4.0, 5.0],
        vec![10.0, 20.0, 30.0, 40.0, 50.0],
        vec![1.0; 5],
    )
    .unwrap()
}

#[test]
fn grid_on_the_samples_reproduces_them() {
    let grid = UniformGrid::new(1.0, 5.0, 5).unwrap();
    let out = Resampler::new(grid).resample(&linear_record()).unwrap();
    assert_eq!(out.grid(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(out.flux(), &[10.0, 20.0, 30.0, 40.0, 50.0]);
    assert_eq!(out.error(), &[1.0; 5]);
}

#[test]
fn redshift_one_halves_wavelengths() {
    let record = linear_record();
    assert_eq!(
        deredshift(record.wavelength(), 1.0).unwrap(),
        vec![0.5, 1.0, 1.5, 2.0, 2.5]
    );

    let grid = GridSpec {
        start: 0.5,
        end: 2.5,
        num: Some(5),
    };
    let out = transform(&record, 1.0, &grid, ErrorMode::Direct).unwrap();
    assert_eq!(out.grid(), &[0.5, 1.0, 1.5, 2.0, 2.5]);
    assert_eq!(out.flux(), &[10.0, 20.0, 30.0, 40.0, 50.0]);
    assert_eq!(out.error(), &[1.0; 5]);
}

#[test]
fn non_monotonic_wavelength_is_rejected() {
    let err = SpectrumRecord::new(
        "x",
        vec![1.0, 3.0, 2.0, 4.0],
        vec![1.0; 4],
        vec![0.1; 4],
    )
    .unwrap_err();
    assert!(matches!(err, SpectrumError::NonMonotonicWavelength { index: 2 }));

    let resampler = Resampler::new(UniformGrid::new(1.0, 4.0, 4).unwrap());
    let err = resampler
        .resample_flux(&[1.0, 3.0, 2.0, 4.0], &[1.0; 4])
        .unwrap_err();
    assert!(matches!(err, SpectrumError::NonMonotonicWavelength { .. }));
}

#[test]
fn two_catalog_matches_are_ambiguous() {
    let catalog = TargetCatalog::from_csv_reader(
        "key,name,z\n12345678,first,0.01\n12345678,second,0.02\n".as_bytes(),
    )
    .unwrap();
    let err = catalog.resolve_redshift("12345678").unwrap_err();
    match err {
        SpectrumError::AmbiguousRedshift { key, matches } => {
            assert_eq!(key, "12345678");
            assert_eq!(matches, 2);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn catalog_redshift_drives_the_transform() {
    let catalog =
        TargetCatalog::from_json(r#"[{"key": "12345678", "name": "NGC 1068", "z": 1.0}]"#)
            .unwrap();
    let record = linear_record();
    let z = catalog.resolve_redshift(record.id()).unwrap();

    let grid = GridSpec {
        start: 0.5,
        end: 2.5,
        num: None,
    };
    let out = transform(&record, z, &grid, ErrorMode::Offset).unwrap();
    assert_eq!(out.len(), record.sample_count());
    assert_eq!(out.flux(), &[10.0, 20.0, 30.0, 40.0, 50.0]);
    for e in out.error() {
        assert!((e - 1.0).abs() < 1e-12);
    }
}

#[test]
fn grid_outside_the_samples_extrapolates_flat() {
    let grid = UniformGrid::new(0.0, 6.0, 7).unwrap();
    let out = Resampler::new(grid).resample(&linear_record()).unwrap();
    assert_eq!(out.flux()[0], 10.0);
    assert_eq!(out.flux()[6], 50.0);
    assert_eq!(out.flux()[3], 30.0);
}
