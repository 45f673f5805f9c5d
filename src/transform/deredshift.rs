use crate::data::model::SpectrumRecord;
use crate::error::{Result, SpectrumError};

/// Accept only finite `z > -1`.
pub fn check_redshift(z: f64) -> Result<f64> {
    if z.is_finite() && z > -1.0 {
        Ok(z)
    } else {
        Err(SpectrumError::InvalidRedshift { z })
    }
}

/// Observed-frame to rest-frame: `wave[i] / (1 + z)`.
pub fn deredshift(wave: &[f64], z: f64) -> Result<Vec<f64>> {
    let scale = 1.0 + check_redshift(z)?;
    Ok(wave.iter().map(|w| w / scale).collect())
}

/// Rest-frame copy of `record`; flux, error, id and metadata are carried
/// over unchanged.
pub fn deredshift_record(record: &SpectrumRecord, z: f64) -> Result<SpectrumRecord> {
    let restwave = deredshift(record.wavelength(), z)?;
    record.with_wavelength(restwave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_at_z_one() {
        assert_eq!(
            deredshift(&[1.0, 2.0, 3.0, 4.0, 5.0], 1.0).unwrap(),
            vec![0.5, 1.0, 1.5, 2.0, 2.5]
        );
    }

    #[test]
    fn rejects_non_physical_redshift() {
        for z in [-1.0, -2.5, f64::NAN, f64::INFINITY] {
            let err = deredshift(&[1.0, 2.0], z).unwrap_err();
            assert!(matches!(err, SpectrumError::InvalidRedshift { .. }));
        }
    }

    #[test]
    fn blueshift_is_allowed() {
        let rest = deredshift(&[1.0, 2.0], -0.5).unwrap();
        assert_eq!(rest, vec![2.0, 4.0]);
    }

    #[test]
    fn record_keeps_flux_and_id() {
        let rec = SpectrumRecord::new("12345678", vec![2.0, 4.0], vec![1.0, 2.0], vec![0.1, 0.2])
            .unwrap();
        let rest = deredshift_record(&rec, 1.0).unwrap();
        assert_eq!(rest.id(), "12345678");
        assert_eq!(rest.wavelength(), &[1.0, 2.0]);
        assert_eq!(rest.flux(), rec.flux());
        assert_eq!(rest.error(), rec.error());
        // the input is untouched
        assert_eq!(rec.wavelength(), &[2.0, 4.0]);
    }
}
