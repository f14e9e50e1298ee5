//! Bragg angle → photon energy conversion for double-crystal monochromators.
//!
//! `λ = 2 d sin θ` and `E = hc / λ`, with `hc = 12.39842 keV·Å`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// `h·c` in keV·Å.
pub const HC_KEV_ANGSTROM: f64 = 12.39842;

/// Monochromator crystal reflections with tabulated d-spacings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Material {
    #[serde(rename = "Si111cryo")]
    #[value(name = "Si111cryo")]
    Si111Cryo,
    #[serde(rename = "Si220cryo")]
    #[value(name = "Si220cryo")]
    Si220Cryo,
    #[serde(rename = "Si111")]
    #[value(name = "Si111")]
    Si111,
    #[serde(rename = "Si220")]
    #[value(name = "Si220")]
    Si220,
}

impl Material {
    /// Lattice plane spacing in Å.
    pub fn d_spacing(self) -> f64 {
        match self {
            Material::Si111Cryo => 3.13029665,
            Material::Si220Cryo => 1.91692596,
            Material::Si111 => 3.1355713563754857,
            Material::Si220 => 1.9201374688016222,
        }
    }
}

/// Angle → energy conversion settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyConversion {
    pub material: Material,
    /// Overrides the material's d-spacing (Å).
    pub d_spacing: Option<f64>,
}

impl EnergyConversion {
    pub fn d(&self) -> f64 {
        self.d_spacing.unwrap_or_else(|| self.material.d_spacing())
    }

    /// Photon energy in eV for a Bragg angle in degrees (sign ignored).
    pub fn to_ev(&self, theta_deg: f64) -> Result<f64, AppError> {
        bragg_energy_kev(theta_deg, self.d()).map(|kev| kev * 1e3)
    }

    pub fn convert_all(&self, theta_deg: &[f64]) -> Result<Vec<f64>, AppError> {
        theta_deg.iter().map(|&t| self.to_ev(t)).collect()
    }
}

/// Photon energy in keV for a Bragg angle in degrees and d-spacing in Å.
pub fn bragg_energy_kev(theta_deg: f64, d_spacing: f64) -> Result<f64, AppError> {
    if !(d_spacing.is_finite() && d_spacing > 0.0) {
        return Err(AppError::usage(format!("Invalid d-spacing: {d_spacing} Å.")));
    }
    let sin = theta_deg.abs().to_radians().sin();
    if !(theta_deg.is_finite() && sin > 0.0) {
        return Err(AppError::usage(format!(
            "Bragg angle {theta_deg}° cannot be converted to energy."
        )));
    }
    Ok(HC_KEV_ANGSTROM / (2.0 * d_spacing * sin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn si111_at_30_degrees() {
        // sin(30°) = 0.5 → E = hc / d
        let e = bragg_energy_kev(30.0, Material::Si111.d_spacing()).unwrap();
        assert!((e - HC_KEV_ANGSTROM / 3.1355713563754857).abs() < 1e-12);
    }

    #[test]
    fn sign_of_angle_is_ignored() {
        let conv = EnergyConversion {
            material: Material::Si111Cryo,
            d_spacing: None,
        };
        let a = conv.to_ev(12.5).unwrap();
        let b = conv.to_ev(-12.5).unwrap();
        assert_eq!(a, b);
        assert!(a > 9_000.0 && a < 9_300.0, "{a}");
    }

    #[test]
    fn explicit_d_spacing_wins() {
        let conv = EnergyConversion {
            material: Material::Si111Cryo,
            d_spacing: Some(2.0),
        };
        assert_eq!(conv.d(), 2.0);
    }

    #[test]
    fn zero_angle_is_rejected() {
        assert!(bragg_energy_kev(0.0, 3.0).is_err());
        assert!(bragg_energy_kev(10.0, -1.0).is_err());
    }
}
