//! Breathing gas mixtures.

use serde::{Deserialize, Serialize};

use crate::error::GasError;

/// Allowed drift of O2 + He + N2 away from 100 %.
pub const MIX_TOLERANCE_PCT: f64 = 0.5;

/// Phase of the dive a gas is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasRole {
    Bottom,
    Deco,
}

/// Gas mix as configured in the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasMixture {
    pub role: GasRole,
    /// Planner label, e.g. `21/35` or `EAN50`
    pub label: String,
    /// Oxygen percentage (0-100)
    pub o2_pct: f64,
    /// Helium percentage (0-100)
    pub he_pct: f64,
    /// Nitrogen percentage, always the remainder
    pub n2_pct: f64,
    /// Switch depth in meters (deco gases only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_depth: Option<u32>,
}

impl GasMixture {
    /// Build a mix, deriving nitrogen from oxygen and helium.
    ///
    /// A switch depth on a bottom gas is dropped; a deco gas without one is rejected.
    pub fn new(
        role: GasRole,
        label: impl Into<String>,
        o2_pct: f64,
        he_pct: f64,
        switch_depth: Option<u32>,
    ) -> Result<Self, GasError> {
        let label = label.into();
        if !(0.0..=100.0).contains(&o2_pct) || !(0.0..=100.0).contains(&he_pct) {
            return Err(GasError::PercentOutOfRange { label });
        }
        if o2_pct + he_pct > 100.0 + MIX_TOLERANCE_PCT {
            return Err(GasError::ExceedsHundred { label });
        }
        let switch_depth = match role {
            GasRole::Bottom => None,
            GasRole::Deco => Some(switch_depth.ok_or(GasError::MissingSwitchDepth {
                label: label.clone(),
            })?),
        };

        Ok(Self {
            role,
            label,
            o2_pct,
            he_pct,
            n2_pct: (100.0 - o2_pct - he_pct).max(0.0),
            switch_depth,
        })
    }

    /// True when the three fractions add up to 100 % within tolerance.
    pub fn is_balanced(&self) -> bool {
        (self.o2_pct + self.he_pct + self.n2_pct - 100.0).abs() <= MIX_TOLERANCE_PCT
    }

    /// Line written into the `GAS CONFIGURATION` block of an amended plan.
    pub fn config_line(&self) -> String {
        let mix = format!(
            "{} ({:.0}% O2, {:.0}% He, {:.0}% N2)",
            self.label, self.o2_pct, self.he_pct, self.n2_pct
        );
        match (self.role, self.switch_depth) {
            (GasRole::Deco, Some(depth)) => format!("Deco Gas: {mix} @ {depth}m switch depth"),
            _ => format!("Bottom Gas: {mix}"),
        }
    }

    /// Argument form understood by the engine CLIs: `21/35` or `50@21`.
    pub fn engine_spec(&self) -> String {
        match (self.role, self.switch_depth) {
            (GasRole::Deco, Some(depth)) => format!("{:.0}@{}", self.o2_pct, depth),
            _ => format!("{:.0}/{:.0}", self.o2_pct, self.he_pct),
        }
    }
}

/// Bottom gas spec of a configuration (first bottom gas wins).
pub fn bottom_spec(gases: &[GasMixture]) -> Option<String> {
    gases
        .iter()
        .find(|g| g.role == GasRole::Bottom)
        .map(GasMixture::engine_spec)
}

/// Comma-joined deco gas specs in configuration order, `None` without deco gases.
pub fn deco_spec(gases: &[GasMixture]) -> Option<String> {
    let specs: Vec<String> = gases
        .iter()
        .filter(|g| g.role == GasRole::Deco)
        .map(GasMixture::engine_spec)
        .collect();
    if specs.is_empty() {
        None
    } else {
        Some(specs.join(","))
    }
}

/// Parse a file-name gas token (`21-35`, `EAN32`, `O2`) into a mix.
///
/// Deco tokens get the planner's default switch depths: 21 m for nitrox,
/// 6 m for oxygen.
pub fn from_name_token(token: &str, role: GasRole) -> Option<GasMixture> {
    let upper = token.to_ascii_uppercase();
    let (o2, he) = if let Some(rest) = upper.strip_prefix("EAN") {
        (rest.parse::<f64>().ok()?, 0.0)
    } else if upper.starts_with("O2") {
        (99.0, 0.0)
    } else if let Some((o2, he)) = upper.split_once(['-', '/']) {
        (o2.parse::<f64>().ok()?, he.parse::<f64>().ok()?)
    } else {
        return None;
    };
    let switch = match role {
        GasRole::Bottom => None,
        GasRole::Deco if o2 >= 99.0 => Some(6),
        GasRole::Deco => Some(21),
    };
    GasMixture::new(role, token, o2, he, switch).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimix_is_balanced() {
        let gas = GasMixture::new(GasRole::Bottom, "8/85", 8.0, 85.0, None).unwrap();
        assert_eq!(gas.n2_pct, 7.0);
        assert!(gas.is_balanced());
    }

    #[test]
    fn test_bottom_gas_drops_switch_depth() {
        let gas = GasMixture::new(GasRole::Bottom, "21/35", 21.0, 35.0, Some(100)).unwrap();
        assert_eq!(gas.switch_depth, None);
    }

    #[test]
    fn test_deco_gas_requires_switch_depth() {
        let result = GasMixture::new(GasRole::Deco, "EAN50", 50.0, 0.0, None);
        assert!(matches!(result, Err(GasError::MissingSwitchDepth { .. })));
    }

    #[test]
    fn test_fractions_exceeding_hundred() {
        let result = GasMixture::new(GasRole::Bottom, "bad", 60.0, 50.0, None);
        assert!(matches!(result, Err(GasError::ExceedsHundred { .. })));
    }

    #[test]
    fn test_config_lines() {
        let bottom = GasMixture::new(GasRole::Bottom, "21/35", 21.0, 35.0, None).unwrap();
        let deco = GasMixture::new(GasRole::Deco, "EAN50", 50.0, 0.0, Some(21)).unwrap();
        assert_eq!(bottom.config_line(), "Bottom Gas: 21/35 (21% O2, 35% He, 44% N2)");
        assert_eq!(
            deco.config_line(),
            "Deco Gas: EAN50 (50% O2, 0% He, 50% N2) @ 21m switch depth"
        );
    }

    #[test]
    fn test_engine_specs() {
        let gases = vec![
            GasMixture::new(GasRole::Bottom, "8/85", 8.0, 85.0, None).unwrap(),
            GasMixture::new(GasRole::Deco, "EAN18", 18.0, 0.0, Some(21)).unwrap(),
            GasMixture::new(GasRole::Deco, "EAN99", 99.0, 0.0, Some(6)).unwrap(),
        ];
        assert_eq!(bottom_spec(&gases).as_deref(), Some("8/85"));
        assert_eq!(deco_spec(&gases).as_deref(), Some("18@21,99@6"));
        assert_eq!(deco_spec(&gases[..1]), None);
    }

    #[test]
    fn test_name_tokens() {
        let ean = from_name_token("EAN32", GasRole::Bottom).unwrap();
        assert_eq!((ean.o2_pct, ean.he_pct), (32.0, 0.0));

        let trimix = from_name_token("21-35", GasRole::Bottom).unwrap();
        assert_eq!((trimix.o2_pct, trimix.he_pct), (21.0, 35.0));

        let oxygen = from_name_token("O2", GasRole::Deco).unwrap();
        assert_eq!(oxygen.engine_spec(), "99@6");

        assert!(from_name_token("GF40", GasRole::Deco).is_none());
    }
}
