//! Canonical test-case records and their typed identity.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::gas::{GasMixture, GasRole};

/// Tag marking a case whose last decompression stop is at 6 m.
pub const SIX_METER_TAG: &str = "6mlast";

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GF\d+_\d+|VPM\d+").expect("marker pattern"));

static STEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<depth>\d+)m(?P<time>\d+)min(?:_(?P<gases>.+?))?_(?P<six>6mlast_)?(?:GF(?P<lo>\d+)_(?P<hi>\d+)|VPM(?P<vpm>\d+))$",
    )
    .expect("stem pattern")
});

/// Decompression algorithm a case was captured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Buhlmann,
    #[serde(rename = "VPM-B")]
    VpmB,
}

impl Algorithm {
    /// Test-case directory, relative to the test-case root.
    pub fn category_dir(self) -> &'static str {
        match self {
            Self::Buhlmann => "Open_Circuit/Buhlmann",
            Self::VpmB => "Open_Circuit/VPM",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buhlmann => write!(f, "Buhlmann"),
            Self::VpmB => write!(f, "VPM-B"),
        }
    }
}

/// Algorithm-specific conservatism setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conservatism {
    GradientFactors { low: u8, high: u8 },
    Vpm { level: u8 },
}

impl Conservatism {
    pub fn algorithm(self) -> Algorithm {
        match self {
            Self::GradientFactors { .. } => Algorithm::Buhlmann,
            Self::Vpm { .. } => Algorithm::VpmB,
        }
    }

    /// Token used in file names: `GF40_85` or `VPM2`.
    pub fn marker(self) -> String {
        match self {
            Self::GradientFactors { low, high } => format!("GF{low}_{high}"),
            Self::Vpm { level } => format!("VPM{level}"),
        }
    }

    /// The two trailing engine arguments.
    pub fn engine_params(self, vpm_second_param: u8) -> (u8, u8) {
        match self {
            Self::GradientFactors { low, high } => (low, high),
            Self::Vpm { level } => (level, vpm_second_param),
        }
    }
}

impl fmt::Display for Conservatism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GradientFactors { low, high } => write!(f, "GF{low}/{high}"),
            Self::Vpm { level } => write!(f, "VPM+{level}"),
        }
    }
}

/// Shallowest stop before surfacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LastStop {
    #[default]
    #[serde(rename = "3m")]
    Three,
    #[serde(rename = "6m")]
    Six,
}

impl LastStop {
    pub fn depth_m(self) -> u32 {
        match self {
            Self::Three => 3,
            Self::Six => 6,
        }
    }

    pub fn from_depth(depth_m: u32) -> Option<Self> {
        match depth_m {
            3 => Some(Self::Three),
            6 => Some(Self::Six),
            _ => None,
        }
    }
}

impl fmt::Display for LastStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.depth_m())
    }
}

/// Decompression stop (or bottom segment) in a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Stop depth in meters
    pub depth_m: f64,
    /// Stop duration in minutes
    pub duration_min: f64,
}

impl Stop {
    pub fn new(depth_m: f64, duration_min: f64) -> Self {
        Self { depth_m, duration_min }
    }
}

/// Identity of a test case, independent of any text rendering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseKey {
    pub depth_m: u32,
    pub bottom_time_min: u32,
    pub conservatism: Conservatism,
    pub last_stop: LastStop,
    /// Gas segment of the planner file name, e.g. `21-35_EAN50`
    #[serde(default)]
    pub gas_label: String,
}

impl CaseKey {
    pub fn algorithm(&self) -> Algorithm {
        self.conservatism.algorithm()
    }

    /// Canonical file stem: `51m25min_21-35_EAN50_6mlast_GF40_85`.
    pub fn file_stem(&self) -> String {
        let mut stem = format!("{}m{}min_", self.depth_m, self.bottom_time_min);
        if !self.gas_label.is_empty() {
            stem.push_str(&self.gas_label);
            stem.push('_');
        }
        if self.last_stop == LastStop::Six {
            stem.push_str(SIX_METER_TAG);
            stem.push('_');
        }
        stem.push_str(&self.conservatism.marker());
        stem
    }

    /// Parse a canonical (or planner-generated) stem back into a key.
    pub fn parse_stem(stem: &str) -> Option<Self> {
        let caps = STEM_RE.captures(stem)?;
        let conservatism = match (caps.name("lo"), caps.name("hi"), caps.name("vpm")) {
            (Some(lo), Some(hi), _) => Conservatism::GradientFactors {
                low: lo.as_str().parse().ok()?,
                high: hi.as_str().parse().ok()?,
            },
            (_, _, Some(level)) => Conservatism::Vpm {
                level: level.as_str().parse().ok()?,
            },
            _ => return None,
        };
        Some(Self {
            depth_m: caps["depth"].parse().ok()?,
            bottom_time_min: caps["time"].parse().ok()?,
            conservatism,
            last_stop: if caps.name("six").is_some() {
                LastStop::Six
            } else {
                LastStop::Three
            },
            gas_label: caps
                .name("gases")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }

    /// Short human label: `51m/25min VPM+2 (6m last)`.
    pub fn label(&self) -> String {
        let mut label = format!(
            "{}m/{}min {}",
            self.depth_m, self.bottom_time_min, self.conservatism
        );
        if self.last_stop == LastStop::Six {
            label.push_str(" (6m last)");
        }
        label
    }
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// Insert the 6 m tag right before the algorithm marker of a free-form stem,
/// or append it when no marker is present. Never duplicates the tag.
pub fn insert_last_stop_tag(stem: &str) -> String {
    if stem.contains(SIX_METER_TAG) {
        return stem.to_string();
    }
    match MARKER_RE.find(stem) {
        Some(marker) => format!(
            "{}{}_{}",
            &stem[..marker.start()],
            SIX_METER_TAG,
            &stem[marker.start()..]
        ),
        None => format!("{stem}_{SIX_METER_TAG}"),
    }
}

/// One source artifact a case was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArtifact {
    pub file_name: String,
    /// `sha256:<hex>` of the artifact as read
    pub digest: String,
}

impl SourceArtifact {
    pub fn new(file_name: impl Into<String>, content: &str) -> Self {
        Self {
            file_name: file_name.into(),
            digest: sha256_hex(content),
        }
    }
}

/// Compute SHA256 hash of input string.
pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    format!("sha256:{}", hex::encode(digest))
}

/// Broken record invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaseInvariant {
    #[error("depth and bottom time must be positive")]
    NonPositiveProfile,
    #[error("deco time {0} min but the schedule is empty")]
    MissingSchedule(f64),
    #[error("gas {0} does not add up to 100%")]
    UnbalancedGas(String),
    #[error("no bottom gas")]
    NoBottomGas,
}

/// Canonical, persisted regression test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiveTestCase {
    pub key: CaseKey,
    /// Configuration order
    pub gases: Vec<GasMixture>,
    pub expected_runtime: f64,
    pub expected_deco_time: f64,
    pub schedule: Vec<Stop>,
    pub provenance: Vec<SourceArtifact>,
}

impl DiveTestCase {
    pub fn algorithm(&self) -> Algorithm {
        self.key.algorithm()
    }

    pub fn depth_m(&self) -> u32 {
        self.key.depth_m
    }

    pub fn bottom_time_min(&self) -> u32 {
        self.key.bottom_time_min
    }

    pub fn conservatism(&self) -> Conservatism {
        self.key.conservatism
    }

    pub fn last_stop(&self) -> LastStop {
        self.key.last_stop
    }

    /// Check the record invariants that hold for every persisted case.
    pub fn check(&self) -> Result<(), CaseInvariant> {
        if self.key.depth_m == 0 || self.key.bottom_time_min == 0 {
            return Err(CaseInvariant::NonPositiveProfile);
        }
        if self.expected_deco_time > 0.0 && self.schedule.is_empty() {
            return Err(CaseInvariant::MissingSchedule(self.expected_deco_time));
        }
        if !self.gases.iter().any(|g| g.role == GasRole::Bottom) {
            return Err(CaseInvariant::NoBottomGas);
        }
        if let Some(gas) = self.gases.iter().find(|g| !g.is_balanced()) {
            return Err(CaseInvariant::UnbalancedGas(gas.label.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(conservatism: Conservatism, last_stop: LastStop) -> CaseKey {
        CaseKey {
            depth_m: 51,
            bottom_time_min: 25,
            conservatism,
            last_stop,
            gas_label: "21-35_EAN50".to_string(),
        }
    }

    #[test]
    fn test_file_stem_places_tag_before_marker() {
        let gf = Conservatism::GradientFactors { low: 40, high: 85 };
        assert_eq!(key(gf, LastStop::Three).file_stem(), "51m25min_21-35_EAN50_GF40_85");
        assert_eq!(
            key(gf, LastStop::Six).file_stem(),
            "51m25min_21-35_EAN50_6mlast_GF40_85"
        );
        let vpm = Conservatism::Vpm { level: 2 };
        assert_eq!(key(vpm, LastStop::Six).file_stem(), "51m25min_21-35_EAN50_6mlast_VPM2");
    }

    #[test]
    fn test_parse_stem_inverts_file_stem() {
        let original = key(Conservatism::Vpm { level: 3 }, LastStop::Six);
        let parsed = CaseKey::parse_stem(&original.file_stem()).unwrap();
        assert_eq!(parsed, original);

        let bare = CaseKey::parse_stem("100m25min_GF40_85").unwrap();
        assert_eq!(bare.gas_label, "");
        assert_eq!(bare.last_stop, LastStop::Three);
        assert_eq!(bare.algorithm(), Algorithm::Buhlmann);

        assert!(CaseKey::parse_stem("decoplanner_debug_2025").is_none());
    }

    #[test]
    fn test_insert_tag_is_idempotent() {
        let once = insert_last_stop_tag("51m25min_21-35_EAN50_GF40_85");
        assert_eq!(once, "51m25min_21-35_EAN50_6mlast_GF40_85");
        assert_eq!(insert_last_stop_tag(&once), once);
    }

    #[test]
    fn test_insert_tag_without_marker_appends() {
        assert_eq!(insert_last_stop_tag("51m25min_custom"), "51m25min_custom_6mlast");
        assert_eq!(insert_last_stop_tag("51m25min_VPM2"), "51m25min_6mlast_VPM2");
    }

    #[test]
    fn test_conservatism_display_and_order() {
        let gf = Conservatism::GradientFactors { low: 40, high: 85 };
        assert_eq!(gf.to_string(), "GF40/85");
        assert_eq!(Conservatism::Vpm { level: 4 }.to_string(), "VPM+4");
        assert!(Conservatism::Vpm { level: 1 } < Conservatism::Vpm { level: 2 });
        assert_eq!(Conservatism::Vpm { level: 2 }.engine_params(85), (2, 85));
    }

    #[test]
    fn test_deco_case_requires_schedule() {
        let case = DiveTestCase {
            key: key(Conservatism::Vpm { level: 2 }, LastStop::Three),
            gases: vec![],
            expected_runtime: 54.7,
            expected_deco_time: 24.0,
            schedule: vec![],
            provenance: vec![],
        };
        assert_eq!(case.check(), Err(CaseInvariant::MissingSchedule(24.0)));
    }

    #[test]
    fn test_case_requires_bottom_gas() {
        let mut case = DiveTestCase {
            key: key(Conservatism::Vpm { level: 2 }, LastStop::Three),
            gases: vec![GasMixture::new(GasRole::Deco, "EAN50", 50.0, 0.0, Some(21)).unwrap()],
            expected_runtime: 30.0,
            expected_deco_time: 0.0,
            schedule: vec![],
            provenance: vec![],
        };
        assert_eq!(case.check(), Err(CaseInvariant::NoBottomGas));

        case.gases.insert(0, GasMixture::new(GasRole::Bottom, "21/35", 21.0, 35.0, None).unwrap());
        assert_eq!(case.check(), Ok(()));
    }

    #[test]
    fn test_source_digest() {
        let source = SourceArtifact::new("plan.txt", "Total Runtime: 1 min");
        assert!(source.digest.starts_with("sha256:"));
        assert_eq!(source.digest.len(), 7 + 64);
    }
}
