//! Line-level pattern tables used by the report parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{GasMixture, GasRole, LastStop, Stop};

use super::Field;

const NUMBER: &str = r"([0-9]+(?:\.[0-9]+)?)";

/// Scalar field patterns. A field may have several phrasings; the first
/// line matching any of them wins.
pub(super) static FIELD_PATTERNS: LazyLock<Vec<(Field, Regex)>> = LazyLock::new(|| {
    let table = [
        (
            Field::Runtime,
            format!(r"(?i)\b(?:total runtime|total run time|final runtime):\s*{NUMBER}\s*min"),
        ),
        (
            Field::DecoTime,
            format!(r"(?i)\b(?:total deco duration|total deco time):\s*{NUMBER}\s*min"),
        ),
        (
            Field::GradientFactors,
            r"(?i)\bgradient factors:\s*([0-9]+)\s*/\s*([0-9]+)".to_string(),
        ),
        (
            Field::VpmConservatism,
            r"(?i)^(?:vpm )?conservatism:\s*\+?([0-9]+)".to_string(),
        ),
        (Field::Depth, r"(?i)^(?:max(?:imum)? )?depth:\s*([0-9]+)\s*m\b".to_string()),
        (Field::BottomTime, r"(?i)^bottom time:\s*([0-9]+)\s*min".to_string()),
    ];
    table
        .into_iter()
        .map(|(field, pattern)| (field, Regex::new(&pattern).expect("field pattern")))
        .collect()
});

/// Last-stop phrasings and the depth each implies, checked on every line.
const LAST_STOP_PHRASES: [(&str, LastStop); 6] = [
    ("Last Stop 6m: true", LastStop::Six),
    ("Last Stop: 6m", LastStop::Six),
    ("6m last stop", LastStop::Six),
    ("Last Stop 6m: false", LastStop::Three),
    ("Last Stop: 3m", LastStop::Three),
    ("3m last stop", LastStop::Three),
];

/// The phrases as whole-word patterns, so `16m last stop` and `Last Stop: 6m5`
/// do not count.
pub(super) static LAST_STOP_PATTERNS: LazyLock<Vec<(&'static str, LastStop, Regex)>> =
    LazyLock::new(|| {
        LAST_STOP_PHRASES
            .into_iter()
            .map(|(phrase, implies)| {
                let regex = Regex::new(&format!(r"\b{}\b", regex::escape(phrase)))
                    .expect("last stop pattern");
                (phrase, implies, regex)
            })
            .collect()
    });

static STOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{NUMBER}\s*m for {NUMBER} min")).expect("stop pattern")
});

static DEBUG_GAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Gas\s*[0-9]*\s*:\s*(?P<label>[^(]*?)\s*\((?P<details>[^)]*)\)")
        .expect("debug gas pattern")
});

static O2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"O2={NUMBER}%")).expect("o2 pattern"));
static HE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"He={NUMBER}%")).expect("he pattern"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Type=(1|2|bottom|deco)\b").expect("type pattern"));
static SWITCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Switch=([0-9]+)m").expect("switch pattern"));

static CONFIG_GAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<role>Bottom|Deco) Gas:\s*(?P<label>.+?)\s*\({NUMBER}% O2,\s*{NUMBER}% He(?:,\s*{NUMBER}% N2)?\)(?:\s*@\s*(?P<switch>[0-9]+)m)?"
    ))
    .expect("config gas pattern")
});

/// Section a header line opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Section {
    Preamble,
    Schedule,
    Gases,
    GasConfiguration,
    Other,
}

/// Recognize a section header: `=== NAME ===` banners and bare `Title:` lines.
pub(super) fn section_header(line: &str) -> Option<Section> {
    if line.len() > 6 && line.starts_with("===") && line.ends_with("===") {
        let name = line.trim_matches('=').trim().to_ascii_uppercase();
        return Some(match name.as_str() {
            "DECOMPRESSION SCHEDULE" => Section::Schedule,
            "GASES" => Section::Gases,
            "GAS CONFIGURATION" => Section::GasConfiguration,
            _ => Section::Other,
        });
    }

    let title = line.strip_suffix(':')?;
    if title.is_empty() || title.contains(':') {
        return None;
    }
    if !title.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
        return None;
    }
    Some(match title.to_ascii_lowercase().as_str() {
        "decompression schedule" => Section::Schedule,
        "gases" => Section::Gases,
        "gas configuration" => Section::GasConfiguration,
        _ => Section::Other,
    })
}

/// `24m for 2 min`
pub(super) fn parse_stop_line(line: &str) -> Option<Stop> {
    let caps = STOP_RE.captures(line)?;
    Some(Stop::new(caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// `   27    |      0.33 |   27.33 | 21/35` (header and separator rows yield nothing)
pub(super) fn parse_pipe_row(line: &str) -> Option<Stop> {
    let mut cells = line.split('|').map(str::trim);
    let depth = cells.next()?.parse::<f64>().ok()?;
    let duration = cells.next()?.parse::<f64>().ok()?;
    cells.next()?;
    Some(Stop::new(depth, duration))
}

/// `Gas 0: 8/85 (O2=8.0%, He=85.0%, Type=1, Switch=100m)`
pub(super) fn parse_debug_gas(line: &str) -> Result<GasMixture, String> {
    let caps = DEBUG_GAS_RE
        .captures(line)
        .ok_or_else(|| "unrecognized gas line".to_string())?;
    let details = &caps["details"];
    let role = match TYPE_RE.captures(details) {
        Some(t) => match t[1].to_ascii_lowercase().as_str() {
            "1" | "bottom" => GasRole::Bottom,
            _ => GasRole::Deco,
        },
        None => return Err("no gas type marker".to_string()),
    };
    let o2 = capture_number(&O2_RE, details).ok_or_else(|| "no O2 fraction".to_string())?;
    let he = capture_number(&HE_RE, details).ok_or_else(|| "no He fraction".to_string())?;
    let switch = SWITCH_RE
        .captures(details)
        .and_then(|c| c[1].parse::<u32>().ok());

    GasMixture::new(role, caps["label"].trim(), o2, he, switch).map_err(|e| e.to_string())
}

/// `Deco Gas: EAN50 (50% O2, 0% He, 50% N2) @ 21m switch depth`
pub(super) fn parse_config_gas(line: &str) -> Result<GasMixture, String> {
    let caps = CONFIG_GAS_RE
        .captures(line)
        .ok_or_else(|| "unrecognized gas configuration line".to_string())?;
    let role = if &caps["role"] == "Bottom" {
        GasRole::Bottom
    } else {
        GasRole::Deco
    };
    let o2 = caps[3].parse::<f64>().map_err(|e| e.to_string())?;
    let he = caps[4].parse::<f64>().map_err(|e| e.to_string())?;
    let switch = caps.name("switch").and_then(|m| m.as_str().parse().ok());

    GasMixture::new(role, &caps["label"], o2, he, switch).map_err(|e| e.to_string())
}

fn capture_number(re: &Regex, haystack: &str) -> Option<f64> {
    re.captures(haystack)?.get(1)?.as_str().parse().ok()
}
