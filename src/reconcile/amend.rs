//! One-time content amendment of a plan report.

use crate::models::GasMixture;

use super::last_stop::LastStopDecision;
use super::SourceReport;

const GAS_CONFIGURATION_HEADER: &str = "=== GAS CONFIGURATION ===";

/// Rewrite a plan report so it carries its own last-stop and gas metadata.
///
/// `Last Stop:` plus a provenance comment go right after the first
/// algorithm/conservatism line; the gas block goes right after the deco
/// duration line. Each is skipped when the text already has it.
pub fn amend_plan(
    plan: &SourceReport,
    decision: &LastStopDecision,
    debug_name: &str,
    gases: &[GasMixture],
) -> String {
    let plan_text = plan.text.as_str();
    let mut out: Vec<String> = Vec::new();
    let mut last_stop_added = plan_text.lines().any(|l| l.contains("Last Stop:"));
    let mut gas_block_added = plan.raw.has_gas_configuration;

    for line in plan_text.lines() {
        out.push(line.to_string());

        if !last_stop_added && (line.contains("Gradient Factors:") || line.contains("VPM Conservatism:"))
        {
            out.push(format!("Last Stop: {}", decision.last_stop));
            out.push(format!("# Last stop from {debug_name}: {decision}"));
            last_stop_added = true;
        }

        if !gas_block_added && line.contains("Total Deco Duration:") {
            out.push(String::new());
            out.push(GAS_CONFIGURATION_HEADER.to_string());
            if gases.is_empty() {
                out.push("# Gas configuration could not be extracted".to_string());
            } else {
                out.extend(gases.iter().map(GasMixture::config_line));
            }
            gas_block_added = true;
        }
    }

    let mut amended = out.join("\n");
    if plan_text.ends_with('\n') {
        amended.push('\n');
    }
    amended
}
