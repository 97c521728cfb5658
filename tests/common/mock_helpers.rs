//! Mock construction helpers

use hp3582_control::backend::{Analyzer, SettlePolicy, SimulatedAnalyzer};
use hp3582_control::config::AppConfig;
use hp3582_control::types::Channel;

/// Analyzer over a simulator with the given input amplitudes and no settle delays
///
/// The returned simulator shares state with the one inside the analyzer.
pub fn simulated_analyzer(a_volts: f64, b_volts: f64) -> (Analyzer, SimulatedAnalyzer) {
    let sim = SimulatedAnalyzer::new()
        .with_signal(Channel::A, a_volts)
        .with_signal(Channel::B, b_volts);
    let analyzer = Analyzer::with_transport(Box::new(sim.clone()), SettlePolicy::instant());
    (analyzer, sim)
}

/// Default config with both settle times zeroed
pub fn instant_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.timing.command_settle_ms = 0;
    config.timing.sweep_settle_ms = 0;
    config
}

/// Sensitivity levels that appear in `AS`/`BS` arguments of `history`
pub fn sent_sensitivities(history: &[String]) -> Vec<u32> {
    let mut levels = Vec::new();
    for line in history {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i + 2 <= bytes.len() {
            if &bytes[i..i + 2] == b"AS" || &bytes[i..i + 2] == b"BS" {
                let digits: String = line[i + 2..]
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect();
                if let Ok(level) = digits.parse() {
                    levels.push(level);
                }
                i += 2 + digits.len();
            } else {
                i += 1;
            }
        }
    }
    levels
}
