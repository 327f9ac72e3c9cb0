//! Pulling a decision out of oracle free text.

use serde::Deserialize;

use surgegate_core::Scenario;

/// A decision object as the oracle wrote it, before range checks.
///
/// Missing numeric fields default during validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDecision {
    pub action: String,
    pub new_rps: Option<f64>,
    pub new_burst: Option<f64>,
    pub confidence: Option<f64>,
    pub reason: Option<String>,
}

/// Wire shape of a candidate object. Unknown fields are ignored.
#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    new_rps: Option<f64>,
    #[serde(default)]
    new_burst: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

impl Candidate {
    /// An object with none of the decision fields is some other object.
    fn into_decision(self) -> Option<RawDecision> {
        if self.action.is_none() && self.new_rps.is_none() && self.new_burst.is_none() && self.confidence.is_none() {
            return None;
        }
        Some(RawDecision {
            action: self.action.unwrap_or_else(|| "same".to_string()),
            new_rps: self.new_rps,
            new_burst: self.new_burst,
            confidence: self.confidence,
            reason: self.reason,
        })
    }
}

/// Find the first well-formed decision object in `text`.
///
/// Every `{` is tried as the start of a JSON value; the first one that
/// decodes and carries at least one decision field wins. A missing
/// `action` reads as `same`. Text around the object is ignored.
pub fn extract_decision(text: &str) -> Option<RawDecision> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Candidate>()
            .next()
            .and_then(Result::ok)
            .and_then(Candidate::into_decision)
    })
}

/// Degraded path: infer a direction from prose when no decision object
/// could be decoded.
///
/// Scaling is fixed per scenario (×3 ddos, ×2 surge, ×1.5 otherwise for
/// `up`; ×0.8 for `down`), capped at 100 RPS, burst three times the rate,
/// confidence pinned at the 0.5 floor. Returns `None` when the text names
/// no direction.
pub fn extract_intent(text: &str, current_rps: f64, scenario: Scenario) -> Option<RawDecision> {
    let lower = text.to_ascii_lowercase();
    let has_word = |words: &[&str]| {
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| words.contains(&token))
    };

    let (action, factor) = if has_word(&["up", "increase", "scale"]) {
        let factor = match scenario {
            Scenario::Ddos => 3.0,
            Scenario::Surge => 2.0,
            _ => 1.5,
        };
        ("up", factor)
    } else if has_word(&["down", "decrease"]) {
        ("down", 0.8)
    } else {
        return None;
    };

    let new_rps = (current_rps * factor).min(100.0);
    Some(RawDecision {
        action: action.to_string(),
        new_rps: Some(new_rps),
        new_burst: Some((new_rps * 3.0).trunc()),
        confidence: Some(0.5),
        reason: Some(format!("{scenario}_intent_extracted")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_parses() {
        let raw = extract_decision(
            r#"{"action":"up","new_rps":25,"new_burst":75,"confidence":0.9}"#,
        )
        .unwrap();
        assert_eq!(raw.action, "up");
        assert_eq!(raw.new_rps, Some(25.0));
        assert_eq!(raw.new_burst, Some(75.0));
        assert_eq!(raw.confidence, Some(0.9));
        assert_eq!(raw.reason, None);
    }

    #[test]
    fn surrounding_text_is_ignored() {
        let text = "Sure! Here is my answer:\n```json\n{\"action\": \"down\", \"new_rps\": 4.0, \"reason\": \"idle\"}\n```\nLet me know.";
        let raw = extract_decision(text).unwrap();
        assert_eq!(raw.action, "down");
        assert_eq!(raw.reason.as_deref(), Some("idle"));
    }

    #[test]
    fn first_well_formed_object_wins() {
        let text = r#"{broken {"note": 1} {"action":"same"} {"action":"up"}"#;
        assert_eq!(extract_decision(text).unwrap().action, "same");
    }

    #[test]
    fn nested_decision_is_found() {
        let text = r#"{"result": {"action":"up","new_rps":12}}"#;
        assert_eq!(extract_decision(text).unwrap().new_rps, Some(12.0));
    }

    #[test]
    fn no_object_fails_closed() {
        assert_eq!(extract_decision("increase the limit please"), None);
        assert_eq!(extract_decision(r#"{"action": "up", "new_rps": "#), None);
        assert_eq!(extract_decision(r#"{"note": "no decision here"}"#), None);
        assert_eq!(extract_decision("{}"), None);
    }

    #[test]
    fn missing_action_reads_as_same() {
        let raw = extract_decision(r#"Holding steady: {"new_rps": 10, "confidence": 0.8}"#).unwrap();
        assert_eq!(raw.action, "same");
        assert_eq!(raw.new_rps, Some(10.0));
        assert_eq!(raw.confidence, Some(0.8));
    }

    #[test]
    fn wrong_field_types_fail_closed() {
        assert_eq!(extract_decision(r#"{"action":"up","new_rps":"lots"}"#), None);
    }

    #[test]
    fn intent_up_scales_by_scenario() {
        let raw = extract_intent("I would scale up now", 10.0, Scenario::Surge).unwrap();
        assert_eq!(raw.action, "up");
        assert_eq!(raw.new_rps, Some(20.0));
        assert_eq!(raw.new_burst, Some(60.0));
        assert_eq!(raw.confidence, Some(0.5));
        assert_eq!(raw.reason.as_deref(), Some("surge_intent_extracted"));

        let raw = extract_intent("increase", 10.0, Scenario::Ddos).unwrap();
        assert_eq!(raw.new_rps, Some(30.0));

        let raw = extract_intent("Increase.", 10.0, Scenario::Stable).unwrap();
        assert_eq!(raw.new_rps, Some(15.0));
    }

    #[test]
    fn intent_is_capped() {
        let raw = extract_intent("up", 60.0, Scenario::Ddos).unwrap();
        assert_eq!(raw.new_rps, Some(100.0));
        assert_eq!(raw.new_burst, Some(300.0));
    }

    #[test]
    fn intent_down() {
        let raw = extract_intent("traffic is low, go down", 10.0, Scenario::Light).unwrap();
        assert_eq!(raw.action, "down");
        assert_eq!(raw.new_rps, Some(8.0));
    }

    #[test]
    fn intent_requires_a_direction_word() {
        assert_eq!(extract_intent("", 10.0, Scenario::Normal), None);
        assert_eq!(extract_intent("the upstream looks fine", 10.0, Scenario::Normal), None);
    }
}
