//! Values exchanged between callers, the anchor and the capability authority

use serde::{Deserialize, Serialize};

/// Answer for a single capability
///
/// Produced exactly once per capability per logical request. Every caller
/// waiting on the same capability receives an identical copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityResult {
    /// Capability name (or the joined names of a combined result)
    pub name: String,

    /// Whether the capability was granted
    pub granted: bool,

    /// Whether the authority would show a justification before asking again.
    /// Only meaningful when `granted` is false.
    pub rationale_applicable: bool,
}

impl CapabilityResult {
    /// Create a result
    pub fn new(name: impl Into<String>, granted: bool, rationale_applicable: bool) -> Self {
        Self {
            name: name.into(),
            granted,
            rationale_applicable,
        }
    }

    /// A granted result
    pub fn granted(name: impl Into<String>) -> Self {
        Self::new(name, true, false)
    }

    /// A denied result without rationale
    ///
    /// Used for policy revocations, interrupted prompts and teardown.
    pub fn denied(name: impl Into<String>) -> Self {
        Self::new(name, false, false)
    }

    /// Merge several results into one
    ///
    /// The name is the comma-joined list of names, `granted` is true only if
    /// every result was granted, and `rationale_applicable` is true if any
    /// result allows a rationale.
    pub fn combine(results: &[CapabilityResult]) -> Self {
        let name = results
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            name,
            granted: results.iter().all(|r| r.granted),
            rationale_applicable: results.iter().any(|r| r.rationale_applicable),
        }
    }
}

impl std::fmt::Display for CapabilityResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = if self.granted { "granted" } else { "denied" };
        write!(f, "{} {}", self.name, outcome)?;
        if !self.granted && self.rationale_applicable {
            write!(f, " (rationale)")?;
        }
        Ok(())
    }
}

/// One physical prompt handed to the capability authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Identifier of the prompt batch, echoed back in the authority's answer
    pub request_code: u32,

    /// Names to ask for, in first-requested order
    pub names: Vec<String>,
}

impl PromptRequest {
    /// Create a prompt request
    pub fn new(request_code: u32, names: Vec<String>) -> Self {
        Self {
            request_code,
            names,
        }
    }
}

/// Messages sent FROM the capability authority back to the anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityEvent {
    /// The prompt finished; `names` and `granted` are index-aligned
    Delivered {
        /// Prompt batch the answer belongs to
        request_code: u32,
        /// Answered capability names
        names: Vec<String>,
        /// Grant flag per name
        granted: Vec<bool>,
    },

    /// The prompt flow was abandoned
    Cancelled {
        /// Prompt batch that was abandoned
        request_code: u32,
    },
}

impl AuthorityEvent {
    /// Create a delivery event
    pub fn delivered(request_code: u32, names: Vec<String>, granted: Vec<bool>) -> Self {
        AuthorityEvent::Delivered {
            request_code,
            names,
            granted,
        }
    }

    /// Create a cancellation event
    pub fn cancelled(request_code: u32) -> Self {
        AuthorityEvent::Cancelled { request_code }
    }

    /// Prompt batch this event refers to
    pub fn request_code(&self) -> u32 {
        match self {
            AuthorityEvent::Delivered { request_code, .. } => *request_code,
            AuthorityEvent::Cancelled { request_code } => *request_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_all_granted() {
        let combined = CapabilityResult::combine(&[
            CapabilityResult::granted("CAMERA"),
            CapabilityResult::granted("MIC"),
        ]);
        assert_eq!(combined, CapabilityResult::new("CAMERA, MIC", true, false));
    }

    #[test]
    fn test_combine_one_denied_with_rationale() {
        let combined = CapabilityResult::combine(&[
            CapabilityResult::granted("CAMERA"),
            CapabilityResult::new("MIC", false, true),
            CapabilityResult::denied("LOCATION"),
        ]);
        assert_eq!(combined.name, "CAMERA, MIC, LOCATION");
        assert!(!combined.granted);
        assert!(combined.rationale_applicable);
    }

    #[test]
    fn test_combine_single() {
        let combined = CapabilityResult::combine(&[CapabilityResult::denied("CAMERA")]);
        assert_eq!(combined, CapabilityResult::denied("CAMERA"));
    }

    #[test]
    fn test_display() {
        assert_eq!(CapabilityResult::granted("CAMERA").to_string(), "CAMERA granted");
        assert_eq!(
            CapabilityResult::new("MIC", false, true).to_string(),
            "MIC denied (rationale)"
        );
    }

    #[test]
    fn test_event_request_code() {
        let event = AuthorityEvent::delivered(7, vec!["A".into()], vec![true]);
        assert_eq!(event.request_code(), 7);
        assert_eq!(AuthorityEvent::cancelled(9).request_code(), 9);
    }

    #[test]
    fn test_result_serialization() {
        let result = CapabilityResult::new("CAMERA", false, true);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"rationale_applicable\":true"));
    }
}
