/// Outcome of evaluating every image of a pod. Built fresh per request.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct AdmissionDecision {
    allowed: bool,
    reason: Option<String>,
}

impl AdmissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}
