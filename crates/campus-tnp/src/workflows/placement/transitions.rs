use super::domain::ApplicationStatus;

/// How status writes are validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionMode {
    /// Any known status may be written, and bulk shortlisting overwrites every application.
    #[default]
    Permissive,
    /// Writes must follow the transition table; bulk shortlisting only promotes APPLIED.
    Strict,
}

impl TransitionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }

    pub fn permits(self, from: ApplicationStatus, to: ApplicationStatus) -> bool {
        match self {
            TransitionMode::Permissive => true,
            TransitionMode::Strict => from == to || next_states(from).contains(&to),
        }
    }

    /// Whether a bulk shortlist should touch an application in `status`.
    pub fn shortlists(self, status: ApplicationStatus) -> bool {
        match self {
            TransitionMode::Permissive => true,
            TransitionMode::Strict => status == ApplicationStatus::Applied,
        }
    }
}

pub fn next_states(from: ApplicationStatus) -> &'static [ApplicationStatus] {
    use ApplicationStatus::*;

    match from {
        Applied => &[Shortlisted, Rejected],
        Shortlisted => &[Selected, Rejected],
        Selected | Rejected => &[],
    }
}
