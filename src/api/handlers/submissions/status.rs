//! Submission status transitions.
//!
//! | From \ Op | set(Unread/Read/InProgress/Done) | accept | reject |
//! |---|---|---|---|
//! | Unread/Read/InProgress/Done | allowed, any order | DemoUpload only | DemoUpload only |
//! | Accepted/Rejected | locked | locked | locked |

use super::types::{SubmissionStatus, SubmissionType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusOp {
    Set(SubmissionStatus),
    Accept,
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionError {
    InvalidTarget,
    Locked,
    NotDemoUpload,
}

impl TransitionError {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidTarget => "Status must be Unread, Read, InProgress, or Done.",
            Self::Locked => "Cannot change status after Accept/Reject.",
            Self::NotDemoUpload => "Accept/Reject is only for DemoUpload.",
        }
    }
}

/// Resolve the next status, or say why the operation is refused.
///
/// Check order: target validity, accept/reject eligibility, then the lock.
pub fn transition(
    kind: SubmissionType,
    current: SubmissionStatus,
    op: StatusOp,
) -> Result<SubmissionStatus, TransitionError> {
    let next = match op {
        StatusOp::Set(target) if target.is_terminal() => {
            return Err(TransitionError::InvalidTarget);
        }
        StatusOp::Set(target) => target,
        StatusOp::Accept | StatusOp::Reject if kind != SubmissionType::DemoUpload => {
            return Err(TransitionError::NotDemoUpload);
        }
        StatusOp::Accept => SubmissionStatus::Accepted,
        StatusOp::Reject => SubmissionStatus::Rejected,
    };

    if current.is_terminal() {
        return Err(TransitionError::Locked);
    }
    Ok(next)
}
