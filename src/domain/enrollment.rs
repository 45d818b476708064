use super::ids::{CourseId, EnrollmentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Revoked,
}

/// A user's right to access a course.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub progress_percentage: u8,
    pub status: EnrollmentStatus,
}

impl Enrollment {
    /// A fresh, active enrollment with no progress.
    pub fn grant(id: EnrollmentId, user_id: UserId, course_id: CourseId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            course_id,
            enrolled_at: at,
            progress_percentage: 0,
            status: EnrollmentStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }
}
