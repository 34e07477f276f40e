use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptStatistics {
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub average_score: f64,
    pub average_percentage: f64,
    pub completion_rate: f64,
}
