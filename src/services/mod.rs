pub mod assessment_service;
pub mod attempt_service;
pub mod audit_service;
pub mod grading_service;
pub mod invitation_service;
pub mod lifecycle;
pub mod notification_service;
pub mod question_service;
