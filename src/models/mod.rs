pub mod answer;
pub mod assessment;
pub mod attempt;
pub mod audit_log;
pub mod notification;
pub mod question;
pub mod user;
