pub mod admin_dto;
pub mod attempt_dto;
pub mod invitation_dto;
