pub mod admin;
pub mod attempts;
pub mod docs;
pub mod health;
pub mod invitations;
pub mod public;
