//! Domain services layered over the models.

pub mod email;
pub mod entitlement;
pub mod token;
