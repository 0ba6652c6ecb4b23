pub mod annotations;
pub mod variants;
