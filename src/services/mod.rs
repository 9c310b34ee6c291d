pub mod errors;
pub mod profiles;
