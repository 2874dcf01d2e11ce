pub mod account;
pub mod track;
