//! Serializable payloads exchanged with clients and with the generation API's JSON reply

pub mod correction_result;
pub mod grammar_page;
pub mod session;
pub mod submission;
