//! Account verification and credential lifecycle.

pub mod login;
pub mod model;
pub mod otp;
pub mod password;
pub mod register;
pub mod reset;
pub mod storage;
pub mod token;
pub mod types;
