pub mod data;
pub mod health;
pub mod serve;
