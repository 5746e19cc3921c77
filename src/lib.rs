pub mod auth;
pub mod certificate;
pub mod config;
pub mod db;
pub mod error;
pub mod issuance;
pub mod pdf;
pub mod records;
pub mod routes;
pub mod state;
pub mod storage;
pub mod templates;
