//! Order placement for the storefront: a per-user cart that stages purchases
//! and a transactional checkout that turns it into an order without ever
//! overselling stock.

pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
