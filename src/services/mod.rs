pub mod cart_service;
pub mod order_service;
pub mod order_store;
pub mod product_ledger;
