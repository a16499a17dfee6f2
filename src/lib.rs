pub mod bronze;
pub mod config;
pub mod domain;
pub mod drive;
pub mod error;
pub mod gold;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod silver;
pub mod stage;
pub mod store;
pub mod table;
pub mod transfer;
pub mod tse;
