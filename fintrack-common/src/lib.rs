#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod db;
pub mod events;
pub mod messages;
pub mod models;
pub mod occurrence;
pub mod schema;
pub mod types;
