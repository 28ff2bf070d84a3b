//! Art catalog: format variations of creative works, grouped and served over HTTP.
//!
//! This module exposes internal components for the binary, tests and library usage.

pub mod access;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod group;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod query;
pub mod repository;
pub mod route;
pub mod storage;
pub mod variation;
