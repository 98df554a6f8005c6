//!
//! Documentation of the ODM module.
//! Contains all the files needed for a MongoDB database connections.
//!


use super::config;
use super::rides;
pub mod odm;
pub mod models;
pub mod odm_utils;
