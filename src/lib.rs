pub mod alert;
pub mod camera;
pub mod config;
pub mod detect;
pub mod fall;
pub mod models;
pub mod pipeline;
pub mod pose;
pub mod runner;
pub mod web;
