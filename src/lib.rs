//! TaskBuddy library: task model, live task feed, backend seams and the
//! terminal front ends built on them.

pub mod auth;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod dates;
pub mod error;
pub mod fields;
pub mod logging;
pub mod notify;
pub mod routes;
pub mod service;
pub mod store;
pub mod task;
pub mod task_store;
pub mod validation;
pub mod tui {
    pub mod app;
    pub mod board_view;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod list_view;
    pub mod login;
    pub mod run;
    pub mod task_form;
    pub mod utils;
}
