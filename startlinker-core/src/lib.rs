#![allow(clippy::new_without_default)]

pub mod actor;
pub mod avatar;
pub mod error;
pub mod feed;
pub mod follow;
pub mod model;
pub mod recent;
pub mod util;
pub mod viewer;
pub mod webapi;
