//! Domain and wire types shared between the board client and its host apps.

pub mod domain;
pub mod error;
pub mod protocol;
