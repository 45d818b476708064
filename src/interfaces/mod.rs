//! Adapters translating files into engine calls and engine state into files.

pub mod catalog;
pub mod csv;
