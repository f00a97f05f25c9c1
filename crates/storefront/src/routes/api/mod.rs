//! JSON API routes.

pub mod b2;
