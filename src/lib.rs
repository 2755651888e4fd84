//! Client library for texd, a TeX-to-PDF compilation service.
//!
//! Documents are uploaded as multipart requests. Large static files can be
//! attached as references: only their checksum is sent until the server
//! reports that it does not know them, in which case the render is repeated
//! once with those files in full.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
