//! # docform
//!
//! Library side of the `docform` binary: argument definitions and command
//! implementations, exposed so they can be tested without spawning the
//! binary.

pub mod cli;
