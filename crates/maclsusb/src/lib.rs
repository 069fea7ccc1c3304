//! Library part of the maclsusb binary, exposes the CLI definition for xtask

pub mod cli;
