//! # Banded OKVS and VOLE-masked PSI
//!
//! A banded OKVS (Oblivious Key-Value Store) whose rows hold a contiguous band of `w` coefficients,
//! solved by band-restricted Gaussian elimination, and a two-party PSI built on it with VOLE
//! masking.
//!
//! - [okvs]: encoding and decoding, in a GF(2) band variant and a GF(2^128) band variant.
//! - [vole]: VOLE over GF(2^128), OT-based or LPN-based silent VOLE.
//! - [psi]: the two-party protocol, and an OPPRF in [psi::opprf].
//!
//! References:
//!
//! - [Near-Optimal Oblivious Key-Value Stores for Efficient PSI, PSU and Volume-Hiding
//!   Multi-Maps](https://eprint.iacr.org/2023/903)
//! - [Blazing Fast PSI from Improved OKVS and Subfield VOLE](https://eprint.iacr.org/2022/320)
#![warn(missing_docs)]

pub mod channel_utils;
pub mod cli_utils;
pub mod error;
pub mod okvs;
pub mod parallel;
pub mod psi;
pub mod set_utils;
pub mod vole;
