// SPDX-License-Identifier: MIT

//! Agent development kit - the seam between workflows and the units they run

pub mod agent;
pub mod cancel;
pub mod error;
pub mod media;
pub mod message;
