// SPDX-License-Identifier: MIT

pub mod workflow;
