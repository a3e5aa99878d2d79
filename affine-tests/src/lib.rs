// SPDX-License-Identifier: MIT
//

pub mod event_log;
pub mod harness;
