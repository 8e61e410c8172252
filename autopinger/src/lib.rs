/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! autopinger – button/timer triggered reachability probe with an LED pulse.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/       – CLI-derived Config record + YAML tuning file
//! ├── error.rs      – DaemonError and exit codes
//! ├── sysfs/        – GPIO / PWM bring-up
//! ├── pwm/          – duty-cycle driver
//! ├── gpio/         – button edge decoder
//! ├── timer/        – timerfd interval source
//! ├── worker/       – probe (ping child) and pulse (LED ramp task)
//! ├── supervisor/   – multiplexer + IDLE/ACTIVE state machine
//! └── daemon.rs     – fork/setsid, shutdown signals
//! ```

pub mod config;
pub mod daemon;
pub mod error;
pub mod gpio;
pub mod pwm;
pub mod supervisor;
pub mod sysfs;
pub mod timer;
pub mod worker;
