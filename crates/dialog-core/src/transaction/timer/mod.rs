//! Transaction timers.
//!
//! ## Client transaction timers
//! - **Timer A** (INVITE): request retransmissions, doubling
//! - **Timer B** (INVITE): transaction timeout while Calling
//! - **Timer D** (INVITE): linger in Completed for response retransmissions
//! - **Timer E** (non-INVITE): request retransmissions, doubling up to T2
//! - **Timer F** (non-INVITE): transaction timeout
//! - **Timer K** (non-INVITE): linger in Completed
//! - **Timer M** (INVITE): linger in Accepted for 2xx retransmissions
//!
//! ## Server transaction timers
//! - **Timer G** (INVITE): non-2xx response retransmissions
//! - **Timer H** (INVITE): wait for ACK
//! - **Timer I** (INVITE): linger in Confirmed
//! - **Timer J** (non-INVITE): linger in Completed
//! - **Timer L** (INVITE): linger in Accepted
//!
//! A, E and G are never armed on reliable transports, and D, I, J and K are
//! zero there, so the transaction moves on without arming them.

pub mod manager;
pub mod types;

pub use manager::TimerManager;
pub use types::{TimerFired, TimerSettings, TimerType};
