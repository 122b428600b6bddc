//! Domain model: customers, dunning rules, payments, notifications, the audit
//! records both workflows append, and the ports the application layer drives.

pub mod audit;
pub mod clock;
pub mod customer;
pub mod money;
pub mod notification;
pub mod payment;
pub mod ports;
pub mod rule;
