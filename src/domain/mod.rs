// Domain layer: scrape and batch models plus the ports (interfaces) the core drives.

pub mod batch;
pub mod model;
pub mod ports;
