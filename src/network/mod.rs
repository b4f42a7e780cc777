pub mod link_table;
pub mod packet;
pub mod simulator;
pub mod topology;

pub use link_table::*;
pub use packet::*;
pub use simulator::*;
pub use topology::*;
