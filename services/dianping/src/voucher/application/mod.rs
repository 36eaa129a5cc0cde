//! 秒杀券应用层

mod outcome;
mod pipeline;
mod publish;
mod reservation;
mod worker;

pub use outcome::*;
pub use pipeline::*;
pub use publish::*;
pub use reservation::*;
