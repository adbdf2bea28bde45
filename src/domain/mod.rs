// Domain layer: image models and ports (interfaces).

pub mod model;
pub mod ports;
