// Domain layer: models and the remote collaborator port. No HTTP here.

pub mod model;
pub mod ports;
