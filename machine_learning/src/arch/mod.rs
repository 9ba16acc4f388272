pub mod activations;
mod kind;
pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use kind::ModelKind;
pub use model::Model;
pub use sequential::Sequential;
