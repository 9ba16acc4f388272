use super::{relu, sigmoid};

/// The activation function applied element-wise at the output of a layer.
#[derive(Debug, Clone, Copy)]
pub enum ActFn {
    Sigmoid(sigmoid::Sigmoid),
    Relu(relu::Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(sigmoid::Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        Self::Relu(relu::Relu)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(x),
            Self::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(x),
            Self::Relu(a) => a.df(x),
        }
    }
}
