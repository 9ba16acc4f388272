/// Logistic activation scaled by `amp`, so its image is `(0, amp)`.
#[derive(Clone, Copy, Debug)]
pub struct Sigmoid {
    amp: f32,
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self { amp: 1. }
    }
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    fn logistic(z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp * Self::logistic(z)
    }

    pub fn df(&self, z: f32) -> f32 {
        let s = Self::logistic(z);
        self.amp * s * (1. - s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_peaks_at_zero() {
        let sigmoid = Sigmoid::new(1.);

        assert!((sigmoid.f(0.) - 0.5).abs() < 1e-6);
        assert!((sigmoid.df(0.) - 0.25).abs() < 1e-6);
        assert!(sigmoid.df(4.) < sigmoid.df(0.));
    }

    #[test]
    fn amplitude_scales_output() {
        let sigmoid = Sigmoid::new(2.);
        assert!((sigmoid.f(0.) - 1.).abs() < 1e-6);
        assert!(sigmoid.f(50.) <= 2.);
    }
}
