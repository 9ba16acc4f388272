use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::{MlErr, Result};

/// A snapshot of a model's parameters, keyed by parameter name.
///
/// Keys are kept sorted so iterating two states with the same layout always
/// visits their tensors in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelState {
    params: BTreeMap<String, ArrayD<f32>>,
}

impl ModelState {
    /// Creates a new empty `ModelState`.
    ///
    /// # Returns
    /// A new `ModelState` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter tensor under `key`.
    ///
    /// # Arguments
    /// * `key` - The name of the parameter.
    /// * `tensor` - The parameter's values.
    ///
    /// # Returns
    /// The previous tensor stored under `key`, if any.
    pub fn insert<K: Into<String>>(&mut self, key: K, tensor: ArrayD<f32>) -> Option<ArrayD<f32>> {
        self.params.insert(key.into(), tensor)
    }

    pub fn get(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.params.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ArrayD<f32>> {
        self.params.get_mut(key)
    }

    /// Returns the amount of named tensors in this state.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the total amount of scalar parameters across all tensors.
    pub fn nparams(&self) -> usize {
        self.params.values().map(|t| t.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.params.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ArrayD<f32>)> {
        self.params.iter_mut().map(|(k, t)| (k.as_str(), t))
    }

    /// Checks that `other` has exactly the same keys and tensor shapes as this state.
    ///
    /// # Arguments
    /// * `other` - The state to compare against.
    ///
    /// # Returns
    /// A `MissingParam` error if a key is present in only one of them or a
    /// `ShapeMismatch` error if a tensor's shape differs.
    pub fn check_layout(&self, other: &ModelState) -> Result<()> {
        for (key, tensor) in &self.params {
            let theirs = other
                .params
                .get(key)
                .ok_or_else(|| MlErr::MissingParam { key: key.clone() })?;

            if theirs.shape() != tensor.shape() {
                return Err(MlErr::ShapeMismatch {
                    key: key.clone(),
                    got: theirs.shape().to_vec(),
                    expected: tensor.shape().to_vec(),
                });
            }
        }

        if let Some(extra) = other.keys().find(|k| !self.params.contains_key(*k)) {
            return Err(MlErr::MissingParam {
                key: extra.to_string(),
            });
        }

        Ok(())
    }
}

impl FromIterator<(String, ArrayD<f32>)> for ModelState {
    fn from_iter<I: IntoIterator<Item = (String, ArrayD<f32>)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ModelState {
    type Item = (String, ArrayD<f32>);
    type IntoIter = std::collections::btree_map::IntoIter<String, ArrayD<f32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn tensor(shape: &[usize], value: f32) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(shape), value)
    }

    #[test]
    fn same_layout_passes() {
        let a: ModelState = [("w".to_string(), tensor(&[2, 2], 1.))].into_iter().collect();
        let b: ModelState = [("w".to_string(), tensor(&[2, 2], 5.))].into_iter().collect();

        assert!(a.check_layout(&b).is_ok());
        assert_eq!(a.nparams(), 4);
    }

    #[test]
    fn different_shapes_fail() {
        let a: ModelState = [("w".to_string(), tensor(&[2, 2], 1.))].into_iter().collect();
        let b: ModelState = [("w".to_string(), tensor(&[4], 1.))].into_iter().collect();

        let err = a.check_layout(&b).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { ref key, .. } if key == "w"));
    }

    #[test]
    fn extra_or_missing_keys_fail() {
        let mut a = ModelState::new();
        a.insert("w", tensor(&[1], 0.));

        let mut b = a.clone();
        b.insert("b", tensor(&[1], 0.));

        assert_eq!(
            a.check_layout(&b).unwrap_err(),
            MlErr::MissingParam { key: "b".into() }
        );
        assert_eq!(
            b.check_layout(&a).unwrap_err(),
            MlErr::MissingParam { key: "b".into() }
        );
    }
}
