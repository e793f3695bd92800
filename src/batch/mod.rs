// In: src/batch/mod.rs

//! The `Batch`: a row group passed between pipeline operators and across nodes.
//!
//! Vectors are positional and paired with `attrs` by index. A selection lets an
//! operator describe a filtered view without copying, and `zs` carries the
//! repetition weight of every row in the unselected domain.

use crate::arena::gather_slice;
use crate::error::RingwireError;
use crate::utils::typed_slice_to_bytes;
use crate::vector::Vector;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Attribute names, parallel to `vecs`.
    pub attrs: Vec<String>,
    pub vecs: Vec<Vector>,
    /// Raw little-endian encoding of `sels`, kept for operators that hand it on.
    pub sels_data: Vec<u8>,
    pub sels: Option<Vec<i64>>,
    /// Per-row repetition weights.
    pub zs: Vec<i64>,
    /// Per-attribute reference counts.
    pub refs: Vec<u64>,
    /// Per-attribute alias names.
    pub aliases: Vec<String>,
}

impl Batch {
    pub fn new<S: Into<String>>(attrs: impl IntoIterator<Item = S>) -> Self {
        Self {
            attrs: attrs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Appends a named column.
    pub fn push_vector(&mut self, name: impl Into<String>, vector: Vector) {
        self.attrs.push(name.into());
        self.vecs.push(vector);
    }

    pub fn vector_by_name(&self, name: &str) -> Option<&Vector> {
        self.attrs
            .iter()
            .position(|a| a == name)
            .and_then(|i| self.vecs.get(i))
    }

    /// Rows in the unselected domain.
    pub fn domain_len(&self) -> usize {
        self.vecs
            .first()
            .map_or(self.zs.len(), Vector::len)
    }

    /// Logical rows, honouring the selection if there is one.
    pub fn row_count(&self) -> usize {
        match &self.sels {
            Some(sels) => sels.len(),
            None => self.domain_len(),
        }
    }

    /// Installs a selection and refreshes its raw encoding.
    pub fn set_selection(&mut self, sels: Vec<i64>) {
        self.sels_data = typed_slice_to_bytes(&sels);
        self.sels = Some(sels);
    }

    pub fn clear_selection(&mut self) {
        self.sels = None;
        self.sels_data.clear();
    }

    /// Checks the parallel-array invariants.
    pub fn validate(&self) -> Result<(), RingwireError> {
        let n = self.attrs.len();
        if self.vecs.len() != n {
            return Err(RingwireError::ContractViolation(format!(
                "batch has {} attributes but {} vectors",
                n,
                self.vecs.len()
            )));
        }
        for (what, len) in [("reference counts", self.refs.len()), ("aliases", self.aliases.len())] {
            if len != 0 && len != n {
                return Err(RingwireError::ContractViolation(format!(
                    "batch has {} attributes but {} {}",
                    n, len, what
                )));
            }
        }
        let domain = self.domain_len();
        if let Some((i, v)) = self.vecs.iter().enumerate().find(|(_, v)| v.len() != domain) {
            return Err(RingwireError::ContractViolation(format!(
                "vector {} ({}) has {} rows, expected {}",
                i,
                self.attrs[i],
                v.len(),
                domain
            )));
        }
        if !self.zs.is_empty() && self.zs.len() != domain {
            return Err(RingwireError::ContractViolation(format!(
                "{} weights for {} rows",
                self.zs.len(),
                domain
            )));
        }
        if let Some(sels) = &self.sels {
            if let Some(bad) = sels.iter().find(|&&s| s < 0 || s as usize >= domain) {
                return Err(RingwireError::ContractViolation(format!(
                    "selection index {} out of range for {} rows",
                    bad, domain
                )));
            }
        }
        Ok(())
    }

    /// Materialises the selection into every vector and the weights, then drops it.
    pub fn shrink(&mut self) -> Result<(), RingwireError> {
        let Some(sels) = self.sels.take() else {
            return Ok(());
        };
        for v in &mut self.vecs {
            v.shrink(&sels)?;
        }
        if !self.zs.is_empty() {
            self.zs = gather_slice(&self.zs, &sels)?;
        }
        self.sels_data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Type, TypeKind};

    fn sample() -> Batch {
        let mut batch = Batch::new(Vec::<String>::new());
        batch.push_vector("a", Vector::from_slice(&[1i64, 2, 3, 4]));
        batch.push_vector(
            "b",
            Vector::from_byte_rows(Type::new(TypeKind::Varchar), &["w", "x", "y", "z"]).unwrap(),
        );
        batch.zs = vec![1, 1, 2, 1];
        batch
    }

    #[test]
    fn test_lookup_and_row_count() {
        let mut batch = sample();
        assert!(batch.validate().is_ok());
        assert_eq!(batch.row_count(), 4);
        assert_eq!(batch.vector_by_name("a").unwrap().len(), 4);
        assert!(batch.vector_by_name("missing").is_none());

        batch.set_selection(vec![3, 1]);
        assert_eq!(batch.row_count(), 2);
        assert_eq!(batch.sels_data.len(), 16);
    }

    #[test]
    fn test_validate_rejects_ragged_arrays() {
        let mut batch = sample();
        batch.refs = vec![1];
        assert!(matches!(batch.validate(), Err(RingwireError::ContractViolation(_))));

        let mut batch = sample();
        batch.attrs.push("c".into());
        assert!(batch.validate().is_err());

        let mut batch = sample();
        batch.set_selection(vec![0, 4]);
        assert!(batch.validate().is_err());
    }

    #[test]
    fn test_shrink_materialises_selection() {
        let mut batch = sample();
        batch.set_selection(vec![2, 0]);
        batch.shrink().unwrap();

        assert!(batch.sels.is_none());
        assert!(batch.sels_data.is_empty());
        assert_eq!(batch.row_count(), 2);
        assert_eq!(batch.vecs[0].col::<i64>().unwrap(), &[3, 1]);
        assert_eq!(batch.vecs[1].bytes_at(0).unwrap(), b"y");
        assert_eq!(batch.zs, vec![2, 1]);
        assert!(batch.validate().is_ok());
    }
}
