use super::types::ConeType;

/// Receiver types reachable through `this@Label`, innermost binding last.
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    bindings: Vec<(String, ConeType)>,
}

impl LabelTable {
    pub fn push(&mut self, label: &str, ty: ConeType) {
        self.bindings.push((label.to_string(), ty));
    }

    /// Removes the most recent binding equal to `(label, ty)`.
    pub fn remove(&mut self, label: &str, ty: &ConeType) -> bool {
        match self
            .bindings
            .iter()
            .rposition(|(name, bound)| name == label && bound == ty)
        {
            Some(index) => {
                self.bindings.remove(index);
                true
            }
            None => false,
        }
    }

    /// `None` asks for the innermost binding under any label.
    pub fn lookup(&self, label: Option<&str>) -> Option<&ConeType> {
        self.bindings
            .iter()
            .rev()
            .find(|(name, _)| label.is_none_or(|label| label == name))
            .map(|(_, ty)| ty)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
