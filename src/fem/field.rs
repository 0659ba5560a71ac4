//! Element-constant solution fields stored in one global vector.
use crate::error::{GeomError, Result};
use crate::fem::mesh::ElemId;

/// Named element-wise variables with a shared solution vector.
///
/// Each variable owns a contiguous block of degrees of freedom, so the
/// dof index of `(elem, var)` is `var * n_elements + elem`.
#[derive(Debug, Clone)]
pub struct FieldSystem {
    variables: Vec<String>,
    n_elements: usize,
    solution: Vec<f64>,
}

impl FieldSystem {
    pub fn new(n_elements: usize) -> Self {
        Self {
            variables: Vec::new(),
            n_elements,
            solution: Vec::new(),
        }
    }

    /// Adds a variable initialised to zero; returns its number.
    /// Adding an existing name returns the existing number.
    pub fn add_variable(&mut self, name: &str) -> usize {
        if let Some(var) = self.variables.iter().position(|v| v == name) {
            return var;
        }
        self.variables.push(name.to_string());
        self.solution.resize(self.solution.len() + self.n_elements, 0.);
        self.variables.len() - 1
    }

    pub fn variable_number(&self, name: &str) -> Result<usize> {
        self.variables
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| GeomError::UnknownVariable(name.to_string()))
    }

    pub fn n_elements(&self) -> usize {
        self.n_elements
    }

    pub fn dof_index(&self, elem: ElemId, var: usize) -> usize {
        var * self.n_elements + elem
    }

    pub fn value(&self, elem: ElemId, var: usize) -> Result<f64> {
        if elem >= self.n_elements {
            return Err(GeomError::UnknownElement(elem));
        }
        Ok(self.solution[self.dof_index(elem, var)])
    }

    pub fn set_value(&mut self, elem: ElemId, var: usize, value: f64) -> Result<()> {
        if elem >= self.n_elements {
            return Err(GeomError::UnknownElement(elem));
        }
        let dof = self.dof_index(elem, var);
        self.solution[dof] = value;
        Ok(())
    }

    /// Fills a variable from a per-element function.
    pub fn fill(&mut self, name: &str, f: impl Fn(ElemId) -> f64) -> Result<()> {
        let var = self.variable_number(name)?;
        for elem in 0..self.n_elements {
            let dof = self.dof_index(elem, var);
            self.solution[dof] = f(elem);
        }
        Ok(())
    }

    /// Copy of a variable's values in element order.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let var = self.variable_number(name)?;
        let start = self.dof_index(0, var);
        Ok(self.solution[start..start + self.n_elements].to_vec())
    }
}
