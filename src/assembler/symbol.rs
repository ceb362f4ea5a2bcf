//! The label/equate symbol table.
//!
//! Names are normalized to uppercase by the line parser before they get
//! here. A symbol binds exactly once per assembly run: rebinding is the
//! duplicate-label error, never a silent overwrite.

use std::collections::HashMap;

use super::error::{AsmError, AsmErrorKind};

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, i64>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Binds `name` to `value`. Fails with `DuplicateLabel` if the name
    /// is already bound.
    pub fn bind(&mut self, name: &str, value: i64) -> Result<(), AsmError> {
        if let Some(existing) = self.symbols.get(name) {
            return Err(AsmError::new(
                AsmErrorKind::DuplicateLabel,
                format!("label '{}' is already defined (= {})", name, existing),
            ));
        }
        debug!("bind label {} = {}", name, value);
        self.symbols.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<i64> {
        self.symbols.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All bindings, sorted by value then name (for diagnostic dumps).
    pub fn sorted(&self) -> Vec<(String, i64)> {
        let mut entries: Vec<(String, i64)> = self
            .symbols
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}
