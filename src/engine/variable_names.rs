use std::collections::HashMap;

use crate::engine::variables::VarId;

/// Registry of variable names.
///
/// Name storage is skipped entirely when the `store_names` parameter is off; anonymous
/// variables receive a generated `x_<n>` name only when `name_all_variables` (or the
/// equivalent flag) asks for it.
#[derive(Debug, Default)]
pub(crate) struct VariableNames {
    names: HashMap<VarId, String>,
    store_names: bool,
    name_all: bool,
    anonymous_index: usize,
}

impl VariableNames {
    pub(crate) fn new(store_names: bool, name_all: bool) -> VariableNames {
        VariableNames {
            names: HashMap::new(),
            store_names,
            name_all,
            anonymous_index: 0,
        }
    }

    pub(crate) fn set_name(&mut self, var: VarId, name: &str) {
        if self.store_names {
            let _ = self.names.insert(var, name.to_owned());
        }
    }

    pub(crate) fn has_name(&self, var: VarId) -> bool {
        self.names.contains_key(&var)
    }

    pub(crate) fn name(&mut self, var: VarId) -> String {
        if let Some(name) = self.names.get(&var) {
            return name.clone();
        }
        if self.name_all {
            let name = format!("x_{}", self.anonymous_index);
            self.anonymous_index += 1;
            let _ = self.names.insert(var, name.clone());
            return name;
        }
        format!("{var:?}")
    }
}
